use crate::table::cell_text;
use crate::types::{is_blank, Row};

/// Columns whose presence marks a dataset as carrying baseline metrics.
pub const BASELINE_MARKERS: &[&str] = &[
    "sentiment",
    "baseline_lm_score",
    "finbert_pred",
    "lm_sentiment",
];

/// Fields listed in the baseline view, in display order.
pub const BASELINE_FIELDS: &[&str] = &[
    "sentiment",
    "sentiment_score",
    "baseline_lm_score",
    "lm_sentiment",
    "lm_positive",
    "lm_negative",
    "lm_uncertainty",
    "finbert_pred",
    "finbert_score",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineView {
    /// None of the marker columns exist in this dataset.
    AbsentFromDataset,
    /// The dataset has marker columns but this row leaves them all blank.
    PresentButEmpty,
    Populated(Vec<(String, String)>),
}

impl BaselineView {
    pub fn from_row(columns: &[String], row: &Row) -> Self {
        let has_markers = columns
            .iter()
            .any(|column| BASELINE_MARKERS.contains(&column.as_str()));
        if !has_markers {
            return BaselineView::AbsentFromDataset;
        }

        let populated: Vec<(String, String)> = BASELINE_FIELDS
            .iter()
            .filter_map(|field| {
                let value = row.get(*field);
                if is_blank(value) {
                    None
                } else {
                    Some((field.to_string(), cell_text(value)))
                }
            })
            .collect();

        if populated.is_empty() {
            BaselineView::PresentButEmpty
        } else {
            BaselineView::Populated(populated)
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            BaselineView::AbsentFromDataset => Some("No baseline metrics for this dataset."),
            BaselineView::PresentButEmpty => {
                Some("Baseline columns exist but are empty for this row.")
            }
            BaselineView::Populated(_) => None,
        }
    }
}
