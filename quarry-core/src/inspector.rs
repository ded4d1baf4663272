use crate::analysis::{analysis_for_row, AnalysisView};
use crate::baseline::BaselineView;
use crate::prelude::*;
use crate::table::cell_text;
use crate::types::Row;

/// Everything the detail pane shows for one selected row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDetail {
    pub fields: Vec<(String, String)>,
    pub analysis: AnalysisView,
    pub baseline: BaselineView,
    raw: Row,
}

impl RowDetail {
    pub fn new(columns: &[String], row: &Row) -> Self {
        let mut fields: Vec<(String, String)> = columns
            .iter()
            .map(|column| (column.clone(), cell_text(row.get(column))))
            .collect();
        fields.extend(
            row.iter()
                .filter(|(key, _)| !columns.contains(key))
                .map(|(key, value)| (key.clone(), cell_text(Some(value)))),
        );

        Self {
            fields,
            analysis: analysis_for_row(row),
            baseline: BaselineView::from_row(columns, row),
            raw: row.clone(),
        }
    }

    pub fn raw(&self) -> &Row {
        &self.raw
    }

    pub fn raw_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_follow_columns_then_extra_keys() {
        let columns = vec!["ticker".to_string(), "eps".to_string()];
        let row = json!({"eps": null, "ticker": "AAPL", "agent_analysis": null})
            .as_object()
            .cloned()
            .unwrap();
        let detail = RowDetail::new(&columns, &row);
        assert_eq!(
            detail.fields,
            vec![
                ("ticker".to_string(), "AAPL".to_string()),
                ("eps".to_string(), String::new()),
                ("agent_analysis".to_string(), String::new()),
            ]
        );
        assert_eq!(detail.analysis, AnalysisView::NoAnalysis);
        assert_eq!(detail.baseline, BaselineView::AbsentFromDataset);
    }

    #[test]
    fn derived_views_come_from_the_row() {
        let columns = vec!["ticker".to_string(), "sentiment".to_string()];
        let row = json!({
            "ticker": "MSFT",
            "sentiment": "positive",
            "agent_analysis": "{\"items\":[{\"type\":\"Risk\",\"metric\":\"EPS\"}]}"
        })
        .as_object()
        .cloned()
        .unwrap();
        let detail = RowDetail::new(&columns, &row);
        assert!(matches!(detail.analysis, AnalysisView::Decoded(_)));
        assert!(matches!(detail.baseline, BaselineView::Populated(_)));
        let raw = detail.raw_json().unwrap();
        assert!(raw.contains("\"ticker\": \"MSFT\""));
        assert_eq!(detail.raw(), &row);
    }
}
