//! Decoder for the per-row agent analysis block.
//!
//! The block arrives either as a JSON-encoded string or as an already
//! structured object:
//!
//! ```json
//! {"summary": "...", "items": [{"type": "Risk", "metric": "EPS", "value": "-0.10", "reason": "miss"}]}
//! ```
//!
//! Both shapes are normalized into [`AnalysisBlock`] before any grouping
//! happens. Decoding never fails outward: bad input becomes
//! [`AnalysisView::ParseError`].

use serde_json::Value;
use tracing::debug;

use crate::types::{is_blank, value_text, Row};

/// Row columns that may hold the analysis block, in lookup order.
pub const ANALYSIS_COLUMNS: &[&str] = &["agent_analysis", "analysis", "facts"];
pub const OTHER_GROUP: &str = "Other";
pub const DEFAULT_METRIC_LABEL: &str = "Metric";

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisView {
    NoAnalysis,
    ParseError(String),
    Decoded(AnalysisReport),
}

impl AnalysisView {
    pub fn message(&self) -> Option<String> {
        match self {
            AnalysisView::NoAnalysis => Some("No agent analysis for this row.".to_string()),
            AnalysisView::ParseError(err) => Some(format!("Could not parse analysis: {err}")),
            AnalysisView::Decoded(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub groups: Vec<AnalysisGroup>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisGroup {
    pub kind: String,
    pub expanded: bool,
    pub items: Vec<AnalysisLine>,
}

impl AnalysisGroup {
    pub fn title(&self) -> String {
        format!("{} ({})", self.kind, self.items.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisLine {
    pub headline: String,
    pub reason: Option<String>,
}

/// Normalized form of the analysis block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisBlock {
    pub summary: Option<String>,
    pub items: Vec<AnalysisItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisItem {
    pub kind: Option<String>,
    pub metric: Option<String>,
    pub value: Option<String>,
    pub reason: Option<String>,
}

/// Looks up the analysis column of a row and decodes it.
pub fn analysis_for_row(row: &Row) -> AnalysisView {
    let raw = ANALYSIS_COLUMNS
        .iter()
        .filter_map(|column| row.get(*column))
        .find(|value| !value.is_null());
    decode_analysis(raw)
}

pub fn decode_analysis(raw: Option<&Value>) -> AnalysisView {
    match normalize(raw) {
        Ok(None) => AnalysisView::NoAnalysis,
        Ok(Some(block)) => present(block),
        Err(err) => {
            debug!("analysis block could not be decoded: {err}");
            AnalysisView::ParseError(err)
        }
    }
}

/// String-or-object decode step. `Ok(None)` means there is nothing to show.
pub fn normalize(raw: Option<&Value>) -> Result<Option<AnalysisBlock>, String> {
    let Some(raw) = raw.filter(|value| !is_blank(Some(value))) else {
        return Ok(None);
    };
    let value = match raw {
        Value::String(text) => parse_text(text)?,
        other => other.clone(),
    };
    block_from_value(value).map(Some)
}

fn parse_text(text: &str) -> Result<Value, String> {
    let parsed: Value = serde_json::from_str(text.trim()).map_err(|err| err.to_string())?;
    // Double-encoded blocks show up when a JSON column is exported to CSV.
    match parsed {
        Value::String(inner) => serde_json::from_str(inner.trim()).map_err(|err| err.to_string()),
        other => Ok(other),
    }
}

fn block_from_value(value: Value) -> Result<AnalysisBlock, String> {
    match value {
        Value::Null => Ok(AnalysisBlock::default()),
        Value::Array(items) => Ok(AnalysisBlock {
            summary: None,
            items: items_from(items),
        }),
        Value::Object(mut object) => {
            let summary = object.remove("summary").and_then(|value| scalar(&value));
            let items = match object.remove("items") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items_from(items),
                Some(other) => {
                    return Err(format!("expected `items` to be a list, found {}", kind_of(&other)))
                }
            };
            Ok(AnalysisBlock { summary, items })
        }
        other => Err(format!("expected an object, found {}", kind_of(&other))),
    }
}

fn items_from(items: Vec<Value>) -> Vec<AnalysisItem> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(object) => Some(AnalysisItem {
                kind: object.get("type").and_then(scalar),
                metric: object.get("metric").and_then(scalar),
                value: object.get("value").and_then(scalar),
                reason: object.get("reason").and_then(scalar),
            }),
            other => {
                debug!("skipping analysis item of type {}", kind_of(&other));
                None
            }
        })
        .collect()
}

fn scalar(value: &Value) -> Option<String> {
    let text = value_text(value);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Groups items by type, keeping first-seen order of groups and of items.
pub fn present(block: AnalysisBlock) -> AnalysisView {
    if block.items.is_empty() && block.summary.is_none() {
        return AnalysisView::NoAnalysis;
    }

    let mut groups: Vec<AnalysisGroup> = Vec::new();
    for item in block.items {
        let kind = item.kind.unwrap_or_else(|| OTHER_GROUP.to_string());
        let line = AnalysisLine {
            headline: headline(item.metric.as_deref(), item.value.as_deref()),
            reason: item.reason,
        };
        match groups.iter_mut().find(|group| group.kind == kind) {
            Some(group) => group.items.push(line),
            None => groups.push(AnalysisGroup {
                expanded: groups.is_empty(),
                kind,
                items: vec![line],
            }),
        }
    }

    AnalysisView::Decoded(AnalysisReport {
        groups,
        summary: block.summary,
    })
}

fn headline(metric: Option<&str>, value: Option<&str>) -> String {
    let metric = metric.unwrap_or(DEFAULT_METRIC_LABEL);
    match value {
        Some(value) => format!("{metric}: {value}"),
        None => metric.to_string(),
    }
}
