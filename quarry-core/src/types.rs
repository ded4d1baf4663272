//! Wire types for the explorer HTTP API.
//!
//! The server hands back loosely typed JSON (CSV-backed tables, graph
//! properties, per-call analysis blobs), so most fields are optional and the
//! deserializers below accept `null` wherever a value may be missing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// One record of a dataset page, keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetList {
    #[serde(default, deserialize_with = "nullable")]
    pub datasets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsPayload {
    #[serde(default, deserialize_with = "text_list")]
    pub tickers: Vec<String>,
    #[serde(default, deserialize_with = "text_list")]
    pub quarters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPage {
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub columns: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub rows: Vec<Row>,
    /// Echoed page number. Absent when the server did not echo it.
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub page_size: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub nodes: Vec<RawNode>,
    #[serde(default, deserialize_with = "nullable")]
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEdge {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(deserialize_with = "id_text")]
    pub source: String,
    #[serde(deserialize_with = "id_text")]
    pub target: String,
    #[serde(default, rename = "type")]
    pub edge_type: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleCallPage {
    #[serde(default, deserialize_with = "nullable")]
    pub rows: Vec<SampleCall>,
    #[serde(default, deserialize_with = "nullable")]
    pub total: u64,
}

/// A sample earnings call. List responses carry the summary fields; the
/// detail endpoint additionally fills `agent_outputs`, the baseline scores
/// and `token_usage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleCall {
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub ticker: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub company: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub quarter: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub sector: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub exchange: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub true_return: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub pred_label: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub pred_conf: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_correct: Option<bool>,
    pub agent_outputs: Option<AgentOutputs>,
    #[serde(deserialize_with = "lenient_f64")]
    pub baseline_lm_score: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub finbert_pred: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub token_usage: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOutputs {
    #[serde(deserialize_with = "lenient_string")]
    pub main_summary: Option<String>,
    #[serde(deserialize_with = "text_list")]
    pub comparative_points: Vec<String>,
    #[serde(deserialize_with = "text_list")]
    pub historical_notes: Vec<String>,
}

/// Display text for a loosely typed JSON value. `null` becomes the empty
/// string; nested arrays and objects are rendered as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_text(number),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Whole floats print without a fraction, so `2.0` from the server reads
/// as `2`.
fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 => {
            (float as i64).to_string()
        }
        _ => number.to_string(),
    }
}

/// True when a value carries nothing worth showing.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_text(&value))
}

fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<Value> = nullable(deserializer)?;
    Ok(values
        .iter()
        .map(value_text)
        .filter(|text| !text.trim().is_empty())
        .collect())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .map(|value| value_text(&value))
        .filter(|text| !text.trim().is_empty()))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_text_blanks_null() {
        assert_eq!(value_text(&Value::Null), "");
        assert_eq!(value_text(&json!(1.5)), "1.5");
        assert_eq!(value_text(&json!(false)), "false");
        assert_eq!(value_text(&json!("AAPL")), "AAPL");
        assert_eq!(value_text(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn whole_floats_drop_the_fraction() {
        assert_eq!(value_text(&json!(2.0)), "2");
        assert_eq!(value_text(&json!(-0.0)), "0");
        assert_eq!(value_text(&json!(-14.0)), "-14");
        assert_eq!(value_text(&json!(0.25)), "0.25");
        assert_eq!(value_text(&json!(12345678901_u64)), "12345678901");
    }

    #[test]
    fn sample_call_page_tolerates_null_total() {
        let page: SampleCallPage =
            serde_json::from_value(json!({"rows": [], "total": null})).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.rows.is_empty());
    }

    #[test]
    fn row_page_tolerates_missing_and_null_fields() {
        let page: RowPage =
            serde_json::from_value(json!({"columns": null, "rows": null, "total": 0})).unwrap();
        assert!(page.columns.is_empty());
        assert!(page.rows.is_empty());
        assert_eq!(page.page, None);
        assert_eq!(page.page_size, 0);
    }

    #[test]
    fn graph_ids_accept_numbers() {
        let payload: GraphPayload = serde_json::from_value(json!({
            "nodes": [{"id": 4, "labels": null}],
            "edges": [{"id": 9, "source": 4, "target": "x"}]
        }))
        .unwrap();
        assert_eq!(payload.nodes[0].id, "4");
        assert!(payload.nodes[0].labels.is_empty());
        assert_eq!(payload.edges[0].source, "4");
        assert_eq!(payload.edges[0].edge_type, None);
    }

    #[test]
    fn sample_call_fields_are_lenient() {
        let call: SampleCall = serde_json::from_value(json!({
            "id": 17,
            "ticker": "MSFT",
            "true_return": "0.031",
            "pred_conf": null,
            "is_correct": 1,
            "agent_outputs": {"main_summary": "beat", "comparative_points": null},
            "token_usage": null
        }))
        .unwrap();
        assert_eq!(call.id.as_deref(), Some("17"));
        assert_eq!(call.true_return, Some(0.031));
        assert_eq!(call.pred_conf, None);
        assert_eq!(call.is_correct, Some(true));
        let outputs = call.agent_outputs.unwrap();
        assert_eq!(outputs.main_summary.as_deref(), Some("beat"));
        assert!(outputs.comparative_points.is_empty());
        assert!(call.token_usage.is_empty());
    }

    #[test]
    fn options_drop_blank_entries() {
        let options: OptionsPayload =
            serde_json::from_value(json!({"tickers": ["AAPL", "", null, 42], "quarters": null}))
                .unwrap();
        assert_eq!(options.tickers, vec!["AAPL".to_string(), "42".to_string()]);
        assert!(options.quarters.is_empty());
    }
}
