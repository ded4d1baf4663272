use serde_json::Value;

use crate::types::{value_text, Row};

pub const EMPTY_TABLE_MESSAGE: &str = "No rows found.";

/// Text shown in a table cell. Missing keys and `null` both render empty.
pub fn cell_text(value: Option<&Value>) -> String {
    value.map(value_text).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableBody {
    Rows(Vec<Vec<String>>),
    /// A single row spanning every column.
    Placeholder {
        span: usize,
        message: &'static str,
    },
}

/// Render model for one page of a dataset. Rebuilt from scratch for every
/// response so headers never outlive the dataset they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TableModel {
    columns: Vec<String>,
    rows: Vec<Row>,
    body: TableBody,
}

impl TableModel {
    pub fn from_page(columns: &[String], rows: &[Row]) -> Self {
        let body = if rows.is_empty() {
            TableBody::Placeholder {
                span: columns.len().max(1),
                message: EMPTY_TABLE_MESSAGE,
            }
        } else {
            TableBody::Rows(
                rows.iter()
                    .map(|row| {
                        columns
                            .iter()
                            .map(|column| cell_text(row.get(column)))
                            .collect()
                    })
                    .collect(),
            )
        };
        Self {
            columns: columns.to_vec(),
            rows: rows.to_vec(),
            body,
        }
    }

    pub fn empty() -> Self {
        Self::from_page(&[], &[])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn body(&self) -> &TableBody {
        &self.body
    }

    pub fn row_count(&self) -> usize {
        match &self.body {
            TableBody::Rows(rows) => rows.len(),
            TableBody::Placeholder { .. } => 0,
        }
    }

    /// The row object behind the `index`th table row, as the server sent it.
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn cells(&self, index: usize) -> Option<&[String]> {
        match &self.body {
            TableBody::Rows(rows) => rows.get(index).map(Vec::as_slice),
            TableBody::Placeholder { .. } => None,
        }
    }
}

impl Default for TableModel {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn null_and_missing_cells_render_identically() {
        let cols = columns(&["ticker", "eps", "note"]);
        let rows = vec![row(json!({"ticker": "AAPL", "eps": null}))];
        let table = TableModel::from_page(&cols, &rows);
        let cells = table.cells(0).unwrap();
        assert_eq!(cells[1], "");
        assert_eq!(cells[2], "");
        assert_eq!(cells[1], cells[2]);
    }

    #[test]
    fn scalars_stringify_directly() {
        let cols = columns(&["n", "f", "b", "s"]);
        let rows = vec![row(json!({"n": 3, "f": -0.25, "b": true, "s": "x"}))];
        let table = TableModel::from_page(&cols, &rows);
        assert_eq!(table.cells(0).unwrap(), ["3", "-0.25", "true", "x"]);
    }

    #[test]
    fn empty_rows_render_single_spanning_placeholder() {
        let cols = columns(&["a", "b", "c"]);
        let table = TableModel::from_page(&cols, &[]);
        assert_eq!(
            table.body(),
            &TableBody::Placeholder {
                span: 3,
                message: EMPTY_TABLE_MESSAGE
            }
        );
        assert_eq!(table.row_count(), 0);
        assert!(table.cells(0).is_none());
    }

    #[test]
    fn header_follows_latest_columns() {
        let first = TableModel::from_page(&columns(&["a", "b"]), &[row(json!({"a": 1}))]);
        let second = TableModel::from_page(&columns(&["z"]), &[row(json!({"z": 2}))]);
        assert_eq!(first.columns(), ["a", "b"]);
        assert_eq!(second.columns(), ["z"]);
        assert_eq!(second.cells(0).unwrap(), ["2"]);
    }

    #[test]
    fn columns_order_drives_cells() {
        let cols = columns(&["b", "a"]);
        let table = TableModel::from_page(&cols, &[row(json!({"a": "first", "b": "second"}))]);
        assert_eq!(table.cells(0).unwrap(), ["second", "first"]);
    }

    #[test]
    fn selected_row_is_the_original_object() {
        let cols = columns(&["ticker"]);
        let original = row(json!({"ticker": "AAPL", "agent_analysis": {"summary": "s"}}));
        let table = TableModel::from_page(&cols, std::slice::from_ref(&original));
        assert_eq!(table.row(0), Some(&original));
        assert!(table.row(1).is_none());
    }
}
