use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use quarry_core::client::ExplorerApi;
use quarry_core::errors::ErrorKind;
use quarry_core::graph::GraphView;
use quarry_core::prelude::*;
use quarry_core::session::{BrowseSession, Delivery};
use quarry_core::table::{TableBody, EMPTY_TABLE_MESSAGE};
use quarry_core::types::{
    DatasetList, GraphPayload, OptionsPayload, RowPage, SampleCall, SampleCallPage,
};
use serde_json::json;

/// Canned responses keyed by query string.
struct FakeApi {
    rows: HashMap<String, serde_json::Value>,
    failing: Mutex<Vec<String>>,
}

impl FakeApi {
    fn new() -> Self {
        let mut rows = HashMap::new();
        rows.insert(
            "dataset=a.csv&page=1&page_size=2".to_string(),
            json!({"dataset": "a.csv", "columns": ["ticker", "eps"],
                   "rows": [{"ticker": "AAPL", "eps": 1.2}, {"ticker": "MSFT", "eps": null}],
                   "page": 1, "page_size": 2, "total": 3}),
        );
        rows.insert(
            "dataset=a.csv&page=2&page_size=2".to_string(),
            json!({"dataset": "a.csv", "columns": ["ticker", "eps"],
                   "rows": [{"ticker": "TSLA", "eps": -0.3}],
                   "page": 2, "page_size": 2, "total": 3}),
        );
        rows.insert(
            "dataset=b.csv&page=1&page_size=2".to_string(),
            json!({"dataset": "b.csv", "columns": ["metric"], "rows": [],
                   "page": 1, "page_size": 2, "total": 0}),
        );
        Self {
            rows,
            failing: Mutex::new(Vec::new()),
        }
    }

    fn fail_next(&self, query: &str) {
        self.failing.lock().unwrap().push(query.to_string());
    }
}

#[async_trait]
impl ExplorerApi for FakeApi {
    async fn list_datasets(&self) -> Result<DatasetList> {
        Ok(DatasetList {
            datasets: vec!["a.csv".to_string(), "b.csv".to_string()],
        })
    }

    async fn fetch_options(&self, query: &str) -> Result<OptionsPayload> {
        let tickers = if query.ends_with("a.csv") {
            vec!["AAPL".to_string(), "MSFT".to_string(), "TSLA".to_string()]
        } else {
            Vec::new()
        };
        Ok(OptionsPayload {
            tickers,
            quarters: vec!["2024-Q1".to_string()],
        })
    }

    async fn fetch_rows(&self, query: &str) -> Result<RowPage> {
        let mut failing = self.failing.lock().unwrap();
        if let Some(index) = failing.iter().position(|failing| failing == query) {
            failing.remove(index);
            return Err(ErrorKind::Http {
                action: "Load rows",
                status: 503,
                message: "Load rows failed: 503".to_string(),
            }
            .into());
        }
        let value = self
            .rows
            .get(query)
            .cloned()
            .ok_or_else(|| QuarryError::invalid_input(format!("unexpected query {query}")))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn fetch_graph(&self, _query: &str) -> Result<GraphPayload> {
        Ok(serde_json::from_value(json!({
            "nodes": [
                {"id": 1, "labels": ["Ticker"], "properties": {"ticker": "AAPL"}},
                {"id": 2, "labels": ["Fact"], "properties": {"metric": "EPS"}}
            ],
            "edges": [{"id": 10, "source": 1, "target": 2, "type": "HAS_FACT"}]
        }))?)
    }

    async fn fetch_sample_calls(&self, _query: &str) -> Result<SampleCallPage> {
        Ok(SampleCallPage::default())
    }

    async fn fetch_call_detail(&self, id: &str) -> Result<SampleCall> {
        Ok(SampleCall {
            id: Some(id.to_string()),
            ..SampleCall::default()
        })
    }
}

#[tokio::test]
async fn late_rows_for_previous_dataset_do_not_replace_current_view() {
    let api = FakeApi::new();
    let mut session = BrowseSession::new(2).unwrap();
    let first = session.set_datasets(api.list_datasets().await.unwrap().datasets);
    assert_eq!(first.as_deref(), Some("a.csv"));

    let switch_a = session.select_dataset("a.csv").unwrap();
    let switch_b = session.select_dataset("b.csv").unwrap();

    // b answers first, a arrives late.
    let page_b = api.fetch_rows(&switch_b.rows.query).await.unwrap();
    let page_a = api.fetch_rows(&switch_a.rows.query).await.unwrap();
    assert_eq!(
        session.accept_rows(switch_b.rows.ticket, page_b).unwrap(),
        Delivery::Applied
    );
    assert_eq!(
        session.accept_rows(switch_a.rows.ticket, page_a).unwrap(),
        Delivery::Stale
    );

    assert_eq!(session.state().dataset(), Some("b.csv"));
    assert_eq!(session.table().columns(), ["metric"]);
    assert_eq!(
        session.table().body(),
        &TableBody::Placeholder {
            span: 1,
            message: EMPTY_TABLE_MESSAGE
        }
    );

    let options_a = api.fetch_options(&switch_a.options.query).await.unwrap();
    assert_eq!(
        session.accept_options(switch_a.options.ticket, &switch_a.options.dataset, options_a),
        Delivery::Stale
    );
    assert!(session.selections().options().tickers().next().is_none());
}

#[tokio::test]
async fn failed_navigation_keeps_last_good_page() {
    let api = FakeApi::new();
    let mut session = BrowseSession::new(2).unwrap();
    session.set_datasets(api.list_datasets().await.unwrap().datasets);
    let switch = session.select_dataset("a.csv").unwrap();
    let page = api.fetch_rows(&switch.rows.query).await.unwrap();
    session.accept_rows(switch.rows.ticket, page).unwrap();
    assert_eq!(session.state().pagination().page_label(), "Page 1 / 2");

    let next = session.next_page().unwrap().unwrap();
    api.fail_next(&next.query);
    let err = api.fetch_rows(&next.query).await.unwrap_err();
    assert!(session.fail_rows(next.ticket));
    assert_eq!(err.to_string(), "Load rows failed: 503");
    assert_eq!(session.state().pagination().page(), 1);
    assert_eq!(session.table().cells(0).unwrap()[0], "AAPL");

    let next = session.next_page().unwrap().unwrap();
    let page = api.fetch_rows(&next.query).await.unwrap();
    session.accept_rows(next.ticket, page).unwrap();
    assert_eq!(session.state().pagination().page(), 2);
    assert!(!session.state().pagination().can_next());
    assert_eq!(session.table().cells(0).unwrap(), ["TSLA", "-0.3"]);
}

#[tokio::test]
async fn failed_filter_fetch_keeps_last_good_page() {
    let api = FakeApi::new();
    let mut session = BrowseSession::new(2).unwrap();
    session.set_datasets(api.list_datasets().await.unwrap().datasets);
    let switch = session.select_dataset("a.csv").unwrap();
    let options = api.fetch_options(&switch.options.query).await.unwrap();
    session.accept_options(switch.options.ticket, &switch.options.dataset, options);
    let page = api.fetch_rows(&switch.rows.query).await.unwrap();
    session.accept_rows(switch.rows.ticket, page).unwrap();
    let next = session.next_page().unwrap().unwrap();
    let page = api.fetch_rows(&next.query).await.unwrap();
    session.accept_rows(next.ticket, page).unwrap();

    let filtered = session.apply_filters(Some("AAPL"), None, None).unwrap();
    assert_eq!(filtered.query, "dataset=a.csv&page=1&page_size=2&ticker=AAPL");
    api.fail_next(&filtered.query);
    assert!(api.fetch_rows(&filtered.query).await.is_err());
    assert!(session.fail_rows(filtered.ticket));

    assert_eq!(session.state().pagination().page_label(), "Page 2 / 2");
    assert_eq!(session.selections().ticker(), None);
    assert_eq!(session.table().cells(0).unwrap(), ["TSLA", "-0.3"]);
    assert_eq!(session.next_page().unwrap(), None);
    let prev = session.prev_page().unwrap().unwrap();
    assert_eq!(prev.query, "dataset=a.csv&page=1&page_size=2");
}

#[tokio::test]
async fn dataset_switch_clears_selected_filters() {
    let api = FakeApi::new();
    let mut session = BrowseSession::new(2).unwrap();
    session.set_datasets(api.list_datasets().await.unwrap().datasets);

    let switch = session.select_dataset("a.csv").unwrap();
    let options = api.fetch_options(&switch.options.query).await.unwrap();
    session.accept_options(switch.options.ticket, &switch.options.dataset, options);
    let request = session.apply_filters(Some("AAPL"), Some("2024-Q1"), None).unwrap();
    assert!(request.query.contains("ticker=AAPL"));

    let switch = session.select_dataset("a.csv").unwrap();
    assert_eq!(switch.rows.query, "dataset=a.csv&page=1&page_size=2");
    assert_eq!(session.selections().ticker(), None);
    assert_eq!(session.selections().quarter(), None);
}

#[tokio::test]
async fn row_selection_feeds_the_inspector() {
    let api = FakeApi::new();
    let mut session = BrowseSession::new(2).unwrap();
    session.set_datasets(api.list_datasets().await.unwrap().datasets);
    let switch = session.select_dataset("a.csv").unwrap();
    let page = api.fetch_rows(&switch.rows.query).await.unwrap();
    session.accept_rows(switch.rows.ticket, page).unwrap();

    let detail = session.select_row(1).unwrap();
    assert_eq!(
        detail.fields,
        vec![
            ("ticker".to_string(), "MSFT".to_string()),
            ("eps".to_string(), String::new())
        ]
    );
    assert_eq!(
        detail.baseline.message(),
        Some("No baseline metrics for this dataset.")
    );
}

#[tokio::test]
async fn graph_loads_replace_previous_model() {
    let api = FakeApi::new();
    let mut view = GraphView::new(50);
    for ticker in ["AAPL", "MSFT"] {
        let request = view.request(Some(ticker.to_string()));
        let payload = api.fetch_graph(&request.query).await.unwrap();
        assert!(view.accept(request.ticket, &payload));
    }
    let model = view.model();
    assert_eq!(model.nodes().len(), 2);
    assert_eq!(model.edges().len(), 1);
    assert_eq!(model.nodes()[0].label, "AAPL");
    assert_eq!(model.nodes()[1].label, "EPS");
    assert_eq!(model.edges()[0].label, "HAS_FACT");
}
