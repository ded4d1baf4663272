//! Sample earnings-call browser: its own filters, sort order and a per-call
//! detail view. Shares the pagination and generation rules of the dataset
//! browser.

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::{info, warn};
use url::Url;

use crate::pagination::Pagination;
use crate::prelude::*;
use crate::query::{non_empty, QueryPairs};
use crate::session::{Delivery, Ticket};
use crate::types::{value_text, SampleCall, SampleCallPage};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum CallSort {
    #[default]
    DateDesc,
    DateAsc,
    ReturnDesc,
    ReturnAsc,
    ConfidenceDesc,
    TickerAsc,
}

impl CallSort {
    pub fn label(&self) -> &'static str {
        match self {
            CallSort::DateDesc => "Newest first",
            CallSort::DateAsc => "Oldest first",
            CallSort::ReturnDesc => "Highest return",
            CallSort::ReturnAsc => "Lowest return",
            CallSort::ConfidenceDesc => "Most confident",
            CallSort::TickerAsc => "Ticker A-Z",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallFilters {
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub pred_label: Option<String>,
    pub return_min: Option<f64>,
    pub return_max: Option<f64>,
}

impl CallFilters {
    /// Parses a return bound typed by the user. Blank means unbounded.
    pub fn parse_bound(name: &'static str, text: &str) -> Result<Option<f64>> {
        let Some(text) = non_empty(Some(text)) else {
            return Ok(None);
        };
        match text.parse::<f64>() {
            Ok(bound) if bound.is_finite() => Ok(Some(bound)),
            _ => Err(QuarryError::invalid_input(format!(
                "{name} must be a number, got {text:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallsState {
    pagination: Pagination,
    filters: CallFilters,
    sort_by: CallSort,
}

impl CallsState {
    pub fn new(page_size: u32) -> Result<Self> {
        Ok(Self {
            pagination: Pagination::new(page_size)?,
            filters: CallFilters::default(),
            sort_by: CallSort::default(),
        })
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn filters(&self) -> &CallFilters {
        &self.filters
    }

    pub fn sort_by(&self) -> CallSort {
        self.sort_by
    }

    pub fn set_filters(&mut self, filters: CallFilters) {
        self.filters = filters;
        self.pagination.reset();
    }

    pub fn set_sort(&mut self, sort_by: CallSort) {
        self.sort_by = sort_by;
        self.pagination.reset();
    }
}

/// Query string for `/api/sample-calls`.
pub fn build_calls_query(state: &CallsState) -> String {
    let mut query = QueryPairs::new();
    query.push("page", &state.pagination.page().to_string());
    query.push("page_size", &state.pagination.page_size().to_string());
    query.push("sort_by", state.sort_by.as_ref());
    query.push_optional("exchange", state.filters.exchange.as_deref());
    query.push_optional("sector", state.filters.sector.as_deref());
    query.push_optional("pred_label", state.filters.pred_label.as_deref());
    if let Some(min) = state.filters.return_min {
        query.push("return_min", &min.to_string());
    }
    if let Some(max) = state.filters.return_max {
        query.push("return_max", &max.to_string());
    }
    query.finish()
}

/// Path of the detail endpoint for one call, with the id percent-encoded
/// as a single path segment.
pub fn build_call_detail_path(id: &str) -> Result<String> {
    let id = non_empty(Some(id)).ok_or_else(|| QuarryError::missing("id"))?;
    let mut url = Url::parse("http://localhost/")?;
    url.path_segments_mut()
        .map_err(|_| QuarryError::invalid_input("cannot build call detail path"))?
        .extend(["api", "sample-calls", id]);
    Ok(url.path().to_string())
}

pub const CALL_COLUMNS: &[&str] = &[
    "Date",
    "Ticker",
    "Company",
    "Quarter",
    "Sector",
    "Exchange",
    "Return",
    "Prediction",
    "Confidence",
    "Correct",
];

/// One table row for the calls list, aligned with [`CALL_COLUMNS`].
pub fn call_cells(call: &SampleCall) -> Vec<String> {
    vec![
        text(&call.date),
        text(&call.ticker),
        text(&call.company),
        text(&call.quarter),
        text(&call.sector),
        text(&call.exchange),
        percent(call.true_return),
        text(&call.pred_label),
        percent(call.pred_conf),
        verdict(call.is_correct),
    ]
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn percent(fraction: Option<f64>) -> String {
    fraction
        .map(|fraction| format!("{:.2}%", fraction * 100.0))
        .unwrap_or_default()
}

fn verdict(correct: Option<bool>) -> String {
    match correct {
        Some(true) => "✓".to_string(),
        Some(false) => "✗".to_string(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallDetailView {
    pub title: String,
    pub fields: Vec<(String, String)>,
    pub summary: Option<String>,
    pub comparative_points: Vec<String>,
    pub historical_notes: Vec<String>,
    pub token_usage: Vec<(String, String)>,
}

impl CallDetailView {
    pub fn from_call(call: &SampleCall) -> Self {
        let title = match (call.ticker.as_deref(), call.company.as_deref()) {
            (Some(ticker), Some(company)) => format!("{ticker} · {company}"),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => call
                .id
                .as_deref()
                .map(|id| format!("Call {id}"))
                .unwrap_or_else(|| "Call".to_string()),
        };

        let fields = [
            ("Date", text(&call.date)),
            ("Quarter", text(&call.quarter)),
            ("Sector", text(&call.sector)),
            ("Exchange", text(&call.exchange)),
            ("True return", percent(call.true_return)),
            ("Prediction", text(&call.pred_label)),
            ("Confidence", percent(call.pred_conf)),
            ("Correct", verdict(call.is_correct)),
            (
                "LM baseline score",
                call.baseline_lm_score
                    .map(|score| format!("{score:.4}"))
                    .unwrap_or_default(),
            ),
            ("FinBERT prediction", text(&call.finbert_pred)),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        let outputs = call.agent_outputs.clone().unwrap_or_default();
        let mut token_usage: Vec<(String, String)> = call
            .token_usage
            .iter()
            .map(|(key, value)| (key.clone(), value_text(value)))
            .collect();
        token_usage.sort();

        Self {
            title,
            fields,
            summary: outputs.main_summary,
            comparative_points: outputs.comparative_points,
            historical_notes: outputs.historical_notes,
            token_usage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallsRequest {
    pub ticket: Ticket,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub ticket: Ticket,
    pub id: String,
    pub path: String,
}

/// Owner of [`CallsState`], the current list page and the open detail.
#[derive(Debug, Clone)]
pub struct CallsSession {
    state: CallsState,
    calls: Vec<SampleCall>,
    detail: Option<CallDetailView>,
    generation: u64,
    detail_generation: u64,
    /// Adopted as `state` once its page arrives.
    pending: Option<CallsState>,
    loading: bool,
}

impl CallsSession {
    pub fn new(page_size: u32) -> Result<Self> {
        Ok(Self {
            state: CallsState::new(page_size)?,
            calls: Vec::new(),
            detail: None,
            generation: 0,
            detail_generation: 0,
            pending: None,
            loading: false,
        })
    }

    pub fn state(&self) -> &CallsState {
        &self.state
    }

    pub fn calls(&self) -> &[SampleCall] {
        &self.calls
    }

    pub fn detail(&self) -> Option<&CallDetailView> {
        self.detail.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn request(&mut self) -> CallsRequest {
        let state = self.state.clone();
        self.issue(&state)
    }

    fn base(&self) -> CallsState {
        self.pending.clone().unwrap_or_else(|| self.state.clone())
    }

    pub fn apply_filters(&mut self, filters: CallFilters) -> CallsRequest {
        let mut staged = self.base();
        staged.set_filters(filters);
        self.issue(&staged)
    }

    pub fn set_sort(&mut self, sort_by: CallSort) -> CallsRequest {
        let mut staged = self.base();
        staged.set_sort(sort_by);
        self.issue(&staged)
    }

    pub fn next_page(&mut self) -> Option<CallsRequest> {
        self.step(1)
    }

    pub fn prev_page(&mut self) -> Option<CallsRequest> {
        self.step(-1)
    }

    fn step(&mut self, delta: i64) -> Option<CallsRequest> {
        let mut staged = self.base();
        if !staged.pagination.advance(delta) {
            return None;
        }
        Some(self.issue(&staged))
    }

    fn issue(&mut self, state: &CallsState) -> CallsRequest {
        self.generation += 1;
        self.pending = Some(state.clone());
        self.loading = true;
        CallsRequest {
            ticket: Ticket::new(self.generation),
            query: build_calls_query(state),
        }
    }

    pub fn accept(&mut self, ticket: Ticket, page: SampleCallPage) -> Delivery<CallsRequest> {
        if ticket.generation() != self.generation {
            warn!(
                "Dropping stale sample-calls response (generation {} < {})",
                ticket.generation(),
                self.generation
            );
            return Delivery::Stale;
        }
        let mut staged = self.base();
        let (requested, page_size) = (staged.pagination.page(), staged.pagination.page_size());
        if staged
            .pagination
            .sync_from_server(requested, page_size, page.total)
        {
            return Delivery::Refetch(self.issue(&staged));
        }
        self.state = staged;
        self.pending = None;
        self.calls = page.rows;
        self.loading = false;
        Delivery::Applied
    }

    pub fn fail(&mut self, ticket: Ticket) -> bool {
        if ticket.generation() != self.generation {
            return false;
        }
        self.pending = None;
        self.loading = false;
        true
    }

    /// Blank ids are rejected here, before any request exists.
    pub fn open_detail(&mut self, id: &str) -> Result<DetailRequest> {
        let path = build_call_detail_path(id)?;
        self.detail_generation += 1;
        info!("Opening sample call {}", id.trim());
        Ok(DetailRequest {
            ticket: Ticket::new(self.detail_generation),
            id: id.trim().to_string(),
            path,
        })
    }

    pub fn accept_detail(&mut self, ticket: Ticket, call: &SampleCall) -> Delivery {
        if ticket.generation() != self.detail_generation {
            return Delivery::Stale;
        }
        self.detail = Some(CallDetailView::from_call(call));
        Delivery::Applied
    }

    pub fn is_current_detail(&self, ticket: Ticket) -> bool {
        ticket.generation() == self.detail_generation
    }

    pub fn close_detail(&mut self) {
        self.detail_generation += 1;
        self.detail = None;
    }
}
