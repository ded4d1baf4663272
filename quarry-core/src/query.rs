//! Canonical query strings for the explorer endpoints.
//!
//! Required parameters always come first, in a fixed order; optional filters
//! follow and are dropped entirely when empty.

use url::form_urlencoded::Serializer;

use crate::pagination::Pagination;
use crate::prelude::*;

pub const DEFAULT_GRAPH_LIMIT: u32 = 50;
pub const MAX_GRAPH_LIMIT: u32 = 500;

/// Row filters sent with `/api/rows`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilters {
    pub ticker: Option<String>,
    pub quarter: Option<String>,
    pub search: Option<String>,
}

impl RowFilters {
    pub fn is_empty(&self) -> bool {
        non_empty(self.ticker.as_deref()).is_none()
            && non_empty(self.quarter.as_deref()).is_none()
            && non_empty(self.search.as_deref()).is_none()
    }
}

/// Client-held browsing state. Only the session mutates it, and only in
/// response to user actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseState {
    dataset: Option<String>,
    pagination: Pagination,
    filters: RowFilters,
    sort: Option<String>,
}

impl BrowseState {
    pub fn new(page_size: u32) -> Result<Self> {
        Ok(Self {
            dataset: None,
            pagination: Pagination::new(page_size)?,
            filters: RowFilters::default(),
            sort: None,
        })
    }

    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn filters(&self) -> &RowFilters {
        &self.filters
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    /// Switches dataset: filters, sort, page and the known total all start
    /// over. The page size is kept.
    pub fn set_dataset(&mut self, dataset: impl Into<String>) {
        self.dataset = Some(dataset.into());
        self.filters = RowFilters::default();
        self.sort = None;
        self.pagination.sync_from_server(1, 0, 0);
    }

    /// A new filter invalidates the previous page context.
    pub fn apply_filters(&mut self, filters: RowFilters) {
        self.filters = filters;
        self.pagination.reset();
    }

    pub fn reset_filters(&mut self) {
        self.apply_filters(RowFilters::default());
    }

    pub fn set_sort(&mut self, sort: Option<String>) {
        self.sort = sort;
        self.pagination.reset();
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Result<()> {
        self.pagination.set_page_size(page_size)
    }

    pub(crate) fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }
}

/// Query string for `/api/rows`.
pub fn build_query(state: &BrowseState) -> Result<String> {
    let dataset = non_empty(state.dataset()).ok_or_else(|| QuarryError::missing("dataset"))?;
    let pagination = state.pagination();
    let mut query = QueryPairs::new();
    query.push("dataset", dataset);
    query.push("page", &pagination.page().to_string());
    query.push("page_size", &pagination.page_size().to_string());
    query.push_optional("ticker", state.filters.ticker.as_deref());
    query.push_optional("quarter", state.filters.quarter.as_deref());
    query.push_optional("search", state.filters.search.as_deref());
    query.push_optional("sort_by", state.sort());
    Ok(query.finish())
}

/// Query string for `/api/options`.
pub fn build_options_query(dataset: &str) -> Result<String> {
    let dataset = non_empty(Some(dataset)).ok_or_else(|| QuarryError::missing("dataset"))?;
    let mut query = QueryPairs::new();
    query.push("dataset", dataset);
    Ok(query.finish())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQuery {
    pub ticker: Option<String>,
    pub limit: u32,
}

impl Default for GraphQuery {
    fn default() -> Self {
        Self {
            ticker: None,
            limit: DEFAULT_GRAPH_LIMIT,
        }
    }
}

/// Query string for `/api/graph`. The limit is clamped to what the server
/// accepts.
pub fn build_graph_query(graph: &GraphQuery) -> String {
    let mut query = QueryPairs::new();
    query.push_optional("ticker", graph.ticker.as_deref());
    query.push("limit", &clamp_graph_limit(graph.limit).to_string());
    query.finish()
}

pub fn clamp_graph_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_GRAPH_LIMIT)
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) struct QueryPairs {
    serializer: Serializer<'static, String>,
}

impl QueryPairs {
    pub(crate) fn new() -> Self {
        Self {
            serializer: Serializer::new(String::new()),
        }
    }

    pub(crate) fn push(&mut self, key: &str, value: &str) {
        self.serializer.append_pair(key, value);
    }

    pub(crate) fn push_optional(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = non_empty(value) {
            self.push(key, value);
        }
    }

    pub(crate) fn finish(mut self) -> String {
        self.serializer.finish()
    }
}
