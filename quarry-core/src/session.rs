//! The browse session: sole owner of [`BrowseState`].
//!
//! Every user action goes through a method here and comes back as a
//! request description tagged with a [`Ticket`]. The caller performs the
//! request however it likes and hands the response back with the same
//! ticket; responses whose ticket is no longer current are dropped.

use tracing::{info, warn};

use crate::inspector::RowDetail;
use crate::options::{FilterSelections, OptionSet};
use crate::prelude::*;
use crate::query::{build_options_query, build_query, non_empty, BrowseState};
use crate::table::TableModel;
use crate::types::{OptionsPayload, RowPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub(crate) fn new(generation: u64) -> Self {
        Self { generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRequest {
    pub ticket: Ticket,
    pub dataset: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsRequest {
    pub ticket: Ticket,
    pub dataset: String,
    pub query: String,
}

/// Both requests a dataset switch needs. State has already been reset by
/// the time this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSwitch {
    pub options: OptionsRequest,
    pub rows: RowRequest,
}

/// Outcome of handing a response back to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<R = ()> {
    Applied,
    /// The response answers a request that has since been superseded.
    Stale,
    /// The response moved the cursor (the page was clamped), so the page it
    /// carried is not the one now selected.
    Refetch(R),
}

#[derive(Debug, Clone)]
pub struct BrowseSession {
    datasets: Vec<String>,
    state: BrowseState,
    selections: FilterSelections,
    table: TableModel,
    selected: Option<usize>,
    /// Bumped by every action that issues a row request.
    generation: u64,
    /// Bumped by dataset switches only; option domains are per dataset.
    dataset_epoch: u64,
    /// State behind the request in flight. `state` only takes it over once
    /// that request's page arrives.
    pending: Option<BrowseState>,
    loading: bool,
}

impl BrowseSession {
    pub fn new(page_size: u32) -> Result<Self> {
        Ok(Self {
            datasets: Vec::new(),
            state: BrowseState::new(page_size)?,
            selections: FilterSelections::default(),
            table: TableModel::empty(),
            selected: None,
            generation: 0,
            dataset_epoch: 0,
            pending: None,
            loading: false,
        })
    }

    pub fn datasets(&self) -> &[String] {
        &self.datasets
    }

    pub fn state(&self) -> &BrowseState {
        &self.state
    }

    pub fn selections(&self) -> &FilterSelections {
        &self.selections
    }

    pub fn table(&self) -> &TableModel {
        &self.table
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation
    }

    pub fn is_current_options(&self, ticket: Ticket) -> bool {
        ticket.generation == self.dataset_epoch
    }

    /// Stores the dataset list. Returns the dataset to open when nothing is
    /// selected yet.
    pub fn set_datasets(&mut self, datasets: Vec<String>) -> Option<String> {
        self.datasets = datasets;
        if self.state.dataset().is_some() {
            return None;
        }
        self.datasets.first().cloned()
    }

    pub fn select_dataset(&mut self, dataset: &str) -> Result<DatasetSwitch> {
        let dataset = non_empty(Some(dataset)).ok_or_else(|| QuarryError::missing("dataset"))?;
        if !self.datasets.is_empty() && !self.datasets.iter().any(|known| known == dataset) {
            return Err(QuarryError::invalid_input(format!(
                "unknown dataset: {dataset}"
            )));
        }

        info!("Switching dataset to {dataset}");
        self.state.set_dataset(dataset);
        self.selections.reset_for_dataset();
        self.table = TableModel::empty();
        self.selected = None;
        self.dataset_epoch += 1;

        let options = OptionsRequest {
            ticket: Ticket::new(self.dataset_epoch),
            dataset: dataset.to_string(),
            query: build_options_query(dataset)?,
        };
        let rows = self.row_request()?;
        Ok(DatasetSwitch { options, rows })
    }

    pub fn accept_options(
        &mut self,
        ticket: Ticket,
        dataset: &str,
        payload: OptionsPayload,
    ) -> Delivery {
        if ticket.generation != self.dataset_epoch || self.state.dataset() != Some(dataset) {
            warn!("Dropping stale options response for dataset {dataset}");
            return Delivery::Stale;
        }
        self.selections.replace_options(OptionSet::from(payload));
        Delivery::Applied
    }

    /// Issues a request for the current state as it stands.
    pub fn row_request(&mut self) -> Result<RowRequest> {
        let state = self.state.clone();
        self.issue(&state)
    }

    /// The state later transitions build on: whatever was asked for last,
    /// even if it has not been answered yet.
    fn base(&self) -> BrowseState {
        self.pending.clone().unwrap_or_else(|| self.state.clone())
    }

    pub fn apply_filters(
        &mut self,
        ticker: Option<&str>,
        quarter: Option<&str>,
        search: Option<&str>,
    ) -> Result<RowRequest> {
        let mut selections = self.selections.clone();
        selections.select_ticker(ticker)?;
        selections.select_quarter(quarter)?;
        selections.set_search(search);
        let mut staged = self.base();
        staged.apply_filters(selections.to_filters());
        self.issue(&staged)
    }

    pub fn reset_filters(&mut self) -> Result<RowRequest> {
        let mut staged = self.base();
        staged.reset_filters();
        self.issue(&staged)
    }

    pub fn set_sort(&mut self, sort: Option<String>) -> Result<RowRequest> {
        let mut staged = self.base();
        staged.set_sort(sort);
        self.issue(&staged)
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Result<RowRequest> {
        let mut staged = self.base();
        staged.set_page_size(page_size)?;
        self.issue(&staged)
    }

    /// `None` when already on the last page.
    pub fn next_page(&mut self) -> Result<Option<RowRequest>> {
        self.step(1)
    }

    /// `None` when already on the first page.
    pub fn prev_page(&mut self) -> Result<Option<RowRequest>> {
        self.step(-1)
    }

    fn step(&mut self, delta: i64) -> Result<Option<RowRequest>> {
        let mut staged = self.base();
        if !staged.pagination_mut().advance(delta) {
            return Ok(None);
        }
        self.issue(&staged).map(Some)
    }

    /// Nothing a request asks for is visible until its page arrives, so a
    /// failed fetch leaves the cursor, filters and table together.
    fn issue(&mut self, state: &BrowseState) -> Result<RowRequest> {
        let query = build_query(state)?;
        let dataset = state
            .dataset()
            .ok_or_else(|| QuarryError::missing("dataset"))?
            .to_string();
        self.generation += 1;
        self.pending = Some(state.clone());
        self.loading = true;
        Ok(RowRequest {
            ticket: Ticket::new(self.generation),
            dataset,
            query,
        })
    }

    pub fn accept_rows(&mut self, ticket: Ticket, page: RowPage) -> Result<Delivery<RowRequest>> {
        if !self.is_current(ticket) {
            warn!(
                "Dropping stale rows response (generation {} < {})",
                ticket.generation, self.generation
            );
            return Ok(Delivery::Stale);
        }
        if let Some(dataset) = page.dataset.as_deref() {
            if self.state.dataset() != Some(dataset) {
                warn!("Dropping rows response for dataset {dataset}");
                return Ok(Delivery::Stale);
            }
        }

        let mut staged = self.base();
        let echoed = page.page.unwrap_or_else(|| staged.pagination().page());
        let clamped = staged
            .pagination_mut()
            .sync_from_server(echoed, page.page_size, page.total);
        if clamped {
            info!(
                "Page {echoed} is past the end, refetching page {}",
                staged.pagination().page()
            );
            return Ok(Delivery::Refetch(self.issue(&staged)?));
        }

        self.selections.adopt(staged.filters());
        self.state = staged;
        self.pending = None;
        self.table = TableModel::from_page(&page.columns, &page.rows);
        self.selected = None;
        self.loading = false;
        Ok(Delivery::Applied)
    }

    /// Returns `true` when the failed request was still current and the
    /// error should be reported. The last page that loaded stays in place.
    pub fn fail_rows(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.pending = None;
        self.loading = false;
        true
    }

    pub fn select_row(&mut self, index: usize) -> Option<RowDetail> {
        let row = self.table.row(index)?;
        let detail = RowDetail::new(self.table.columns(), row);
        self.selected = Some(index);
        Some(detail)
    }
}
