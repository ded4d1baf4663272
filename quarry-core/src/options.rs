use std::collections::BTreeSet;

use crate::prelude::*;
use crate::query::{non_empty, RowFilters};
use crate::types::OptionsPayload;

/// Valid filter values for one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    tickers: BTreeSet<String>,
    quarters: BTreeSet<String>,
}

impl From<OptionsPayload> for OptionSet {
    fn from(payload: OptionsPayload) -> Self {
        let clean = |values: Vec<String>| {
            values
                .into_iter()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect::<BTreeSet<_>>()
        };
        Self {
            tickers: clean(payload.tickers),
            quarters: clean(payload.quarters),
        }
    }
}

impl OptionSet {
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.tickers.iter().map(String::as_str)
    }

    pub fn quarters(&self) -> impl Iterator<Item = &str> {
        self.quarters.iter().map(String::as_str)
    }

    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.tickers.contains(ticker)
    }

    pub fn has_quarter(&self, quarter: &str) -> bool {
        self.quarters.contains(quarter)
    }

    /// An empty domain (never loaded, or the fetch failed) accepts any
    /// ticker; the server matches it as free text.
    pub fn allows_ticker(&self, ticker: &str) -> bool {
        self.tickers.is_empty() || self.has_ticker(ticker)
    }

    pub fn allows_quarter(&self, quarter: &str) -> bool {
        self.quarters.is_empty() || self.has_quarter(quarter)
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty() && self.quarters.is_empty()
    }
}

/// Filter choices for the selected dataset together with the domain they
/// are validated against. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelections {
    options: OptionSet,
    ticker: Option<String>,
    quarter: Option<String>,
    search: Option<String>,
}

impl FilterSelections {
    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn ticker(&self) -> Option<&str> {
        self.ticker.as_deref()
    }

    pub fn quarter(&self) -> Option<&str> {
        self.quarter.as_deref()
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Drops the previous dataset's domain and every selection, whether or
    /// not the next dataset turns out to offer the same values.
    pub fn reset_for_dataset(&mut self) {
        *self = Self::default();
    }

    /// Installs a freshly fetched domain. Selections that the new domain
    /// does not contain are cleared.
    pub fn replace_options(&mut self, options: OptionSet) {
        self.options = options;
        if self
            .ticker
            .as_deref()
            .is_some_and(|ticker| !self.options.allows_ticker(ticker))
        {
            self.ticker = None;
        }
        if self
            .quarter
            .as_deref()
            .is_some_and(|quarter| !self.options.allows_quarter(quarter))
        {
            self.quarter = None;
        }
    }

    pub fn select_ticker(&mut self, ticker: Option<&str>) -> Result<()> {
        match non_empty(ticker) {
            None => self.ticker = None,
            Some(ticker) if self.options.allows_ticker(ticker) => {
                self.ticker = Some(ticker.to_string());
            }
            Some(ticker) => {
                return Err(QuarryError::invalid_input(format!(
                    "ticker {ticker} is not available for this dataset"
                )))
            }
        }
        Ok(())
    }

    pub fn select_quarter(&mut self, quarter: Option<&str>) -> Result<()> {
        match non_empty(quarter) {
            None => self.quarter = None,
            Some(quarter) if self.options.allows_quarter(quarter) => {
                self.quarter = Some(quarter.to_string());
            }
            Some(quarter) => {
                return Err(QuarryError::invalid_input(format!(
                    "quarter {quarter} is not available for this dataset"
                )))
            }
        }
        Ok(())
    }

    pub fn set_search(&mut self, search: Option<&str>) {
        self.search = non_empty(search).map(str::to_string);
    }

    /// Takes over the filters of a page that has just loaded. They were
    /// validated when the request was built.
    pub fn adopt(&mut self, filters: &RowFilters) {
        self.ticker = filters.ticker.clone();
        self.quarter = filters.quarter.clone();
        self.search = filters.search.clone();
    }

    /// Clears the selections but keeps the domain.
    pub fn clear(&mut self) {
        self.ticker = None;
        self.quarter = None;
        self.search = None;
    }

    pub fn to_filters(&self) -> RowFilters {
        RowFilters {
            ticker: self.ticker.clone(),
            quarter: self.quarter.clone(),
            search: self.search.clone(),
        }
    }
}
