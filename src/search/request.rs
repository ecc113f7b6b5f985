//! Runtime search request

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default number of hits per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PageRequest {
    /// Offset of the first hit
    #[serde(default)]
    pub from: usize,

    /// Number of hits to return
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            from: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// A decoded search request for one domain
///
/// Selected values are kept in request order and deduplicated, so every
/// downstream rendering (query clauses, applied filters) is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text term; empty or absent matches everything
    pub query: Option<String>,

    /// Selected values keyed by filter identifier
    #[serde(default)]
    pub filters: IndexMap<String, IndexSet<String>>,

    /// Selected sort option id; absent means the domain default
    pub sort_by: Option<String>,

    #[serde(default)]
    pub page: PageRequest,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the free-text term
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Add one selected value for a filter
    pub fn with_filter(mut self, identifier: impl Into<String>, value: impl Into<String>) -> Self {
        self.select(identifier, value);
        self
    }

    /// Select a sort option
    pub fn with_sort(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self
    }

    /// Set the pagination window
    pub fn with_page(mut self, from: usize, size: usize) -> Self {
        self.page = PageRequest { from, size };
        self
    }

    pub fn select(&mut self, identifier: impl Into<String>, value: impl Into<String>) {
        self.filters
            .entry(identifier.into())
            .or_default()
            .insert(value.into());
    }

    /// Non-empty selection for a filter, if any
    pub fn selection(&self, identifier: &str) -> Option<&IndexSet<String>> {
        self.filters.get(identifier).filter(|values| !values.is_empty())
    }

    /// Trimmed free-text term, `None` when blank
    pub fn term(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}
