//! Filter strategies
//!
//! A filter strategy turns the values a user selected for one identifier into
//! a non-scoring query fragment, and renders each selected value as an
//! [`AppliedFilter`] for display. The set of strategies is closed: every
//! variant of [`FilterStrategy`] answers the same three questions
//! (`identifier`, `compile_fragment`, `describe_selection`).

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{SearchError, SearchResult};
use super::query::{QueryFragment, RangeValue};

/// Identifier of the value-tag filter
pub const CUSTOM_FILTER_ID: &str = "CustomFilter";

/// Keyword field the value-tag filter matches on
pub const DEFAULT_TAG_FIELD: &str = "tag";

/// Separator between the bounds of a range value, e.g. `10..20`
pub const RANGE_SEPARATOR: &str = "..";

/// Kind of an applied filter descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedFilterKind {
    ValueSelectedFilter,
    NumericRangeSelectedFilter,
    DateRangeSelectedFilter,
}

impl AppliedFilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppliedFilterKind::ValueSelectedFilter => "ValueSelectedFilter",
            AppliedFilterKind::NumericRangeSelectedFilter => "NumericRangeSelectedFilter",
            AppliedFilterKind::DateRangeSelectedFilter => "DateRangeSelectedFilter",
        }
    }
}

/// Display rendering of one currently selected filter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFilter {
    pub kind: AppliedFilterKind,
    /// `identifier + "_" + value`, unique across the applied filters
    pub id: String,
    pub identifier: String,
    pub label: String,
    pub value: String,
    pub display: String,
}

/// Exact match on a tag field, fixed identity [`CUSTOM_FILTER_ID`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTagFilter {
    pub field: String,
}

impl Default for ValueTagFilter {
    fn default() -> Self {
        Self {
            field: DEFAULT_TAG_FIELD.to_string(),
        }
    }
}

/// Match on a field against one or more selected discrete values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermFilter {
    pub identifier: String,
    pub field: String,
    pub label: String,
    /// When false only the first selected value (in request order) is used
    pub multiple_select: bool,
    pub exclude_own_filters: bool,
}

impl TermFilter {
    pub fn new(
        identifier: impl Into<String>,
        field: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            field: field.into(),
            label: label.into(),
            multiple_select: false,
            exclude_own_filters: false,
        }
    }

    pub fn multiple_select(mut self, enabled: bool) -> Self {
        self.multiple_select = enabled;
        self
    }

    pub fn exclude_own_filters(mut self, enabled: bool) -> Self {
        self.exclude_own_filters = enabled;
        self
    }
}

/// Half-open numeric or date range on a field; values are `min..max`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFilter {
    pub identifier: String,
    pub field: String,
    pub label: String,
    pub exclude_own_filters: bool,
}

impl RangeFilter {
    pub fn new(
        identifier: impl Into<String>,
        field: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            field: field.into(),
            label: label.into(),
            exclude_own_filters: false,
        }
    }

    pub fn exclude_own_filters(mut self, enabled: bool) -> Self {
        self.exclude_own_filters = enabled;
        self
    }
}

/// A unit of query-building logic bound to one request identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStrategy {
    ValueTag(ValueTagFilter),
    Term(TermFilter),
    NumericRange(RangeFilter),
    DateRange(RangeFilter),
}

impl FilterStrategy {
    /// Stable identifier correlating request selections and descriptors
    pub fn identifier(&self) -> &str {
        match self {
            FilterStrategy::ValueTag(_) => CUSTOM_FILTER_ID,
            FilterStrategy::Term(filter) => &filter.identifier,
            FilterStrategy::NumericRange(filter) | FilterStrategy::DateRange(filter) => {
                &filter.identifier
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FilterStrategy::ValueTag(_) => "Custom Filter",
            FilterStrategy::Term(filter) => &filter.label,
            FilterStrategy::NumericRange(filter) | FilterStrategy::DateRange(filter) => {
                &filter.label
            }
        }
    }

    pub fn field(&self) -> &str {
        match self {
            FilterStrategy::ValueTag(filter) => &filter.field,
            FilterStrategy::Term(filter) => &filter.field,
            FilterStrategy::NumericRange(filter) | FilterStrategy::DateRange(filter) => {
                &filter.field
            }
        }
    }

    /// Whether facet counts backed by this filter ignore its own selection
    pub fn exclude_own_filters(&self) -> bool {
        match self {
            FilterStrategy::ValueTag(_) => false,
            FilterStrategy::Term(filter) => filter.exclude_own_filters,
            FilterStrategy::NumericRange(filter) | FilterStrategy::DateRange(filter) => {
                filter.exclude_own_filters
            }
        }
    }

    fn display(&self) -> &'static str {
        match self {
            FilterStrategy::ValueTag(_) => "Custom",
            FilterStrategy::Term(_) => "Term",
            FilterStrategy::NumericRange(_) => "Range",
            FilterStrategy::DateRange(_) => "DateRange",
        }
    }

    fn kind(&self) -> AppliedFilterKind {
        match self {
            FilterStrategy::ValueTag(_) | FilterStrategy::Term(_) => {
                AppliedFilterKind::ValueSelectedFilter
            }
            FilterStrategy::NumericRange(_) => AppliedFilterKind::NumericRangeSelectedFilter,
            FilterStrategy::DateRange(_) => AppliedFilterKind::DateRangeSelectedFilter,
        }
    }

    /// The selected values this strategy honours.
    ///
    /// Single-select term filters keep the first value in request order and
    /// ignore the rest; every other strategy keeps all values.
    pub fn effective_values<'a>(
        &self,
        values: &'a IndexSet<String>,
    ) -> impl Iterator<Item = &'a String> + 'a {
        let limit = match self {
            FilterStrategy::Term(filter) if !filter.multiple_select => 1,
            _ => usize::MAX,
        };
        values.iter().take(limit)
    }

    /// Build the non-scoring fragment for the selected values.
    ///
    /// Values are combined as alternatives. An empty selection yields `None`
    /// and never narrows the result set.
    pub fn compile_fragment(&self, values: &IndexSet<String>) -> SearchResult<Option<QueryFragment>> {
        if let FilterStrategy::Term(filter) = self {
            if !filter.multiple_select && values.len() > 1 {
                warn!(
                    identifier = %filter.identifier,
                    selected = values.len(),
                    "Single-select filter received several values; keeping the first"
                );
            }
        }

        let clauses = self
            .effective_values(values)
            .map(|value| self.clause(value))
            .collect::<SearchResult<Vec<_>>>()?;

        Ok(QueryFragment::any_of(clauses))
    }

    fn clause(&self, value: &str) -> SearchResult<QueryFragment> {
        match self {
            FilterStrategy::ValueTag(_) | FilterStrategy::Term(_) => {
                Ok(QueryFragment::term(self.field(), value))
            }
            FilterStrategy::NumericRange(_) => {
                let (gte, lt) = self.parse_range(value, parse_number)?;
                Ok(QueryFragment::Range {
                    field: self.field().to_string(),
                    gte: gte.map(RangeValue::Number),
                    lt: lt.map(RangeValue::Number),
                })
            }
            FilterStrategy::DateRange(_) => {
                let (gte, lt) = self.parse_range(value, parse_date)?;
                Ok(QueryFragment::Range {
                    field: self.field().to_string(),
                    gte: gte.map(RangeValue::Date),
                    lt: lt.map(RangeValue::Date),
                })
            }
        }
    }

    fn parse_range<T: PartialOrd>(
        &self,
        value: &str,
        parse: fn(&str) -> Result<T, String>,
    ) -> SearchResult<(Option<T>, Option<T>)> {
        let invalid = |reason: String| SearchError::InvalidFilterValue {
            identifier: self.identifier().to_string(),
            value: value.to_string(),
            reason,
        };

        let (low, high) = value
            .split_once(RANGE_SEPARATOR)
            .ok_or_else(|| invalid(format!("expected 'min{}max'", RANGE_SEPARATOR)))?;

        let bound = |raw: &str| -> SearchResult<Option<T>> {
            let raw = raw.trim();
            if raw.is_empty() {
                Ok(None)
            } else {
                parse(raw).map(Some).map_err(&invalid)
            }
        };

        let (low, high) = (bound(low)?, bound(high)?);
        match (&low, &high) {
            (None, None) => Err(invalid("at least one bound is required".to_string())),
            (Some(l), Some(h)) if l > h => Err(invalid("lower bound exceeds upper bound".to_string())),
            _ => Ok((low, high)),
        }
    }

    /// Render one selected value as an applied filter
    pub fn describe_selection(&self, value: &str) -> AppliedFilter {
        debug!(identifier = self.identifier(), value, "Describing selected filter");

        AppliedFilter {
            kind: self.kind(),
            id: format!("{}_{}", self.identifier(), value),
            identifier: self.identifier().to_string(),
            label: self.label().to_string(),
            value: value.to_string(),
            display: self.display().to_string(),
        }
    }

    /// Render every honoured value of a selection
    pub fn describe(&self, values: &IndexSet<String>) -> Vec<AppliedFilter> {
        self.effective_values(values)
            .map(|value| self.describe_selection(value))
            .collect()
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|e| e.to_string())
        .and_then(|n| if n.is_finite() { Ok(n) } else { Err("not a finite number".into()) })
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC)
pub(crate) fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| "expected an RFC 3339 timestamp or YYYY-MM-DD date".to_string())
}
