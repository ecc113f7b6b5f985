//! Engine-neutral boolean query tree, sort clauses and aggregation requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sort order for a sort clause
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One field of a sort option, e.g. `_score desc`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortClause {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortClause {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Relevance ordering (`_score` descending)
    pub fn score() -> Self {
        Self::new("_score", SortOrder::Desc)
    }
}

/// A bound of a range clause
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeValue {
    Number(f64),
    Date(DateTime<Utc>),
}

/// Compound clause of a boolean query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    /// Scored, required clauses
    pub must: Vec<QueryFragment>,
    /// Required, non-scoring clauses
    pub filter: Vec<QueryFragment>,
    /// Alternatives
    pub should: Vec<QueryFragment>,
    pub minimum_should_match: Option<u32>,
}

/// A node of the boolean query handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFragment {
    /// Matches every document with a neutral score
    MatchAll,

    /// Free-text match over several fields
    MultiMatch { query: String, fields: Vec<String> },

    /// Exact match on a keyword field
    Term { field: String, value: String },

    /// Half-open range `[gte, lt)`; a missing bound is unbounded
    Range {
        field: String,
        gte: Option<RangeValue>,
        lt: Option<RangeValue>,
    },

    Bool(BoolQuery),
}

impl QueryFragment {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        QueryFragment::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Combine clauses as alternatives: at least one must match.
    ///
    /// Returns `None` for an empty input and the clause itself for a single one.
    pub fn any_of(clauses: Vec<QueryFragment>) -> Option<QueryFragment> {
        match clauses.len() {
            0 => None,
            1 => clauses.into_iter().next(),
            _ => Some(QueryFragment::Bool(BoolQuery {
                should: clauses,
                minimum_should_match: Some(1),
                ..Default::default()
            })),
        }
    }

    /// Combine clauses as non-scoring requirements
    pub fn all_of(clauses: Vec<QueryFragment>) -> QueryFragment {
        QueryFragment::Bool(BoolQuery {
            filter: clauses,
            ..Default::default()
        })
    }
}

/// Bucket definition for a date-range aggregation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRangeBucket {
    pub label: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Shape of a facet aggregation
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationKind {
    Terms {
        field: String,
        size: usize,
    },
    Histogram {
        field: String,
        interval: f64,
        min: f64,
        max: f64,
    },
    DateRange {
        field: String,
        ranges: Vec<DateRangeBucket>,
    },
}

/// One aggregation requested from the engine, named after its facet
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pub name: String,
    pub kind: AggregationKind,
    /// Extra restrictions the aggregation is computed under (post-filters of
    /// other filters that exclude their own selection)
    pub filters: Vec<QueryFragment>,
}

/// Render a number the way it would be typed by a user: `10` rather than `10.0`
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_of_collapses_single_clause() {
        let single = QueryFragment::any_of(vec![QueryFragment::term("tag", "urgent")]);
        assert_eq!(single, Some(QueryFragment::term("tag", "urgent")));
        assert_eq!(QueryFragment::any_of(vec![]), None);
    }

    #[test]
    fn test_any_of_requires_one_alternative() {
        let fragment = QueryFragment::any_of(vec![
            QueryFragment::term("tag", "a"),
            QueryFragment::term("tag", "b"),
        ])
        .unwrap();

        match fragment {
            QueryFragment::Bool(bool_query) => {
                assert_eq!(bool_query.should.len(), 2);
                assert_eq!(bool_query.minimum_should_match, Some(1));
                assert!(bool_query.filter.is_empty());
            }
            other => panic!("expected bool query, got {:?}", other),
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(-5.0), "-5");
        assert_eq!(format_number(2.5), "2.5");
    }
}
