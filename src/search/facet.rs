//! Facet definitions: how an engine aggregation becomes a selectable option list

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::engine::EngineBucket;
use super::error::{SearchError, SearchResult};
use super::filter::{parse_date, FilterStrategy, RangeFilter, TermFilter, RANGE_SEPARATOR};
use super::query::{format_number, AggregationKind, AggregationRequest, DateRangeBucket, QueryFragment};

/// Default number of buckets requested for a refinement facet
pub const DEFAULT_FACET_SIZE: usize = 10;

/// Aggregation shape of a facet
#[derive(Debug, Clone, PartialEq)]
pub enum FacetKind {
    /// Keyword field bucketed into value counts
    RefinementSelect { size: usize },

    /// Numeric histogram; option values are `low..high`
    Range { interval: f64, min: f64, max: f64 },

    /// Named date ranges; option values are `from..to`
    DateRange { ranges: Vec<DateRangeBucket> },
}

/// One facet of a domain
#[derive(Debug, Clone, PartialEq)]
pub struct FacetDefinition {
    pub identifier: String,
    pub field: String,
    pub label: String,
    pub multiple_select: bool,
    /// Identifier of the filter whose selection marks options as selected.
    /// When unset the facet filters on its own field under its own identifier.
    pub filter: Option<String>,
    pub kind: FacetKind,
}

/// One selectable option of a facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetOption {
    pub value: String,
    pub label: String,
    pub count: u64,
    pub selected: bool,
}

impl FacetDefinition {
    pub fn refinement(
        identifier: impl Into<String>,
        field: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            field: field.into(),
            label: label.into(),
            multiple_select: false,
            filter: None,
            kind: FacetKind::RefinementSelect {
                size: DEFAULT_FACET_SIZE,
            },
        }
    }

    pub fn range(
        identifier: impl Into<String>,
        field: impl Into<String>,
        label: impl Into<String>,
        interval: f64,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            field: field.into(),
            label: label.into(),
            multiple_select: false,
            filter: None,
            kind: FacetKind::Range { interval, min, max },
        }
    }

    pub fn date_range(
        identifier: impl Into<String>,
        field: impl Into<String>,
        label: impl Into<String>,
        ranges: Vec<DateRangeBucket>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            field: field.into(),
            label: label.into(),
            multiple_select: false,
            filter: None,
            kind: FacetKind::DateRange { ranges },
        }
    }

    /// Back the facet with a filter so its options report selection state
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_multiple_select(mut self, enabled: bool) -> Self {
        self.multiple_select = enabled;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        if let FacetKind::RefinementSelect { size: ref mut current } = self.kind {
            *current = size;
        }
        self
    }

    /// UI widget name for this facet
    pub fn display(&self) -> &'static str {
        match self.kind {
            FacetKind::RefinementSelect { .. } => "RefinementSelectFacet",
            FacetKind::Range { .. } => "RangeFacet",
            FacetKind::DateRange { .. } => "DateRangeFacet",
        }
    }

    /// Startup-time sanity checks of the aggregation parameters
    pub fn validate(&self) -> SearchResult<()> {
        let invalid = |reason: &str| {
            Err(SearchError::InvalidConfiguration(format!(
                "facet '{}': {}",
                self.identifier, reason
            )))
        };

        if self.field.is_empty() {
            return invalid("field must not be empty");
        }

        match &self.kind {
            FacetKind::RefinementSelect { size } if *size == 0 => invalid("size must be positive"),
            FacetKind::Range { interval, min, max } => {
                if !(*interval > 0.0) {
                    invalid("interval must be positive")
                } else if min >= max {
                    invalid("min must be lower than max")
                } else {
                    Ok(())
                }
            }
            FacetKind::DateRange { ranges } => {
                let mut labels = IndexSet::new();
                if ranges.is_empty() {
                    return invalid("at least one range is required");
                }
                for range in ranges {
                    if !labels.insert(range.label.as_str()) {
                        return invalid("range labels must be unique");
                    }
                    // Option values feed back into a date range filter
                    for bound in [&range.from, &range.to].into_iter().flatten() {
                        if let Err(reason) = parse_date(bound) {
                            return invalid(&format!(
                                "range '{}' bound '{}': {}",
                                range.label, bound, reason
                            ));
                        }
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Filter selecting this facet's own options, used when no backing
    /// filter is declared
    pub fn implicit_filter(&self) -> FilterStrategy {
        match self.kind {
            FacetKind::RefinementSelect { .. } => FilterStrategy::Term(
                TermFilter::new(&self.identifier, &self.field, &self.label)
                    .multiple_select(self.multiple_select),
            ),
            FacetKind::Range { .. } => FilterStrategy::NumericRange(RangeFilter::new(
                &self.identifier,
                &self.field,
                &self.label,
            )),
            FacetKind::DateRange { .. } => FilterStrategy::DateRange(RangeFilter::new(
                &self.identifier,
                &self.field,
                &self.label,
            )),
        }
    }

    /// Aggregation request computed under `filters`
    pub fn aggregation(&self, filters: Vec<QueryFragment>) -> AggregationRequest {
        let kind = match &self.kind {
            FacetKind::RefinementSelect { size } => AggregationKind::Terms {
                field: self.field.clone(),
                size: *size,
            },
            FacetKind::Range { interval, min, max } => AggregationKind::Histogram {
                field: self.field.clone(),
                interval: *interval,
                min: *min,
                max: *max,
            },
            FacetKind::DateRange { ranges } => AggregationKind::DateRange {
                field: self.field.clone(),
                ranges: ranges.clone(),
            },
        };

        AggregationRequest {
            name: self.identifier.clone(),
            kind,
            filters,
        }
    }

    /// Turn engine buckets into options, in bucket order
    pub fn options(
        &self,
        buckets: &[EngineBucket],
        selection: Option<&IndexSet<String>>,
    ) -> SearchResult<Vec<FacetOption>> {
        let is_selected = |value: &str| selection.map_or(false, |values| values.contains(value));

        buckets
            .iter()
            .map(|bucket| {
                let (value, label) = self.option_value(bucket)?;
                Ok(FacetOption {
                    selected: is_selected(&value),
                    value,
                    label,
                    count: bucket.count,
                })
            })
            .collect()
    }

    fn option_value(&self, bucket: &EngineBucket) -> SearchResult<(String, String)> {
        match &self.kind {
            FacetKind::RefinementSelect { .. } => Ok((bucket.key.clone(), bucket.key.clone())),
            FacetKind::Range { interval, .. } => {
                let low: f64 = bucket.key.parse().map_err(|_| {
                    SearchError::MalformedResponse(format!(
                        "facet '{}': histogram key '{}' is not numeric",
                        self.identifier, bucket.key
                    ))
                })?;
                let value = format!(
                    "{}{}{}",
                    format_number(low),
                    RANGE_SEPARATOR,
                    format_number(low + interval)
                );
                Ok((value.clone(), value))
            }
            FacetKind::DateRange { ranges } => {
                let range = ranges
                    .iter()
                    .find(|range| range.label == bucket.key)
                    .ok_or_else(|| {
                        SearchError::MalformedResponse(format!(
                            "facet '{}': unknown date range '{}'",
                            self.identifier, bucket.key
                        ))
                    })?;
                let value = format!(
                    "{}{}{}",
                    range.from.as_deref().unwrap_or_default(),
                    RANGE_SEPARATOR,
                    range.to.as_deref().unwrap_or_default()
                );
                Ok((value, range.label.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(key: &str, count: u64) -> EngineBucket {
        EngineBucket {
            key: key.to_string(),
            count,
        }
    }

    #[test]
    fn test_refinement_aggregation() {
        let facet = FacetDefinition::refinement("country", "country.keyword", "Location");
        let aggregation = facet.aggregation(vec![]);

        assert_eq!(aggregation.name, "country");
        assert_eq!(
            aggregation.kind,
            AggregationKind::Terms {
                field: "country.keyword".into(),
                size: DEFAULT_FACET_SIZE
            }
        );
        assert_eq!(facet.display(), "RefinementSelectFacet");
    }

    #[test]
    fn test_options_without_selection_are_not_selected() {
        let facet = FacetDefinition::refinement("country", "country.keyword", "Location");
        let options = facet
            .options(&[bucket("Spain", 4), bucket("Peru", 2)], None)
            .unwrap();

        assert_eq!(options.len(), 2);
        assert!(options.iter().all(|option| !option.selected));
        assert_eq!(options[0].value, "Spain");
        assert_eq!(options[0].count, 4);
    }

    #[test]
    fn test_options_follow_selection() {
        let facet = FacetDefinition::refinement("specialty_facet", "specialty", "Specialty")
            .with_filter("specialty");
        let selection: IndexSet<String> = ["Peru".to_string()].into_iter().collect();
        let options = facet
            .options(&[bucket("Spain", 4), bucket("Peru", 2)], Some(&selection))
            .unwrap();

        assert!(!options[0].selected);
        assert!(options[1].selected);
    }

    #[test]
    fn test_histogram_options_are_ranges() {
        let facet = FacetDefinition::range("reviews", "reviews.total_reviews", "Reviews", 10.0, 0.0, 50.0);
        let options = facet.options(&[bucket("0", 3), bucket("10", 1)], None).unwrap();

        assert_eq!(options[0].value, "0..10");
        assert_eq!(options[1].value, "10..20");
        assert!(facet.options(&[bucket("many", 1)], None).is_err());
    }

    #[test]
    fn test_date_range_options() {
        let facet = FacetDefinition::date_range(
            "joined",
            "joined_at",
            "Joined",
            vec![DateRangeBucket {
                label: "Since 2024".into(),
                from: Some("2024-01-01".into()),
                to: None,
            }],
        );

        let options = facet.options(&[bucket("Since 2024", 7)], None).unwrap();
        assert_eq!(options[0].value, "2024-01-01..");
        assert_eq!(options[0].label, "Since 2024");
        assert!(facet.options(&[bucket("Before time", 1)], None).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(FacetDefinition::refinement("a", "a", "A").validate().is_ok());
        assert!(FacetDefinition::range("r", "r", "R", 0.0, 0.0, 10.0).validate().is_err());
        assert!(FacetDefinition::range("r", "r", "R", 5.0, 10.0, 10.0).validate().is_err());
        assert!(FacetDefinition::date_range("d", "d", "D", vec![]).validate().is_err());
    }

    #[test]
    fn test_date_range_bounds_must_be_dates() {
        let bucket = |from: &str| DateRangeBucket {
            label: "Recent".into(),
            from: Some(from.into()),
            to: None,
        };

        let math = FacetDefinition::date_range("d", "d", "D", vec![bucket("now/y")]);
        assert!(matches!(math.validate(), Err(SearchError::InvalidConfiguration(_))));

        let plain = FacetDefinition::date_range("d", "d", "D", vec![bucket("2024-01-01")]);
        assert!(plain.validate().is_ok());
    }

    #[test]
    fn test_implicit_filter_follows_facet_kind() {
        let single = FacetDefinition::refinement("country", "country.keyword", "Location");
        assert_eq!(
            single.implicit_filter(),
            FilterStrategy::Term(TermFilter::new("country", "country.keyword", "Location"))
        );

        let multi = single.with_multiple_select(true);
        assert!(matches!(
            multi.implicit_filter(),
            FilterStrategy::Term(TermFilter { multiple_select: true, .. })
        ));

        let histogram = FacetDefinition::range("rate", "hourly_rate", "Rate", 50.0, 0.0, 200.0);
        assert!(matches!(histogram.implicit_filter(), FilterStrategy::NumericRange(_)));
        assert_eq!(histogram.implicit_filter().identifier(), "rate");
    }
}
