//! Search domain configuration
//!
//! A [`SearchDomainConfig`] binds an index, the fields returned for each hit,
//! the relevance query, the sort options, the filters and the facets into one
//! search definition. It is validated once when built and immutable after.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::error::{SearchError, SearchResult};
use super::facet::FacetDefinition;
use super::filter::FilterStrategy;
use super::query::SortClause;

/// Free-text relevance query: a multi-match over `fields`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceSettings {
    pub fields: Vec<String>,
}

/// A named ordering of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    pub id: String,
    pub label: String,
    pub clauses: Vec<SortClause>,
    #[serde(default)]
    pub default: bool,
}

impl SortOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>, clauses: Vec<SortClause>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            clauses,
            default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// Immutable, validated search definition for one domain
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDomainConfig {
    index: String,
    returned_fields: Vec<String>,
    relevance: RelevanceSettings,
    sort_options: Vec<SortOption>,
    default_sort: usize,
    filters: Vec<FilterStrategy>,
    facets: Vec<FacetDefinition>,
}

impl SearchDomainConfig {
    pub fn builder(index: impl Into<String>) -> SearchDomainConfigBuilder {
        SearchDomainConfigBuilder::new(index)
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn returned_fields(&self) -> &[String] {
        &self.returned_fields
    }

    pub fn relevance(&self) -> &RelevanceSettings {
        &self.relevance
    }

    pub fn sort_options(&self) -> &[SortOption] {
        &self.sort_options
    }

    pub fn filters(&self) -> &[FilterStrategy] {
        &self.filters
    }

    pub fn facets(&self) -> &[FacetDefinition] {
        &self.facets
    }

    /// The sort option marked default
    pub fn default_sort(&self) -> &SortOption {
        &self.sort_options[self.default_sort]
    }

    pub fn sort_option(&self, id: &str) -> Option<&SortOption> {
        self.sort_options.iter().find(|option| option.id == id)
    }

    pub fn filter(&self, identifier: &str) -> Option<&FilterStrategy> {
        self.filters
            .iter()
            .find(|filter| filter.identifier() == identifier)
    }

    pub fn facet(&self, identifier: &str) -> Option<&FacetDefinition> {
        self.facets
            .iter()
            .find(|facet| facet.identifier == identifier)
    }
}

/// Builder for [`SearchDomainConfig`]
pub struct SearchDomainConfigBuilder {
    index: String,
    returned_fields: Vec<String>,
    relevance: RelevanceSettings,
    sort_options: Vec<SortOption>,
    filters: Vec<FilterStrategy>,
    facets: Vec<FacetDefinition>,
}

impl SearchDomainConfigBuilder {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            returned_fields: Vec::new(),
            relevance: RelevanceSettings::default(),
            sort_options: Vec::new(),
            filters: Vec::new(),
            facets: Vec::new(),
        }
    }

    pub fn returned_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returned_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn relevance_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relevance = RelevanceSettings {
            fields: fields.into_iter().map(Into::into).collect(),
        };
        self
    }

    pub fn sort_option(mut self, option: SortOption) -> Self {
        self.sort_options.push(option);
        self
    }

    pub fn filter(mut self, filter: FilterStrategy) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn facet(mut self, facet: FacetDefinition) -> Self {
        self.facets.push(facet);
        self
    }

    /// Validate and freeze the domain
    pub fn build(self) -> SearchResult<SearchDomainConfig> {
        if self.index.trim().is_empty() {
            return Err(SearchError::InvalidConfiguration(
                "index name must not be empty".to_string(),
            ));
        }

        let mut returned = IndexSet::new();
        for field in &self.returned_fields {
            if !returned.insert(field.as_str()) {
                return Err(SearchError::InvalidConfiguration(format!(
                    "returned field '{}' listed twice in domain '{}'",
                    field, self.index
                )));
            }
        }

        let mut sort_ids = IndexSet::new();
        for option in &self.sort_options {
            if !sort_ids.insert(option.id.as_str()) {
                return Err(SearchError::DuplicateSortOption {
                    index: self.index.clone(),
                    id: option.id.clone(),
                });
            }
        }

        let mut defaults = self
            .sort_options
            .iter()
            .enumerate()
            .filter(|(_, option)| option.default)
            .map(|(position, _)| position);
        let default_sort = match (defaults.next(), defaults.next()) {
            (Some(position), None) => position,
            (None, _) => return Err(SearchError::MissingDefaultSort(self.index)),
            (Some(_), Some(_)) => return Err(SearchError::MultipleDefaultSorts(self.index)),
        };

        // Filters and facets share one namespace: both are keyed by identifier.
        let mut identifiers = IndexSet::new();
        let declared = self
            .filters
            .iter()
            .map(FilterStrategy::identifier)
            .chain(self.facets.iter().map(|facet| facet.identifier.as_str()));
        for identifier in declared {
            if !identifiers.insert(identifier) {
                return Err(SearchError::DuplicateIdentifier {
                    index: self.index.clone(),
                    identifier: identifier.to_string(),
                });
            }
        }

        for facet in &self.facets {
            facet.validate()?;
            if let Some(filter) = &facet.filter {
                if !self.filters.iter().any(|f| f.identifier() == filter) {
                    return Err(SearchError::UndeclaredFilter {
                        facet: facet.identifier.clone(),
                        filter: filter.clone(),
                    });
                }
            }
        }

        // A facet without a backing filter selects on its own field
        let mut filters = self.filters;
        let mut facets = self.facets;
        for facet in facets.iter_mut().filter(|facet| facet.filter.is_none()) {
            filters.push(facet.implicit_filter());
            facet.filter = Some(facet.identifier.clone());
        }

        Ok(SearchDomainConfig {
            index: self.index,
            returned_fields: self.returned_fields,
            relevance: self.relevance,
            sort_options: self.sort_options,
            default_sort,
            filters,
            facets,
        })
    }
}
