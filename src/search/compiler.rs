//! Query compiler: (domain, request) → engine query

use tracing::debug;
use validator::Validate;

use super::domain::SearchDomainConfig;
use super::error::{SearchError, SearchResult};
use super::query::{AggregationRequest, BoolQuery, QueryFragment, SortClause};
use super::request::SearchRequest;

/// Engine-facing query for one request
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub index: String,
    /// Scored clause: multi-match on the free-text term or match-all
    pub relevance: QueryFragment,
    /// AND-combined fragments restricting both hits and aggregations
    pub filters: Vec<QueryFragment>,
    /// AND-combined fragments restricting hits only
    pub post_filters: Vec<QueryFragment>,
    /// One aggregation per facet, in declared order
    pub aggregations: Vec<AggregationRequest>,
    /// Id of the resolved sort option
    pub sort_id: String,
    pub sort: Vec<SortClause>,
    pub from: usize,
    pub size: usize,
    /// Document fields to return
    pub source: Vec<String>,
}

impl CompiledQuery {
    /// Main boolean query: relevance under `must`, filters under `filter`
    pub fn query(&self) -> QueryFragment {
        QueryFragment::Bool(BoolQuery {
            must: vec![self.relevance.clone()],
            filter: self.filters.clone(),
            ..Default::default()
        })
    }

    /// Post-filter query, absent when no filter excludes its own selection
    pub fn post_filter(&self) -> Option<QueryFragment> {
        if self.post_filters.is_empty() {
            None
        } else {
            Some(QueryFragment::all_of(self.post_filters.clone()))
        }
    }
}

/// Build the engine query for `request` against `domain`.
///
/// Filters with no selection contribute nothing. Fragments of filters that
/// exclude their own selection from facet counts go to the post-filter, and
/// every facet aggregation is restricted by the post-filter fragments of all
/// other such filters.
pub fn compile(domain: &SearchDomainConfig, request: &SearchRequest) -> SearchResult<CompiledQuery> {
    request
        .page
        .validate()
        .map_err(|e| SearchError::InvalidPage(e.to_string()))?;

    if let Some(unknown) = request
        .filters
        .keys()
        .find(|identifier| domain.filter(identifier).is_none())
    {
        return Err(SearchError::UnknownFilter(unknown.clone()));
    }

    let relevance = match request.term() {
        Some(term) if !domain.relevance().fields.is_empty() => QueryFragment::MultiMatch {
            query: term.to_string(),
            fields: domain.relevance().fields.clone(),
        },
        _ => QueryFragment::MatchAll,
    };

    let mut filters = Vec::new();
    let mut excluded: Vec<(&str, QueryFragment)> = Vec::new();
    for filter in domain.filters() {
        let Some(selection) = request.selection(filter.identifier()) else {
            continue;
        };
        let Some(fragment) = filter.compile_fragment(selection)? else {
            continue;
        };

        if filter.exclude_own_filters() {
            excluded.push((filter.identifier(), fragment));
        } else {
            filters.push(fragment);
        }
    }

    let aggregations = domain
        .facets()
        .iter()
        .map(|facet| {
            let others = excluded
                .iter()
                .filter(|(identifier, _)| facet.filter.as_deref() != Some(*identifier))
                .map(|(_, fragment)| fragment.clone())
                .collect();
            facet.aggregation(others)
        })
        .collect();

    let sort = match request.sort_by.as_deref() {
        Some(id) => domain
            .sort_option(id)
            .ok_or_else(|| SearchError::UnknownSort(id.to_string()))?,
        None => domain.default_sort(),
    };

    debug!(
        index = domain.index(),
        filters = filters.len(),
        post_filters = excluded.len(),
        sort = %sort.id,
        "Compiled search query"
    );

    Ok(CompiledQuery {
        index: domain.index().to_string(),
        relevance,
        filters,
        post_filters: excluded.into_iter().map(|(_, fragment)| fragment).collect(),
        aggregations,
        sort_id: sort.id.clone(),
        sort: sort.clauses.clone(),
        from: request.page.from,
        size: request.page.size,
        source: domain.returned_fields().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::domain::SortOption;
    use crate::search::facet::FacetDefinition;
    use crate::search::filter::{FilterStrategy, TermFilter, ValueTagFilter};
    use crate::search::query::{AggregationKind, SortOrder};

    fn domain() -> SearchDomainConfig {
        SearchDomainConfig::builder("freelancers")
            .returned_fields(["firstname", "lastname"])
            .relevance_fields(["firstname", "professional_title"])
            .sort_option(SortOption::new("relevance", "Relevance", vec![SortClause::score()]).as_default())
            .sort_option(SortOption::new(
                "released",
                "Released",
                vec![SortClause::new("released", SortOrder::Desc)],
            ))
            .filter(FilterStrategy::ValueTag(ValueTagFilter::default()))
            .filter(FilterStrategy::Term(
                TermFilter::new("specialty", "specialty", "Specialty").multiple_select(true),
            ))
            .filter(FilterStrategy::Term(TermFilter::new(
                "specialty_exact",
                "specialty",
                "Specialty (exact)",
            )))
            .facet(FacetDefinition::refinement("country", "country.keyword", "Location"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_no_selection_no_restriction() {
        let compiled = compile(&domain(), &SearchRequest::new()).unwrap();

        assert!(compiled.filters.is_empty());
        assert!(compiled.post_filters.is_empty());
        assert_eq!(compiled.relevance, QueryFragment::MatchAll);
        assert_eq!(compiled.sort_id, "relevance");
        assert_eq!(compiled.sort, vec![SortClause::score()]);
        assert_eq!(compiled.source, vec!["firstname", "lastname"]);
    }

    #[test]
    fn test_free_text_uses_relevance_fields() {
        let compiled = compile(&domain(), &SearchRequest::new().with_query(" react ")).unwrap();

        assert_eq!(
            compiled.relevance,
            QueryFragment::MultiMatch {
                query: "react".into(),
                fields: vec!["firstname".into(), "professional_title".into()],
            }
        );
    }

    #[test]
    fn test_value_tag_selection() {
        let request = SearchRequest::new().with_filter("CustomFilter", "urgent");
        let compiled = compile(&domain(), &request).unwrap();

        assert_eq!(compiled.filters, vec![QueryFragment::term("tag", "urgent")]);
    }

    #[test]
    fn test_filters_on_same_field_are_anded() {
        let request = SearchRequest::new()
            .with_filter("specialty", "design")
            .with_filter("specialty_exact", "backend");
        let compiled = compile(&domain(), &request).unwrap();

        assert_eq!(
            compiled.filters,
            vec![
                QueryFragment::term("specialty", "design"),
                QueryFragment::term("specialty", "backend"),
            ]
        );
    }

    #[test]
    fn test_facets_always_aggregated() {
        let compiled = compile(&domain(), &SearchRequest::new()).unwrap();

        assert_eq!(compiled.aggregations.len(), 1);
        assert_eq!(
            compiled.aggregations[0].kind,
            AggregationKind::Terms {
                field: "country.keyword".into(),
                size: 10
            }
        );
        assert!(compiled.aggregations[0].filters.is_empty());
    }

    #[test]
    fn test_sort_resolution() {
        let compiled = compile(&domain(), &SearchRequest::new().with_sort("released")).unwrap();
        assert_eq!(compiled.sort_id, "released");

        let err = compile(&domain(), &SearchRequest::new().with_sort("oldest")).unwrap_err();
        assert!(matches!(err, SearchError::UnknownSort(ref id) if id == "oldest"));
    }

    #[test]
    fn test_unknown_filter_is_rejected() {
        let err = compile(&domain(), &SearchRequest::new().with_filter("salary", "high")).unwrap_err();
        assert!(matches!(err, SearchError::UnknownFilter(_)));
    }

    #[test]
    fn test_invalid_page_is_rejected() {
        let err = compile(&domain(), &SearchRequest::new().with_page(0, 0)).unwrap_err();
        assert!(matches!(err, SearchError::InvalidPage(_)));
    }

    #[test]
    fn test_pagination_attached() {
        let compiled = compile(&domain(), &SearchRequest::new().with_page(30, 15)).unwrap();
        assert_eq!((compiled.from, compiled.size), (30, 15));
    }

    #[test]
    fn test_exclude_own_filters() {
        let domain = SearchDomainConfig::builder("freelancers")
            .sort_option(SortOption::new("relevance", "Relevance", vec![SortClause::score()]).as_default())
            .filter(FilterStrategy::Term(
                TermFilter::new("country", "country.keyword", "Country")
                    .multiple_select(true)
                    .exclude_own_filters(true),
            ))
            .filter(FilterStrategy::Term(
                TermFilter::new("skill", "skills.keyword", "Skill").exclude_own_filters(true),
            ))
            .facet(
                FacetDefinition::refinement("country_facet", "country.keyword", "Location")
                    .with_filter("country"),
            )
            .facet(FacetDefinition::refinement("skill_facet", "skills.keyword", "Skills").with_filter("skill"))
            .facet(FacetDefinition::refinement("language", "language.keyword", "Language"))
            .build()
            .unwrap();

        let request = SearchRequest::new()
            .with_filter("country", "Spain")
            .with_filter("skill", "rust");
        let compiled = compile(&domain, &request).unwrap();

        let country = QueryFragment::term("country.keyword", "Spain");
        let skill = QueryFragment::term("skills.keyword", "rust");

        assert!(compiled.filters.is_empty());
        assert_eq!(compiled.post_filters, vec![country.clone(), skill.clone()]);
        assert_eq!(compiled.aggregations[0].filters, vec![skill.clone()]);
        assert_eq!(compiled.aggregations[1].filters, vec![country.clone()]);
        assert_eq!(compiled.aggregations[2].filters, vec![country, skill]);
    }
}
