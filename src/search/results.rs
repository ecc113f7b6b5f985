//! Result decompiler: engine response → typed hits, facet options and
//! applied filters

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::compiler::CompiledQuery;
use super::domain::SearchDomainConfig;
use super::engine::EngineResponse;
use super::error::{SearchError, SearchResult};
use super::facet::FacetOption;
use super::filter::AppliedFilter;
use super::request::SearchRequest;

/// A hit restricted to the domain's returned fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: Option<f64>,
    /// Returned fields in declared order; missing fields are `null`
    pub fields: Map<String, Value>,
}

/// Option list of one facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetResult {
    pub identifier: String,
    pub label: String,
    pub display: String,
    pub multiple_select: bool,
    pub options: Vec<FacetOption>,
}

/// Sort option as offered to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptionSummary {
    pub id: String,
    pub label: String,
}

/// Pagination information for responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub from: usize,
    pub size: usize,
    pub total: u64,
    pub total_pages: u64,
    pub page_number: u64,
}

impl PageInfo {
    pub fn new(from: usize, size: usize, total: u64) -> Self {
        let size_u64 = size.max(1) as u64;
        Self {
            from,
            size,
            total,
            total_pages: total.div_ceil(size_u64),
            page_number: from as u64 / size_u64,
        }
    }
}

/// Summary of a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub total: u64,
    pub query: String,
    pub sort_options: Vec<SortOptionSummary>,
}

/// Typed, UI-consumable search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub summary: SearchSummary,
    pub hits: Vec<SearchHit>,
    pub page: PageInfo,
    pub facets: Vec<FacetResult>,
    pub applied_filters: Vec<AppliedFilter>,
    pub sorted_by: String,
}

/// Render an engine response for `request`.
///
/// Hits keep engine order. A facet whose aggregation is missing from the
/// response is an engine error; results are never partially rendered.
pub fn decompile(
    domain: &SearchDomainConfig,
    request: &SearchRequest,
    compiled: &CompiledQuery,
    response: EngineResponse,
) -> SearchResult<SearchResults> {
    let hits = response
        .hits
        .into_iter()
        .map(|hit| SearchHit {
            fields: project_fields(&hit.source, domain.returned_fields()),
            id: hit.id,
            score: hit.score,
        })
        .collect();

    let facets = domain
        .facets()
        .iter()
        .map(|facet| {
            let buckets = response.aggregations.get(&facet.identifier).ok_or_else(|| {
                SearchError::MalformedResponse(format!(
                    "missing aggregation for facet '{}'",
                    facet.identifier
                ))
            })?;
            // Options are selected only for the values the query honoured
            let selection = facet.filter.as_deref().and_then(|identifier| {
                let filter = domain.filter(identifier)?;
                let values = request.selection(identifier)?;
                Some(filter.effective_values(values).cloned().collect::<IndexSet<_>>())
            });

            Ok(FacetResult {
                identifier: facet.identifier.clone(),
                label: facet.label.clone(),
                display: facet.display().to_string(),
                multiple_select: facet.multiple_select,
                options: facet.options(buckets, selection.as_ref())?,
            })
        })
        .collect::<SearchResult<Vec<_>>>()?;

    // Request order; compile has already rejected unknown identifiers
    let applied_filters = request
        .filters
        .iter()
        .filter_map(|(identifier, selection)| {
            domain
                .filter(identifier)
                .map(|filter| filter.describe(selection))
        })
        .flatten()
        .collect();

    Ok(SearchResults {
        summary: SearchSummary {
            total: response.total,
            query: request.term().unwrap_or_default().to_string(),
            sort_options: domain
                .sort_options()
                .iter()
                .map(|option| SortOptionSummary {
                    id: option.id.clone(),
                    label: option.label.clone(),
                })
                .collect(),
        },
        hits,
        page: PageInfo::new(compiled.from, compiled.size, response.total),
        facets,
        applied_filters,
        sorted_by: compiled.sort_id.clone(),
    })
}

fn project_fields(source: &Value, fields: &[String]) -> Map<String, Value> {
    fields
        .iter()
        .map(|field| (field.clone(), lookup_path(source, field).unwrap_or(Value::Null)))
        .collect()
}

/// Resolve a dotted path such as `primary_skills.name`.
///
/// A literal key wins over descending; arrays are mapped element-wise.
fn lookup_path(source: &Value, path: &str) -> Option<Value> {
    if let Some(value) = source.get(path) {
        return Some(value.clone());
    }

    let (head, rest) = path.split_once('.')?;
    match source.get(head)? {
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(|item| lookup_path(item, rest)).collect(),
        )),
        nested => lookup_path(nested, rest),
    }
}
