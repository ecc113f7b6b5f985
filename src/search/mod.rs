//! Faceted search core
//!
//! This module turns declarative search domains into engine queries and
//! engine answers back into UI-consumable results:
//!
//! - **Filter strategies**: value-tag, term, numeric and date range filters
//! - **Facets**: refinement, histogram and date-range option lists
//! - **Query compiler**: relevance clause, AND-ed filter fragments, facet
//!   aggregations, sort and pagination
//! - **Result decompiler**: typed hits, facet options with selection state,
//!   applied filter descriptors
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   compile    ┌───────────────┐   search   ┌──────────────┐
//! │ SearchRequest│ ───────────▶ │ CompiledQuery │ ─────────▶ │ SearchEngine │
//! └──────────────┘              └───────────────┘            └──────────────┘
//!        ▲                                                          │
//!        │ SearchDomainConfig (immutable, shared)                   │
//!        │                                                          ▼
//! ┌──────────────┐  decompile   ┌────────────────┐
//! │SearchResults │ ◀─────────── │ EngineResponse │
//! └──────────────┘              └────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use facet_gateway::search::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let domain = SearchDomainConfig::builder("freelancers")
//!         .returned_fields(["firstname", "lastname"])
//!         .relevance_fields(["firstname", "professional_title"])
//!         .sort_option(SortOption::new("relevance", "Relevance", vec![SortClause::score()]).as_default())
//!         .filter(FilterStrategy::ValueTag(ValueTagFilter::default()))
//!         .build()?;
//!
//!     let engine = ElasticsearchEngine::new("http://127.0.0.1:9200", Duration::from_secs(5))?;
//!     let service = SearchService::new(Arc::new(engine));
//!
//!     let request = SearchRequest::new().with_filter("CustomFilter", "urgent");
//!     let results = service.search("ResultSet", &domain, &request).await?;
//!     println!("Found {} freelancers", results.summary.total);
//!
//!     Ok(())
//! }
//! ```

mod compiler;
mod domain;
mod elasticsearch;
mod engine;
mod error;
mod facet;
mod filter;
mod query;
mod request;
mod results;
mod service;

pub use compiler::{compile, CompiledQuery};
pub use domain::{RelevanceSettings, SearchDomainConfig, SearchDomainConfigBuilder, SortOption};
pub use elasticsearch::{parse_response, render_body, render_fragment, ElasticsearchEngine};
pub use engine::{EngineBucket, EngineHit, EngineResponse, SearchEngine};
pub use error::{ErrorKind, SearchError, SearchResult};
pub use facet::{FacetDefinition, FacetKind, FacetOption, DEFAULT_FACET_SIZE};
pub use filter::{
    AppliedFilter, AppliedFilterKind, FilterStrategy, RangeFilter, TermFilter, ValueTagFilter,
    CUSTOM_FILTER_ID, DEFAULT_TAG_FIELD,
};
pub use query::{
    AggregationKind, AggregationRequest, BoolQuery, DateRangeBucket, QueryFragment, RangeValue,
    SortClause, SortOrder,
};
pub use request::{PageRequest, SearchRequest, DEFAULT_PAGE_SIZE};
pub use results::{
    decompile, FacetResult, PageInfo, SearchHit, SearchResults, SearchSummary, SortOptionSummary,
};
pub use service::{SearchService, DEFAULT_ENGINE_TIMEOUT};
