//! Abstract search-engine protocol
//!
//! The core only depends on this request/response shape. Wire formats live
//! in the adapters (see [`super::elasticsearch`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::compiler::CompiledQuery;
use super::error::SearchResult;

/// One document returned by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHit {
    pub id: String,
    pub score: Option<f64>,
    /// Raw stored document
    pub source: serde_json::Value,
}

/// One aggregation bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineBucket {
    pub key: String,
    pub count: u64,
}

/// Engine answer to a [`CompiledQuery`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    /// Total number of matching documents
    pub total: u64,
    /// Hits in engine (already sorted) order
    pub hits: Vec<EngineHit>,
    /// Buckets keyed by aggregation name
    pub aggregations: HashMap<String, Vec<EngineBucket>>,
}

/// A search engine reachable through a query-and-aggregation protocol
///
/// Implementations must be safe to share between concurrently handled
/// requests.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Run one compiled query
    async fn search(&self, query: &CompiledQuery) -> SearchResult<EngineResponse>;

    /// Name used in logs
    fn name(&self) -> &str {
        "engine"
    }
}
