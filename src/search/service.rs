//! Search service: compile → engine call → decompile, for one domain at a time

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::compiler::compile;
use super::domain::SearchDomainConfig;
use super::engine::SearchEngine;
use super::error::{SearchError, SearchResult};
use super::request::SearchRequest;
use super::results::{decompile, SearchResults};
use crate::metrics::{ENGINE_REQUEST_DURATION_SECONDS, SEARCH_REQUESTS_TOTAL};

/// Default budget for one engine call
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared, read-only execution context of every resolver
///
/// Holds the engine handle and the per-request timeout budget. Domain
/// configurations are passed per call; the service keeps no mutable state.
#[derive(Clone)]
pub struct SearchService {
    engine: Arc<dyn SearchEngine>,
    timeout: Duration,
}

impl SearchService {
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            engine,
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `request` against `domain`.
    ///
    /// The engine call is bounded by the service timeout; on timeout or
    /// failure no partial result is produced. Dropping the returned future
    /// abandons the in-flight engine call.
    pub async fn search(
        &self,
        domain_name: &str,
        domain: &SearchDomainConfig,
        request: &SearchRequest,
    ) -> SearchResult<SearchResults> {
        let outcome = self.run(domain_name, domain, request).await;

        let label = match &outcome {
            Ok(_) => "success",
            Err(e) => e.code(),
        };
        SEARCH_REQUESTS_TOTAL
            .with_label_values(&[domain_name, label])
            .inc();

        if let Err(e) = &outcome {
            warn!(domain = domain_name, error = %e, code = e.code(), "Search failed");
        }
        outcome
    }

    async fn run(
        &self,
        domain_name: &str,
        domain: &SearchDomainConfig,
        request: &SearchRequest,
    ) -> SearchResult<SearchResults> {
        let compiled = compile(domain, request)?;

        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.engine.search(&compiled))
            .await
            .map_err(|_| SearchError::EngineTimeout(self.timeout.as_millis() as u64))??;
        let elapsed = start.elapsed();
        ENGINE_REQUEST_DURATION_SECONDS
            .with_label_values(&[domain_name])
            .observe(elapsed.as_secs_f64());

        info!(
            domain = domain_name,
            engine = self.engine.name(),
            index = %compiled.index,
            total = response.total,
            duration_ms = elapsed.as_millis(),
            "Search executed"
        );

        decompile(domain, request, &compiled, response)
    }
}
