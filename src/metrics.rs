//! Prometheus metrics for the search gateway
//!
//! # Example
//! ```no_run
//! use facet_gateway::metrics::SEARCH_REQUESTS_TOTAL;
//!
//! SEARCH_REQUESTS_TOTAL
//!     .with_label_values(&["ResultSet", "success"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Searches handled, by domain and outcome
    ///
    /// Labels: domain, outcome (`success` or an error code)
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace("facet_gateway"),
        &["domain", "outcome"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// Engine round-trip duration in seconds
    ///
    /// Labels: domain
    pub static ref ENGINE_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "engine_request_duration_seconds",
            "Search engine request duration in seconds"
        )
        .namespace("facet_gateway")
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["domain"]
    ).expect("Failed to create ENGINE_REQUEST_DURATION_SECONDS metric");

    /// GraphQL root field resolutions, plus requests rejected before execution
    ///
    /// Labels: field (a schema root field, or `none`), outcome (`success`,
    /// `error`, `parse_error`, `invalid`)
    pub static ref GRAPHQL_OPERATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("graphql_operations_total", "Total number of GraphQL operations")
            .namespace("facet_gateway"),
        &["field", "outcome"]
    ).expect("Failed to create GRAPHQL_OPERATIONS_TOTAL metric");
}

/// Register all metrics with [`PROMETHEUS_REGISTRY`]; safe to call twice
pub fn init_metrics() -> Result<(), prometheus::Error> {
    for collector in [
        Box::new(SEARCH_REQUESTS_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(ENGINE_REQUEST_DURATION_SECONDS.clone()),
        Box::new(GRAPHQL_OPERATIONS_TOTAL.clone()),
    ] {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Export registered metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&PROMETHEUS_REGISTRY.gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_gather_contains_search_counter() {
        init_metrics().unwrap();
        SEARCH_REQUESTS_TOTAL
            .with_label_values(&["MetricsTest", "success"])
            .inc();

        let output = gather_metrics();
        assert!(output.contains("facet_gateway_search_requests_total"));
    }
}
