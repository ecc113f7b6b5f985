//! Tests for the Prometheus metrics recorded by searches
//!
//! Each test uses its own domain label so counters do not interfere.

mod common;

use common::{
    extract_labels, metric_exists, reference_domain, reference_registrations, sample_value,
    RecordingEngine,
};
use facet_gateway::graphql::{execute, GraphQLRequest, SchemaComposer};
use facet_gateway::metrics::{gather_metrics, init_metrics};
use facet_gateway::search::{SearchRequest, SearchService};
use std::sync::Arc;

#[tokio::test]
async fn test_successful_search_is_counted() {
    init_metrics().unwrap();
    let service = SearchService::new(Arc::new(RecordingEngine::new()));
    let domain = reference_domain("ResultSet");

    for _ in 0..3 {
        service
            .search("MetricsSuccess", &domain, &SearchRequest::new())
            .await
            .unwrap();
    }

    let output = gather_metrics();
    assert_eq!(
        sample_value(
            &output,
            "facet_gateway_search_requests_total",
            &[("domain", "MetricsSuccess"), ("outcome", "success")]
        ),
        Some(3.0)
    );
    assert!(metric_exists(
        &output,
        "facet_gateway_engine_request_duration_seconds_bucket"
    ));
}

#[tokio::test]
async fn test_failed_search_is_counted_by_code() {
    init_metrics().unwrap();
    let service = SearchService::new(Arc::new(RecordingEngine::new()));
    let domain = reference_domain("ResultSet");
    let request = SearchRequest::new().with_filter("unknown", "x");

    assert!(service.search("MetricsFailure", &domain, &request).await.is_err());

    let output = gather_metrics();
    assert_eq!(
        sample_value(
            &output,
            "facet_gateway_search_requests_total",
            &[("domain", "MetricsFailure"), ("outcome", "VALIDATION_ERROR")]
        ),
        Some(1.0)
    );
    // Rejected before the engine was called
    assert_eq!(
        sample_value(
            &output,
            "facet_gateway_engine_request_duration_seconds_count",
            &[("domain", "MetricsFailure")]
        ),
        None
    );
}

#[test]
fn test_exposition_has_help_and_type() {
    init_metrics().unwrap();
    facet_gateway::metrics::GRAPHQL_OPERATIONS_TOTAL
        .with_label_values(&["MetricsExposition", "success"])
        .inc();

    let output = gather_metrics();
    assert!(output.contains("# HELP facet_gateway_graphql_operations_total"));
    assert!(output.contains("# TYPE facet_gateway_graphql_operations_total counter"));
}

#[tokio::test]
async fn test_graphql_series_are_bounded_by_root_fields() {
    init_metrics().unwrap();
    let service = Arc::new(SearchService::new(Arc::new(RecordingEngine::new())));
    let composed = SchemaComposer::new()
        .domains(reference_registrations())
        .compose(service)
        .unwrap();

    for n in 0..50 {
        let response = execute(
            &composed.schema,
            GraphQLRequest {
                query: format!("query Op{} {{ jobResultSet {{ sortedBy }} }}", n),
                operation_name: Some(format!("Op{}", n)),
                variables: None,
            },
        )
        .await
        .unwrap();
        assert!(response.errors.is_empty());
    }

    let output = gather_metrics();
    let series: Vec<_> = output
        .lines()
        .filter(|line| line.starts_with("facet_gateway_graphql_operations_total{"))
        .map(extract_labels)
        .collect();

    assert!(series
        .iter()
        .all(|labels| !labels.values().any(|value| value.starts_with("Op"))));
    assert_eq!(
        sample_value(
            &output,
            "facet_gateway_graphql_operations_total",
            &[("field", "jobResultSet"), ("outcome", "success")]
        ),
        Some(50.0)
    );
}
