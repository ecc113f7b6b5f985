//! Common test utilities
//!
//! A recording in-memory engine, the reference domains and helpers for
//! checking Prometheus exposition output.

#![allow(dead_code)]

use async_trait::async_trait;
use facet_gateway::config::Config;
use facet_gateway::graphql::DomainRegistration;
use facet_gateway::search::{
    CompiledQuery, EngineBucket, EngineHit, EngineResponse, SearchDomainConfig, SearchEngine,
    SearchResult,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Engine double that records every query and answers with canned data
///
/// Aggregations requested by the query are always answered; buckets come
/// from [`RecordingEngine::with_buckets`] or are empty.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<CompiledQuery>>,
    total: u64,
    hits: Vec<EngineHit>,
    buckets: HashMap<String, Vec<EngineBucket>>,
    delay: Option<Duration>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    pub fn with_hit(mut self, id: &str, score: Option<f64>, source: Value) -> Self {
        self.hits.push(EngineHit {
            id: id.to_string(),
            score,
            source,
        });
        self.total = self.total.max(self.hits.len() as u64);
        self
    }

    pub fn with_buckets(mut self, aggregation: &str, buckets: &[(&str, u64)]) -> Self {
        self.buckets.insert(
            aggregation.to_string(),
            buckets
                .iter()
                .map(|(key, count)| EngineBucket {
                    key: key.to_string(),
                    count: *count,
                })
                .collect(),
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<CompiledQuery> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> CompiledQuery {
        self.calls()
            .pop()
            .expect("engine should have been called")
    }
}

#[async_trait]
impl SearchEngine for RecordingEngine {
    async fn search(&self, query: &CompiledQuery) -> SearchResult<EngineResponse> {
        self.calls.lock().unwrap().push(query.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let aggregations = query
            .aggregations
            .iter()
            .map(|aggregation| {
                let buckets = self.buckets.get(&aggregation.name).cloned().unwrap_or_default();
                (aggregation.name.clone(), buckets)
            })
            .collect();

        Ok(EngineResponse {
            total: self.total,
            hits: self.hits.clone(),
            aggregations,
        })
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// The shipped `ResultSet` / `JobResultSet` registrations
pub fn reference_registrations() -> Vec<DomainRegistration> {
    Config::default_domains()
        .unwrap()
        .iter()
        .map(|domain| domain.registration().unwrap())
        .collect()
}

/// Reference domain by GraphQL type name
pub fn reference_domain(type_name: &str) -> SearchDomainConfig {
    reference_registrations()
        .into_iter()
        .find(|registration| registration.type_name == type_name)
        .map(|registration| (*registration.domain).clone())
        .expect("reference domain exists")
}

/// Check whether a metric name appears in Prometheus exposition output
pub fn metric_exists(output: &str, metric_name: &str) -> bool {
    output.lines().any(|line| {
        let line = line.trim();
        !line.starts_with('#') && line.starts_with(metric_name)
    })
}

/// Value of the sample `name{labels}` whose labels include all of `labels`
pub fn sample_value(output: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| line.starts_with(&format!("{}{{", name)))
        .find(|line| {
            let parsed = extract_labels(line);
            labels
                .iter()
                .all(|(key, value)| parsed.get(*key).map(String::as_str) == Some(*value))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

/// Extract labels from a metric line
pub fn extract_labels(line: &str) -> HashMap<String, String> {
    let mut labels = HashMap::new();

    if let Some(start) = line.find('{') {
        if let Some(end) = line.find('}') {
            let labels_str = &line[start + 1..end];
            for pair in labels_str.split(',') {
                if let Some((key, value)) = pair.split_once('=') {
                    labels.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
                }
            }
        }
    }

    labels
}
