//! Elasticsearch `_search` adapter
//!
//! Renders a [`CompiledQuery`] as an Elasticsearch request body and parses the
//! answer back into the abstract [`EngineResponse`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

use super::compiler::CompiledQuery;
use super::engine::{EngineBucket, EngineHit, EngineResponse, SearchEngine};
use super::error::{SearchError, SearchResult};
use super::query::{format_number, AggregationKind, AggregationRequest, QueryFragment, RangeValue};

/// Elasticsearch client bound to one host
#[derive(Clone)]
pub struct ElasticsearchEngine {
    client: Client,
    host: String,
    timeout: Duration,
}

impl ElasticsearchEngine {
    /// Create a client; `timeout` bounds every HTTP exchange
    pub fn new(host: impl Into<String>, timeout: Duration) -> SearchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn search_url(&self, index: &str) -> String {
        format!("{}/{}/_search", self.host, index)
    }
}

#[async_trait]
impl SearchEngine for ElasticsearchEngine {
    async fn search(&self, query: &CompiledQuery) -> SearchResult<EngineResponse> {
        let url = self.search_url(&query.index);
        let body = render_body(query);
        debug!(url = %url, "Sending search request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::EngineTimeout(self.timeout.as_millis() as u64)
                } else {
                    SearchError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(url = %url, status = status.as_u16(), "Search engine returned an error");
            return Err(SearchError::EngineFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        parse_response(&body, query)
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}

/// Request body for `POST /{index}/_search`
pub fn render_body(query: &CompiledQuery) -> Value {
    let mut body = Map::new();
    body.insert("query".into(), render_fragment(&query.query()));

    if let Some(post_filter) = query.post_filter() {
        body.insert("post_filter".into(), render_fragment(&post_filter));
    }

    if !query.aggregations.is_empty() {
        let aggs: Map<String, Value> = query
            .aggregations
            .iter()
            .map(|aggregation| (aggregation.name.clone(), render_aggregation(aggregation)))
            .collect();
        body.insert("aggs".into(), Value::Object(aggs));
    }

    let sort: Vec<Value> = query
        .sort
        .iter()
        .map(|clause| json!({ clause.field.as_str(): { "order": clause.order.as_str() } }))
        .collect();
    body.insert("sort".into(), Value::Array(sort));
    body.insert("from".into(), json!(query.from));
    body.insert("size".into(), json!(query.size));
    body.insert("_source".into(), json!(query.source));
    body.insert("track_total_hits".into(), Value::Bool(true));

    Value::Object(body)
}

/// Render one node of the boolean query
pub fn render_fragment(fragment: &QueryFragment) -> Value {
    match fragment {
        QueryFragment::MatchAll => json!({ "match_all": {} }),
        QueryFragment::MultiMatch { query, fields } => json!({
            "multi_match": { "query": query, "fields": fields }
        }),
        QueryFragment::Term { field, value } => json!({ "term": { field.as_str(): value } }),
        QueryFragment::Range { field, gte, lt } => {
            let mut bounds = Map::new();
            if let Some(gte) = gte {
                bounds.insert("gte".into(), render_range_value(gte));
            }
            if let Some(lt) = lt {
                bounds.insert("lt".into(), render_range_value(lt));
            }
            json!({ "range": { field.as_str(): bounds } })
        }
        QueryFragment::Bool(bool_query) => {
            let mut clauses = Map::new();
            for (occur, fragments) in [
                ("must", &bool_query.must),
                ("filter", &bool_query.filter),
                ("should", &bool_query.should),
            ] {
                if !fragments.is_empty() {
                    clauses.insert(
                        occur.into(),
                        Value::Array(fragments.iter().map(render_fragment).collect()),
                    );
                }
            }
            if let Some(minimum) = bool_query.minimum_should_match {
                clauses.insert("minimum_should_match".into(), json!(minimum));
            }
            json!({ "bool": clauses })
        }
    }
}

fn render_range_value(value: &RangeValue) -> Value {
    match value {
        RangeValue::Number(number) => json!(number),
        RangeValue::Date(date) => json!(date.to_rfc3339()),
    }
}

fn render_aggregation(aggregation: &AggregationRequest) -> Value {
    let inner = match &aggregation.kind {
        AggregationKind::Terms { field, size } => json!({
            "terms": { "field": field, "size": size }
        }),
        AggregationKind::Histogram {
            field,
            interval,
            min,
            max,
        } => json!({
            "histogram": {
                "field": field,
                "interval": interval,
                "min_doc_count": 0,
                "extended_bounds": { "min": min, "max": max }
            }
        }),
        AggregationKind::DateRange { field, ranges } => {
            let ranges: Vec<Value> = ranges
                .iter()
                .map(|range| {
                    let mut bucket = Map::new();
                    bucket.insert("key".into(), json!(range.label));
                    if let Some(from) = &range.from {
                        bucket.insert("from".into(), json!(from));
                    }
                    if let Some(to) = &range.to {
                        bucket.insert("to".into(), json!(to));
                    }
                    Value::Object(bucket)
                })
                .collect();
            json!({ "date_range": { "field": field, "ranges": ranges } })
        }
    };

    if aggregation.filters.is_empty() {
        inner
    } else {
        let filter = QueryFragment::all_of(aggregation.filters.clone());
        json!({
            "filter": render_fragment(&filter),
            "aggs": { aggregation.name.as_str(): inner }
        })
    }
}

/// Parse a `_search` answer for `query`
pub fn parse_response(body: &Value, query: &CompiledQuery) -> SearchResult<EngineResponse> {
    let malformed = |what: &str| SearchError::MalformedResponse(what.to_string());

    let hits_section = body.get("hits").ok_or_else(|| malformed("missing 'hits'"))?;
    let total = match hits_section.get("total") {
        Some(Value::Number(total)) => total.as_u64(),
        Some(total) => total.get("value").and_then(Value::as_u64),
        None => None,
    }
    .ok_or_else(|| malformed("missing 'hits.total'"))?;

    let hits = hits_section
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing 'hits.hits'"))?
        .iter()
        .map(|hit| {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("hit without '_id'"))?;
            Ok(EngineHit {
                id: id.to_string(),
                score: hit.get("_score").and_then(Value::as_f64),
                source: hit.get("_source").cloned().unwrap_or(Value::Null),
            })
        })
        .collect::<SearchResult<Vec<_>>>()?;

    let mut aggregations = HashMap::new();
    for aggregation in &query.aggregations {
        let Some(mut node) = body
            .get("aggregations")
            .and_then(|aggs| aggs.get(&aggregation.name))
        else {
            continue;
        };
        if !aggregation.filters.is_empty() {
            node = node
                .get(&aggregation.name)
                .ok_or_else(|| malformed("filtered aggregation without inner result"))?;
        }

        let buckets = node
            .get("buckets")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("aggregation without 'buckets'"))?
            .iter()
            .map(parse_bucket)
            .collect::<SearchResult<Vec<_>>>()?;
        aggregations.insert(aggregation.name.clone(), buckets);
    }

    Ok(EngineResponse {
        total,
        hits,
        aggregations,
    })
}

fn parse_bucket(bucket: &Value) -> SearchResult<EngineBucket> {
    let key = match bucket.get("key") {
        Some(Value::String(key)) => key.clone(),
        Some(Value::Number(key)) => key
            .as_f64()
            .map(format_number)
            .unwrap_or_else(|| key.to_string()),
        Some(Value::Bool(key)) => key.to_string(),
        _ => return Err(SearchError::MalformedResponse("bucket without 'key'".into())),
    };
    let count = bucket
        .get("doc_count")
        .and_then(Value::as_u64)
        .ok_or_else(|| SearchError::MalformedResponse("bucket without 'doc_count'".into()))?;

    Ok(EngineBucket { key, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query::{DateRangeBucket, SortClause};

    fn compiled() -> CompiledQuery {
        CompiledQuery {
            index: "freelancers".into(),
            relevance: QueryFragment::MatchAll,
            filters: vec![QueryFragment::term("tag", "urgent")],
            post_filters: vec![],
            aggregations: vec![AggregationRequest {
                name: "country".into(),
                kind: AggregationKind::Terms {
                    field: "country.keyword".into(),
                    size: 10,
                },
                filters: vec![],
            }],
            sort_id: "relevance".into(),
            sort: vec![SortClause::score()],
            from: 0,
            size: 10,
            source: vec!["firstname".into()],
        }
    }

    #[test]
    fn test_render_body() {
        let body = render_body(&compiled());

        assert_eq!(
            body,
            json!({
                "query": {
                    "bool": {
                        "must": [{ "match_all": {} }],
                        "filter": [{ "term": { "tag": "urgent" } }]
                    }
                },
                "aggs": {
                    "country": { "terms": { "field": "country.keyword", "size": 10 } }
                },
                "sort": [{ "_score": { "order": "desc" } }],
                "from": 0,
                "size": 10,
                "_source": ["firstname"],
                "track_total_hits": true
            })
        );
    }

    #[test]
    fn test_render_filtered_aggregation_and_post_filter() {
        let mut query = compiled();
        query.post_filters = vec![QueryFragment::term("country.keyword", "Spain")];
        query.aggregations[0].filters = vec![QueryFragment::term("skills.keyword", "rust")];

        let body = render_body(&query);
        assert_eq!(
            body["post_filter"],
            json!({ "bool": { "filter": [{ "term": { "country.keyword": "Spain" } }] } })
        );
        assert_eq!(
            body["aggs"]["country"],
            json!({
                "filter": { "bool": { "filter": [{ "term": { "skills.keyword": "rust" } }] } },
                "aggs": { "country": { "terms": { "field": "country.keyword", "size": 10 } } }
            })
        );
    }

    #[test]
    fn test_render_date_range_aggregation() {
        let aggregation = AggregationRequest {
            name: "joined".into(),
            kind: AggregationKind::DateRange {
                field: "joined_at".into(),
                ranges: vec![DateRangeBucket {
                    label: "Recent".into(),
                    from: Some("2024-01-01".into()),
                    to: None,
                }],
            },
            filters: vec![],
        };

        assert_eq!(
            render_aggregation(&aggregation),
            json!({
                "date_range": {
                    "field": "joined_at",
                    "ranges": [{ "key": "Recent", "from": "2024-01-01" }]
                }
            })
        );
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [
                    { "_id": "b", "_score": 2.0, "_source": { "firstname": "Bob" } },
                    { "_id": "a", "_score": null, "_source": { "firstname": "Ann" } }
                ]
            },
            "aggregations": {
                "country": { "buckets": [{ "key": "Spain", "doc_count": 2 }] }
            }
        });

        let response = parse_response(&body, &compiled()).unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.hits[0].id, "b");
        assert_eq!(response.hits[0].score, Some(2.0));
        assert_eq!(response.hits[1].score, None);
        assert_eq!(
            response.aggregations["country"],
            vec![EngineBucket {
                key: "Spain".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_parse_numeric_bucket_keys() {
        let bucket = parse_bucket(&json!({ "key": 10.0, "doc_count": 3 })).unwrap();
        assert_eq!(bucket.key, "10");
    }

    #[test]
    fn test_parse_rejects_missing_hits() {
        let err = parse_response(&json!({ "took": 1 }), &compiled()).unwrap_err();
        assert!(matches!(err, SearchError::MalformedResponse(_)));
    }
}
