//! GraphQL API module
//!
//! One schema composed from every configured search domain:
//! - A root query field per domain, returning hits, facets and applied filters
//! - Shared summary, paging and facet types
//! - Error codes under `extensions.code`
//! - Metrics and tracing integration

pub mod context;
pub mod metrics;
pub mod schema;
pub mod types;

pub use context::GraphQLContext;
pub use schema::{
    into_graphql_error, lower_camel, sanitize_field_name, ComposedSchema, DomainRegistration,
    GraphQLSchema, SchemaComposer, TypeRegistry, MAX_QUERY_DEPTH,
};

use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Clone)]
struct GraphQLState {
    schema: GraphQLSchema,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,
    pub variables: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct GraphQLResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<serde_json::Value>,
}

/// Build GraphQL routes for Axum
///
/// Returns a router with:
/// - POST /graphql - GraphQL endpoint
/// - GET /graphql - GraphQL Playground UI
pub fn graphql_routes(schema: GraphQLSchema) -> Router {
    Router::new()
        .route("/graphql", get(graphql_playground).post(graphql_handler))
        .with_state(GraphQLState { schema })
}

/// Run one GraphQL request against the composed schema
pub async fn execute(schema: &GraphQLSchema, req: GraphQLRequest) -> Result<GraphQLResponse, AppError> {
    let mut request = async_graphql::Request::new(req.query);

    if let Some(op_name) = req.operation_name {
        request = request.operation_name(op_name);
    }

    if let Some(vars) = req.variables.filter(|v| !v.is_null()) {
        let vars: async_graphql::Variables = serde_json::from_value(vars)
            .map_err(|e| AppError::Validation(format!("invalid variables: {}", e)))?;
        request = request.variables(vars);
    }

    let response = schema.execute(request).await;

    let data = match response.data {
        async_graphql::Value::Null => None,
        data => Some(data.into_json()?),
    };
    let errors = response
        .errors
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GraphQLResponse { data, errors })
}

async fn graphql_handler(
    State(state): State<GraphQLState>,
    Json(req): Json<GraphQLRequest>,
) -> Result<Json<GraphQLResponse>, AppError> {
    execute(&state.schema, req).await.map(Json)
}

/// GraphQL Playground UI handler
async fn graphql_playground() -> impl IntoResponse {
    Html(playground_source(GraphQLPlaygroundConfig::new("/graphql")))
}
