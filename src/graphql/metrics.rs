//! Metrics integration for GraphQL
//!
//! Logs parse, validation and execution outcomes and counts root field
//! resolutions. Operation names are client-chosen, so they are only logged.

use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextExecute, NextParseQuery, NextResolve,
    NextValidation, ResolveInfo,
};
use async_graphql::parser::types::ExecutableDocument;
use async_graphql::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::metrics::GRAPHQL_OPERATIONS_TOTAL;

/// Resolvers slower than this are logged
const SLOW_RESOLVER: Duration = Duration::from_millis(100);

/// Field label for requests rejected before any field resolved
const NO_FIELD: &str = "none";

/// GraphQL metrics extension
pub struct MetricsExtension;

impl ExtensionFactory for MetricsExtension {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(MetricsExtensionImpl)
    }
}

struct MetricsExtensionImpl;

#[async_trait::async_trait]
impl Extension for MetricsExtensionImpl {
    async fn parse_query(
        &self,
        ctx: &ExtensionContext<'_>,
        query: &str,
        variables: &Variables,
        next: NextParseQuery<'_>,
    ) -> ServerResult<ExecutableDocument> {
        let result = next.run(ctx, query, variables).await;
        if let Err(err) = &result {
            warn!(
                query_length = query.len(),
                error = %err.message,
                "GraphQL query parse failed"
            );
            GRAPHQL_OPERATIONS_TOTAL
                .with_label_values(&[NO_FIELD, "parse_error"])
                .inc();
        }
        result
    }

    async fn validation(
        &self,
        ctx: &ExtensionContext<'_>,
        next: NextValidation<'_>,
    ) -> Result<ValidationResult, Vec<ServerError>> {
        let result = next.run(ctx).await;
        if let Err(errors) = &result {
            warn!(error_count = errors.len(), "GraphQL query validation failed");
            GRAPHQL_OPERATIONS_TOTAL
                .with_label_values(&[NO_FIELD, "invalid"])
                .inc();
        }
        result
    }

    async fn execute(
        &self,
        ctx: &ExtensionContext<'_>,
        operation_name: Option<&str>,
        next: NextExecute<'_>,
    ) -> Response {
        let start = Instant::now();
        let response = next.run(ctx, operation_name).await;
        let duration = start.elapsed();

        let operation = operation_name.unwrap_or("anonymous");
        let error_count = response.errors.len();

        if error_count > 0 {
            // Search errors already logged with their codes by the service
            info!(
                operation,
                duration_ms = duration.as_millis(),
                error_count,
                "GraphQL operation completed with errors"
            );
        } else {
            debug!(
                operation,
                duration_ms = duration.as_millis(),
                "GraphQL operation completed"
            );
        }

        response
    }

    async fn resolve(
        &self,
        ctx: &ExtensionContext<'_>,
        info: ResolveInfo<'_>,
        next: NextResolve<'_>,
    ) -> ServerResult<Option<Value>> {
        let start = Instant::now();
        let field = info.path_node.field_name().to_string();
        let parent_type = info.parent_type.to_string();
        let is_root = info.path_node.parent.is_none();
        let result = next.run(ctx, info).await;
        let duration = start.elapsed();

        if is_root {
            let outcome = if result.is_ok() { "success" } else { "error" };
            GRAPHQL_OPERATIONS_TOTAL
                .with_label_values(&[field.as_str(), outcome])
                .inc();
        }

        if duration > SLOW_RESOLVER {
            warn!(
                field = %field,
                parent_type = %parent_type,
                duration_ms = duration.as_millis(),
                "Slow GraphQL field resolver"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_extension_creation() {
        let factory = MetricsExtension;
        let extension = factory.create();
        assert!(!std::ptr::eq(Arc::as_ptr(&extension) as *const (), std::ptr::null()));
    }
}
