pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::graphql::ComposedSchema;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub schema: Arc<ComposedSchema>,
    pub metrics_enabled: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(schema: ComposedSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            metrics_enabled: true,
            started_at: Instant::now(),
        }
    }

    /// Toggle the /metrics endpoint
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}
