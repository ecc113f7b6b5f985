//! GraphQL context for request handling
//!
//! Provides resolvers with the shared search service

use std::sync::Arc;

use crate::search::SearchService;

/// GraphQL context passed to all resolvers
#[derive(Clone)]
pub struct GraphQLContext {
    /// Engine handle and timeout budget, shared by every domain
    pub service: Arc<SearchService>,
}

impl GraphQLContext {
    /// Create a new GraphQL context
    pub fn new(service: Arc<SearchService>) -> Self {
        Self { service }
    }
}
