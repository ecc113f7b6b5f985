//! Faceted search gateway
//!
//! Declarative search domains compiled into Elasticsearch queries and served
//! through one composed GraphQL API.

pub mod api;
pub mod config;
pub mod error;
pub mod graphql;
pub mod metrics;
pub mod search;

pub use error::{AppError, Result};
