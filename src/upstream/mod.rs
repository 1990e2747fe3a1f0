//! Upstream query services
//!
//! The members service owns Member rows; the planning service owns Concert
//! and Rehearsal rows. Both expose a GraphQL endpoint with an all-of-a-kind
//! query and a single-by-id query, and this module is the only place that
//! talks to them.
//!
//! No retry or circuit breaking lives here: that belongs to the transport
//! configured around the service.

mod graphql;

pub use graphql::GraphQlClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Replicated;

/// Errors from a single fetch against an upstream service.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure reaching the service.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with GraphQL errors.
    #[error("graphql error: {0}")]
    Graph(String),

    /// The response did not match the expected schema.
    #[error("unexpected response shape: {0}")]
    Schema(String),

    /// The entity does not exist upstream.
    #[error("entity not found")]
    NotFound,
}

/// Query contract against the owning services.
///
/// Generic over the entity type so the fetch-then-store path is written
/// once; tests substitute a canned implementation.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Every instance of one entity type.
    async fn fetch_all<E: Replicated>(&self) -> Result<Vec<E>, FetchError>;

    /// One entity by its upstream id. `id` must be positive.
    async fn fetch_one<E: Replicated>(&self, id: i64) -> Result<E, FetchError>;
}
