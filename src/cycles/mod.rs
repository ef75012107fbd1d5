//! Read model for workspace cycle statistics.
//!
//! A [`CycleStatsReader`] lists the active (non-archived) cycles of a
//! workspace, each annotated with issue counts and estimate sums per state
//! group. Archived and draft issues never contribute to any aggregate.
//!
//! Two readers implement the contract: [`PgCycleStatsReader`] issues a single
//! grouped query against PostgreSQL, and [`InMemoryCycleStore`] computes the
//! same projection over an in-memory fixture.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::CycleStats;

pub mod memory;
pub mod ordering;
pub mod postgres;

pub use memory::InMemoryCycleStore;
pub use ordering::{CycleOrdering, CycleSortField, DEFAULT_ORDER_BY, SortOrder};
pub use postgres::PgCycleStatsReader;

pub type CycleStatsResult<T> = Result<T, CycleStatsError>;

#[derive(Debug, Error)]
pub enum CycleStatsError {
    #[error("invalid order_by field '{0}'")]
    InvalidOrdering(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Reader port for the workspace cycle listing.
#[async_trait]
pub trait CycleStatsReader: Send + Sync {
    /// List the active cycles of `workspace_slug` in `ordering` order.
    ///
    /// An unknown slug yields an empty list rather than an error.
    async fn list_cycle_stats(
        &self,
        workspace_slug: &str,
        ordering: CycleOrdering,
    ) -> CycleStatsResult<Vec<CycleStats>>;
}

/// Reader handle managed as Rocket state.
pub type SharedCycleStatsReader = Arc<dyn CycleStatsReader>;
