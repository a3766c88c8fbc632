//! Entity store backends.
//!
//! The listing engine talks to its data through [`EntityStore`]. Two
//! backends are provided:
//! - [`PgStore`]: PostgreSQL via sqlx, SQL rendered with sea-query
//! - [`MemoryStore`]: records held in process, loaded from a seed file

mod memory;
mod postgres;
pub mod sql;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::listing::query::{ColumnRef, FacetQuery, FacetRow, ListingQuery};

/// Executes listing queries.
///
/// Implementations do not retry and impose no timeout beyond their own
/// connection settings.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Rows for one page, as JSON objects keyed by column name (relation
    /// columns keyed by their field path).
    async fn fetch_page(&self, query: &ListingQuery) -> anyhow::Result<Vec<Value>>;

    /// Number of rows matching the query's filters.
    async fn count(&self, query: &ListingQuery) -> anyhow::Result<u64>;

    /// Grouped counts for one facet.
    async fn aggregate(&self, query: &FacetQuery) -> anyhow::Result<Vec<FacetRow>>;

    /// One row by identifier, with the same columns as a page row.
    async fn find_by_id(
        &self,
        query: &ListingQuery,
        id_column: &ColumnRef,
        id: i64,
    ) -> anyhow::Result<Option<Value>>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> anyhow::Result<()>;

    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;
}
