//! PostgreSQL entity store.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use super::{EntityStore, sql};
use crate::listing::query::{ColumnRef, FacetQuery, FacetRow, ListingQuery};

/// Entity store backed by a PostgreSQL pool.
///
/// Every statement runs inside a short transaction with a local
/// `statement_timeout`, so a slow facet cannot hold a connection forever.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Connect a new pool.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        statement_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;

        Ok(Self::new(pool, statement_timeout))
    }

    /// Begin a transaction with the statement timeout applied.
    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin query transaction")?;

        // SET does not accept bind parameters; the value is a plain integer
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = '{}ms'",
            self.statement_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .context("failed to set statement timeout")?;

        Ok(tx)
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn fetch_page(&self, query: &ListingQuery) -> Result<Vec<Value>> {
        let main_sql = sql::select_page(query);
        tracing::debug!(sql = %main_sql, "listing page query");

        let mut tx = self.begin().await?;
        let rows: Vec<Value> =
            sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({main_sql}) t"))
                .fetch_all(&mut *tx)
                .await
                .context("failed to execute listing query")?;
        tx.commit()
            .await
            .context("failed to commit query transaction")?;

        Ok(rows)
    }

    async fn count(&self, query: &ListingQuery) -> Result<u64> {
        let count_sql = sql::select_count(query);
        tracing::debug!(sql = %count_sql, "listing count query");

        let mut tx = self.begin().await?;
        let total: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&mut *tx)
            .await
            .context("failed to execute count query")?;
        tx.commit()
            .await
            .context("failed to commit query transaction")?;

        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn aggregate(&self, query: &FacetQuery) -> Result<Vec<FacetRow>> {
        let facet_sql = sql::select_facet(query);
        tracing::debug!(facet = %query.facet, sql = %facet_sql, "facet query");

        let mut tx = self.begin().await?;
        let rows: Vec<(i64, Option<String>, Option<String>)> = sqlx::query_as(&facet_sql)
            .fetch_all(&mut *tx)
            .await
            .with_context(|| format!("failed to aggregate facet '{}'", query.facet))?;
        tx.commit()
            .await
            .context("failed to commit query transaction")?;

        Ok(rows
            .into_iter()
            .map(|(count, id, title)| FacetRow { count, id, title })
            .collect())
    }

    async fn find_by_id(
        &self,
        query: &ListingQuery,
        id_column: &ColumnRef,
        id: i64,
    ) -> Result<Option<Value>> {
        let item_sql = sql::select_item(query, id_column, id);
        tracing::debug!(sql = %item_sql, "item query");

        let mut tx = self.begin().await?;
        let row: Option<Value> =
            sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({item_sql}) t"))
                .fetch_optional(&mut *tx)
                .await
                .context("failed to load item")?;
        tx.commit()
            .await
            .context("failed to commit query transaction")?;

        Ok(row)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
