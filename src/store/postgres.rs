//! Postgres-backed store.
//!
//! Records live in `records(key text primary key, fields jsonb)`. The
//! conditional assign is a single `UPDATE ... WHERE NOT jsonb_exists(...)`,
//! so the presence check and the write are atomic per row.

use crate::error::{Error, Result};
use crate::identifier::VectorId;
use crate::model::{Assign, Record};
use crate::telemetry::metrics;
use async_trait::async_trait;
use opentelemetry::KeyValue;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Instant;
use tracing::debug;

use super::Store;

/// Rows fetched per enumerate page.
pub const DEFAULT_PAGE_SIZE: i64 = 1000;

/// Postgres store handle. Owns the connection pool.
pub struct PgStore {
    pool: PgPool,
    page_size: i64,
}

impl PgStore {
    /// Connect to Postgres. `max_connections` should be at least the run's
    /// concurrency or workers will queue on the pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Run `SELECT 1` against the pool.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert or replace a record. Used to seed tables.
    pub async fn put(&self, key: &str, fields: &serde_json::Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO records (key, fields) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET fields = EXCLUDED.fields",
        )
        .bind(key)
        .bind(fields)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch one record's fields.
    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT fields FROM records WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn enumerate(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page: Vec<RecordRow> = sqlx::query_as(
                "SELECT key, fields FROM records
                 WHERE ($1::text IS NULL OR key > $1)
                 ORDER BY key
                 LIMIT $2",
            )
            .bind(after.as_deref())
            .bind(self.page_size)
            .fetch_all(&self.pool)
            .await?;

            let fetched = page.len();
            after = page.last().map(|r| r.key.clone());
            records.extend(page.into_iter().map(Record::from));
            debug!(fetched, total = records.len(), "enumerate page");

            if (fetched as i64) < self.page_size {
                break;
            }
        }

        Ok(records)
    }

    async fn conditional_assign(&self, key: &str, field: &str, value: VectorId) -> Result<Assign> {
        let start = Instant::now();
        let value = i64::try_from(value.get())
            .map_err(|_| Error::Store(format!("vector id {value} does not fit bigint")))?;

        let updated: Option<(String,)> = sqlx::query_as(
            "UPDATE records
             SET fields = fields || jsonb_build_object($2::text, $3::bigint)
             WHERE key = $1 AND NOT jsonb_exists(fields, $2)
             RETURNING key",
        )
        .bind(key)
        .bind(field)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(format!("update {key:?}: {e}")))?;

        metrics::assign_duration_ms().record(
            start.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("store", "postgres")],
        );

        if updated.is_some() {
            return Ok(Assign::Applied);
        }

        // Nothing updated: either the field is already set or the row is gone.
        let exists: Option<(bool,)> =
            sqlx::query_as("SELECT jsonb_exists(fields, $2) FROM records WHERE key = $1")
                .bind(key)
                .bind(field)
                .fetch_optional(&self.pool)
                .await?;

        match exists {
            Some((true,)) => Ok(Assign::AlreadyPresent),
            Some((false,)) => Err(Error::Store(format!(
                "update of {key:?} matched no row although the field is absent"
            ))),
            None => Err(Error::Store(format!("no record with key {key:?}"))),
        }
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct RecordRow {
    key: String,
    fields: serde_json::Value,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        let fields = match row.fields {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            key: Some(row.key),
            fields,
        }
    }
}
