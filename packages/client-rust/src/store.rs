//! Authoritative-store access layer.
//!
//! Owns the connection pool and the five statements the cache needs:
//! select, upsert, delete, sweep, and notification emit. Every emit runs
//! in the same transaction as its mutation, so peers never observe an
//! event for a mutation that was rolled back. TTL is enforced read-side:
//! `select` treats rows past their `expires_at` as absent.
//!
//! The per-statement deadline (`statement_timeout`) is installed as a
//! connect-time server option, so it applies to every pooled connection
//! without per-call ceremony.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};

use pgcache_core::events::{EventOp, InvalidationEvent};
use pgcache_core::schema::SchemaNames;
use pgcache_core::settings::{CacheSettings, ConfigError};

use crate::error::CacheError;

/// Parses the configured DSN and applies the statement timeout.
pub(crate) fn connect_options(settings: &CacheSettings) -> Result<PgConnectOptions, CacheError> {
    let options: PgConnectOptions = settings.dsn.parse().map_err(|err: sqlx::Error| {
        CacheError::Config(ConfigError::InvalidDsn {
            message: err.to_string(),
        })
    })?;
    let timeout_ms = settings.statement_timeout.as_millis();
    Ok(options.options([("statement_timeout", timeout_ms.to_string())]))
}

/// Builds the bounded connection pool for the authoritative store.
pub(crate) async fn build_pool(settings: &CacheSettings) -> Result<PgPool, CacheError> {
    let options = connect_options(settings)?;
    let pool = PgPoolOptions::new()
        .min_connections(settings.pool_min)
        .max_connections(settings.pool_max)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Statement executor over the entries table.
#[derive(Debug, Clone)]
pub(crate) struct Store {
    pool: PgPool,
    names: SchemaNames,
    origin: String,
    notify_enabled: bool,
    select_sql: String,
    upsert_sql: String,
    delete_sql: String,
    sweep_sql: String,
}

impl Store {
    pub fn new(pool: PgPool, names: SchemaNames, origin: String, notify_enabled: bool) -> Self {
        let table = &names.entries_table;
        let select_sql = format!(
            "SELECT value, expires_at FROM {table} WHERE key = $1 AND expires_at > now()"
        );
        let upsert_sql = format!(
            "INSERT INTO {table} (key, value, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, \
             expires_at = EXCLUDED.expires_at, updated_at = now()"
        );
        let delete_sql = format!("DELETE FROM {table} WHERE key = $1 RETURNING key");
        let sweep_sql = format!("DELETE FROM {table} WHERE expires_at <= now() RETURNING key");
        Self {
            pool,
            names,
            origin,
            notify_enabled,
            select_sql,
            upsert_sql,
            delete_sql,
            sweep_sql,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetches the value and expiry for `key`, or `None` if the row is
    /// absent or already expired.
    pub async fn select(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, DateTime<Utc>)>, CacheError> {
        let row = sqlx::query_as::<_, (Vec<u8>, DateTime<Utc>)>(&self.select_sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Inserts or overwrites the row and emits a `set` event.
    pub async fn upsert(
        &self,
        key: &str,
        value: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&self.upsert_sql)
            .bind(key)
            .bind(value)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        self.emit(&mut tx, key, EventOp::Set).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes the row and emits an `invalidate` event.
    ///
    /// Returns whether a row existed. The event is emitted either way:
    /// peers may hold a lazily-expiring local copy of a row the store
    /// already dropped.
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query_scalar::<_, String>(&self.delete_sql)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        self.emit(&mut tx, key, EventOp::Invalidate).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// Deletes every expired row, emitting an `expire` event per key.
    ///
    /// Returns the number of rows removed. Not required for correctness
    /// (TTL enforcement is read-side); operators invoke this to keep the
    /// table compact.
    pub async fn sweep(&self) -> Result<u64, CacheError> {
        let mut tx = self.pool.begin().await?;
        let keys: Vec<String> = sqlx::query_scalar(&self.sweep_sql)
            .fetch_all(&mut *tx)
            .await?;
        for key in &keys {
            self.emit(&mut tx, key, EventOp::Expire).await?;
        }
        tx.commit().await?;
        Ok(keys.len() as u64)
    }

    async fn emit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        op: EventOp,
    ) -> Result<(), CacheError> {
        if !self.notify_enabled {
            return Ok(());
        }
        let payload = InvalidationEvent::new(key, op, self.origin.as_str()).to_payload()?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.names.notify_channel)
            .bind(payload)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
