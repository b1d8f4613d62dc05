//! Idempotent schema migration for the entries table.
//!
//! All DDL is conditional (`IF NOT EXISTS`) and runs under a
//! `pg_advisory_lock` keyed by the FNV-1a hash of the table name, so any
//! number of processes can run `init_db` concurrently and converge on the
//! same schema. A final event-less sweep removes rows that expired while
//! nothing was running.

use sqlx::PgConnection;
use tracing::info;

use pgcache_core::hash::fnv1a_hash;
use pgcache_core::schema::SchemaNames;

/// Runs all migrations on the given connection.
pub(crate) async fn run_migrations(
    conn: &mut PgConnection,
    names: &SchemaNames,
) -> Result<(), sqlx::Error> {
    let lock_key = advisory_lock_key(names);
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(lock_key)
        .execute(&mut *conn)
        .await?;

    let applied = apply_statements(conn, names).await;

    // Release even when DDL failed; the DDL error wins.
    let _ = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(lock_key)
        .execute(&mut *conn)
        .await;

    applied?;
    info!(table = %names.entries_table, "cache schema migrated");
    Ok(())
}

/// Advisory locks take a signed 64-bit key; reuse the hash's bit pattern.
fn advisory_lock_key(names: &SchemaNames) -> i64 {
    i64::from_ne_bytes(fnv1a_hash(names.entries_table_raw()).to_ne_bytes())
}

/// The migration statements, in execution order.
fn migration_statements(names: &SchemaNames) -> Vec<String> {
    let table = &names.entries_table;
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key        TEXT PRIMARY KEY,
                value      BYTEA NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {index} ON {table} (expires_at)",
            index = names.expires_index
        ),
        format!("DELETE FROM {table} WHERE expires_at <= now()"),
    ]
}

async fn apply_statements(
    conn: &mut PgConnection,
    names: &SchemaNames,
) -> Result<(), sqlx::Error> {
    for statement in migration_statements(names) {
        sqlx::query(&statement).execute(&mut *conn).await?;
    }
    Ok(())
}
