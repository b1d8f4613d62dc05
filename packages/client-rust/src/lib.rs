//! `pgcache` Client -- distributed cache over a PostgreSQL-compatible store.
//!
//! A process-local cache tier layered on an authoritative PostgreSQL
//! store, with cross-process invalidation over `LISTEN`/`NOTIFY`,
//! single-flight loader coalescing, and TTL expiration enforced at both
//! tiers:
//!
//! - **Cache** ([`cache`]): `PostgresCache` façade and lifecycle
//! - **Errors** ([`error`]): `CacheError`
//! - **Stats** ([`stats`]): process-local counters
//! - plus internal modules for the local tier, single-flight registry,
//!   store access, migrator, and notification listener
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use pgcache_client::{CacheSettings, PostgresCache};
//!
//! async fn demo() -> Result<(), pgcache_client::CacheError> {
//!     let settings = CacheSettings::new("postgresql://localhost/app");
//!     PostgresCache::init_db(&settings).await?;
//!
//!     let cache = PostgresCache::new(settings)?;
//!     cache.connect().await?;
//!
//!     let value: serde_json::Value = cache
//!         .get_or_set(
//!             "user:42",
//!             || async { Ok(serde_json::json!({"name": "Ada"})) },
//!             Duration::from_secs(60),
//!         )
//!         .await?;
//!     assert_eq!(value["name"], "Ada");
//!
//!     cache.close().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod stats;

mod listener;
mod local_cache;
mod migrate;
mod singleflight;
mod store;

pub use cache::{PostgresCache, MAX_KEY_BYTES};
pub use error::CacheError;
pub use stats::CacheStats;

// Foundation types, re-exported so callers need only this crate.
pub use pgcache_core::codec::CodecError;
pub use pgcache_core::events::{EventOp, InvalidationEvent};
pub use pgcache_core::schema::SchemaNames;
pub use pgcache_core::settings::{CacheSettings, ConfigError};
