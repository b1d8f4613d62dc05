//! Error types for the cache client.

use pgcache_core::codec::CodecError;
use pgcache_core::settings::ConfigError;

/// Errors surfaced by [`PostgresCache`](crate::PostgresCache) operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Invalid settings, schema prefix, connection string, or key.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The authoritative store failed, including statement timeouts.
    #[error("authoritative store error: {0}")]
    Store(#[from] sqlx::Error),
    /// A payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// The caller-supplied loader failed.
    ///
    /// Waiters coalesced onto a failed slot also receive this kind,
    /// carrying the creator's failure message.
    #[error("loader failed: {message}")]
    Loader {
        /// Description of the underlying failure.
        message: String,
    },
    /// `connect` was called while the instance was already running.
    #[error("cache is already connected")]
    AlreadyConnected,
    /// A data operation was attempted before `connect` or after `close`.
    #[error("cache is not connected")]
    NotConnected,
    /// The operation was interrupted by `close`.
    #[error("operation cancelled")]
    Cancelled,
}
