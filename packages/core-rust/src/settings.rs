//! Cache client configuration.
//!
//! [`CacheSettings`] is immutable once a cache instance is constructed;
//! every field has a conservative default except the DSN, which has no
//! sensible one.

use std::time::Duration;

use crate::schema::SchemaNames;

/// Default capacity of the process-local tier.
pub const DEFAULT_LOCAL_MAX_ENTRIES: usize = 1024;
/// Default minimum pooled connections.
pub const DEFAULT_POOL_MIN: u32 = 1;
/// Default maximum pooled connections.
pub const DEFAULT_POOL_MAX: u32 = 10;
/// Default per-statement deadline for authoritative-store calls.
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The DSN was empty.
    #[error("dsn must not be empty")]
    EmptyDsn,
    /// The DSN could not be parsed as a PostgreSQL connection string.
    #[error("invalid dsn: {message}")]
    InvalidDsn {
        /// Parser diagnostic.
        message: String,
    },
    /// The schema prefix contains characters outside `[A-Za-z0-9_]` or
    /// starts with a digit.
    #[error("invalid schema prefix: {prefix:?}")]
    InvalidPrefix {
        /// The rejected prefix.
        prefix: String,
    },
    /// The notification channel override is not a valid identifier.
    #[error("invalid notification channel: {channel:?}")]
    InvalidChannel {
        /// The rejected channel name.
        channel: String,
    },
    /// `pool_min` exceeds `pool_max`.
    #[error("pool_min ({min}) must not exceed pool_max ({max})")]
    PoolBounds {
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },
    /// The pool must be able to hold at least one connection.
    #[error("pool_max must be at least 1")]
    ZeroPool,
    /// A cache key exceeded the maximum length.
    #[error("key is {length} bytes, maximum is {max}")]
    InvalidKey {
        /// Byte length of the rejected key.
        length: usize,
        /// Maximum permitted byte length.
        max: usize,
    },
}

/// Configuration for a cache instance.
///
/// No `Default` impl because the DSN has no sensible default; use
/// [`CacheSettings::new`] and override fields as needed.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// PostgreSQL connection string for the authoritative store.
    pub dsn: String,
    /// Identifier prefix for table and channel names. Empty means defaults.
    pub schema_prefix: String,
    /// Overrides the derived notification channel name.
    pub notify_channel: Option<String>,
    /// Capacity of the process-local tier. 0 disables it.
    pub local_max_entries: usize,
    /// Suppresses both event emission and listening.
    pub disable_notify: bool,
    /// Minimum pooled connections kept open.
    pub pool_min: u32,
    /// Maximum pooled connections.
    pub pool_max: u32,
    /// Per-statement deadline for authoritative-store calls.
    pub statement_timeout: Duration,
}

impl CacheSettings {
    /// Creates settings for the given DSN with default values for
    /// everything else.
    #[must_use]
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            schema_prefix: String::new(),
            notify_channel: None,
            local_max_entries: DEFAULT_LOCAL_MAX_ENTRIES,
            disable_notify: false,
            pool_min: DEFAULT_POOL_MIN,
            pool_max: DEFAULT_POOL_MAX,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Validates every field that can be checked without connecting.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dsn.is_empty() {
            return Err(ConfigError::EmptyDsn);
        }
        if self.pool_max == 0 {
            return Err(ConfigError::ZeroPool);
        }
        if self.pool_min > self.pool_max {
            return Err(ConfigError::PoolBounds {
                min: self.pool_min,
                max: self.pool_max,
            });
        }
        // Resolution validates the prefix and channel identifiers.
        self.schema_names().map(|_| ())
    }

    /// Resolves the fully-qualified schema names for these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPrefix`] or
    /// [`ConfigError::InvalidChannel`].
    pub fn schema_names(&self) -> Result<SchemaNames, ConfigError> {
        SchemaNames::resolve(&self.schema_prefix, self.notify_channel.as_deref())
    }
}
