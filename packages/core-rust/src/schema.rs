//! Fully-qualified identifier resolution for the cache schema.
//!
//! A configured prefix expands into the entries-table, index, and
//! notification-channel names. Identifiers are validated against
//! `[A-Za-z_][A-Za-z0-9_]*` and SQL-facing names are double-quoted, so
//! resolved names can be interpolated into statements directly.

use std::sync::LazyLock;

use regex::Regex;

use crate::settings::ConfigError;

/// Base name of the entries table, prefixed by `schema_prefix`.
pub const ENTRIES_TABLE_BASE: &str = "cache_entries";
/// Base name of the notification channel, prefixed by `schema_prefix`.
pub const NOTIFY_CHANNEL_BASE: &str = "cache_events";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Returns whether `name` is a valid unquoted SQL identifier.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Resolved identifiers for one cache deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNames {
    /// Double-quoted entries-table name, ready for SQL interpolation.
    pub entries_table: String,
    /// Double-quoted name of the `expires_at` index.
    pub expires_index: String,
    /// Notification channel identifier (unquoted; bound as a parameter).
    pub notify_channel: String,
}

impl SchemaNames {
    /// Composes schema names from a prefix and an optional channel
    /// override.
    ///
    /// An empty prefix yields the default names. The prefix must be a
    /// valid identifier fragment; the override must be a complete valid
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPrefix`] or
    /// [`ConfigError::InvalidChannel`].
    pub fn resolve(prefix: &str, channel_override: Option<&str>) -> Result<Self, ConfigError> {
        if !prefix.is_empty() && !is_valid_identifier(prefix) {
            return Err(ConfigError::InvalidPrefix {
                prefix: prefix.to_string(),
            });
        }

        let table = format!("{prefix}{ENTRIES_TABLE_BASE}");
        let notify_channel = match channel_override {
            Some(channel) => {
                if !is_valid_identifier(channel) {
                    return Err(ConfigError::InvalidChannel {
                        channel: channel.to_string(),
                    });
                }
                channel.to_string()
            }
            None => format!("{prefix}{NOTIFY_CHANNEL_BASE}"),
        };

        Ok(Self {
            entries_table: format!("\"{table}\""),
            expires_index: format!("\"{table}_expires_at_idx\""),
            notify_channel,
        })
    }

    /// Unquoted entries-table name, used to derive the migration lock key.
    #[must_use]
    pub fn entries_table_raw(&self) -> &str {
        self.entries_table.trim_matches('"')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prefix_yields_defaults() {
        let names = SchemaNames::resolve("", None).expect("resolve");
        assert_eq!(names.entries_table, "\"cache_entries\"");
        assert_eq!(names.expires_index, "\"cache_entries_expires_at_idx\"");
        assert_eq!(names.notify_channel, "cache_events");
    }

    #[test]
    fn prefix_is_prepended_everywhere() {
        let names = SchemaNames::resolve("myapp_", None).expect("resolve");
        assert_eq!(names.entries_table, "\"myapp_cache_entries\"");
        assert_eq!(
            names.expires_index,
            "\"myapp_cache_entries_expires_at_idx\""
        );
        assert_eq!(names.notify_channel, "myapp_cache_events");
    }

    #[test]
    fn channel_override_wins_over_prefix() {
        let names = SchemaNames::resolve("myapp_", Some("custom_events")).expect("resolve");
        assert_eq!(names.notify_channel, "custom_events");
        assert_eq!(names.entries_table, "\"myapp_cache_entries\"");
    }

    #[test]
    fn invalid_prefixes_are_rejected() {
        for prefix in ["9starts_with_digit", "has-dash", "has space", "semi;colon"] {
            let err = SchemaNames::resolve(prefix, None).expect_err(prefix);
            assert!(matches!(err, ConfigError::InvalidPrefix { .. }), "{prefix}");
        }
    }

    #[test]
    fn invalid_channel_override_is_rejected() {
        let err = SchemaNames::resolve("", Some("bad;channel")).expect_err("resolve");
        assert!(matches!(err, ConfigError::InvalidChannel { .. }));
    }

    #[test]
    fn empty_channel_override_is_rejected() {
        let err = SchemaNames::resolve("", Some("")).expect_err("resolve");
        assert!(matches!(err, ConfigError::InvalidChannel { .. }));
    }

    #[test]
    fn raw_table_name_strips_quotes() {
        let names = SchemaNames::resolve("t1_", None).expect("resolve");
        assert_eq!(names.entries_table_raw(), "t1_cache_entries");
    }

    #[test]
    fn identifier_check_accepts_underscore_start() {
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("a1_b2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
    }
}
