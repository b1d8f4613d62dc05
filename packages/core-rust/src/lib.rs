//! `pgcache` Core -- value codec, invalidation events, schema names, and settings.
//!
//! This crate provides the runtime-free foundation layer for the `pgcache`
//! client:
//!
//! - **Codec** ([`codec`]): canonical JSON byte form for cache payloads
//! - **Events** ([`events`]): `InvalidationEvent` wire schema for the notification channel
//! - **Schema** ([`schema`]): `SchemaNames` resolver for prefixed identifiers
//! - **Settings** ([`settings`]): `CacheSettings` and configuration validation
//! - **Hash** ([`hash`]): FNV-1a utility for migration advisory-lock keys

pub mod codec;
pub mod events;
pub mod hash;
pub mod schema;
pub mod settings;

// Codec
pub use codec::{decode, encode, from_value, to_value, CodecError};

// Events
pub use events::{EventOp, InvalidationEvent};

// Schema
pub use schema::{is_valid_identifier, SchemaNames};

// Settings
pub use settings::{CacheSettings, ConfigError};

// Hash
pub use hash::fnv1a_hash;
