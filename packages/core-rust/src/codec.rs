//! JSON value codec for cache payloads.
//!
//! The authoritative store persists values as opaque bytes; the canonical
//! byte form is UTF-8 JSON. [`encode`] / [`decode`] are the symmetric pair
//! used at the store boundary. [`to_value`] / [`from_value`] materialize
//! payloads as [`serde_json::Value`] trees for the local tier, so a local
//! hit never re-parses bytes.
//!
//! Round-trip law: `decode(encode(v)) == v` for every value in the
//! JSON-representable domain (objects, arrays, strings, IEEE-754 doubles,
//! booleans, null).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Errors from encoding or decoding cache payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value could not be represented in the canonical JSON form.
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),
    /// The stored bytes could not be parsed back into the requested type.
    #[error("failed to decode value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Serializes a value into its canonical JSON byte form.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] for values outside the representable
/// domain (e.g. maps with non-string keys).
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::Encode)
}

/// Deserializes a value from its canonical JSON byte form.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not valid JSON or do
/// not match the shape of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

/// Materializes a serializable value as a JSON tree.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] for values outside the representable
/// domain.
pub fn to_value<T: Serialize>(value: &T) -> Result<Value, CodecError> {
    serde_json::to_value(value).map_err(CodecError::Encode)
}

/// Converts a materialized JSON tree back into a typed value.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the tree does not match the shape
/// of `T`.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(CodecError::Decode)
}
