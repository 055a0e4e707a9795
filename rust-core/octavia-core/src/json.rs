//! # JSON Codec
//!
//! Request bodies are parsed with simd-json; output is serialized with
//! serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON string into a typed value using simd-json
///
/// # Errors
///
/// Returns `Error::InvalidBody` if parsing fails
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse JSON bytes in place using simd-json
///
/// simd-json rewrites the buffer while parsing, hence `&mut`.
///
/// # Errors
///
/// Returns `Error::InvalidBody` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::InvalidBody(e.to_string()))
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be represented as JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
