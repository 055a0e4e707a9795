//! # Type System for Path Parameters
//!
//! Declared types for dynamic path segments and the coercion applied
//! to captured values once a route has been selected.
//!
//! Coercion never influences route selection: a captured value that
//! does not fit its declared type fails the already-matched route with
//! [`Error::WrongPathParameterType`].

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Declared type of a dynamic segment (`{id:int}`, `{name:string}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// Numeric text, coerced to `i64`
    Int,
    /// Non-numeric text (see [`coerce_segment`] for the strict rule)
    String,
}

impl SegmentType {
    /// Parse type specifier from a route pattern (e.g. "int" from "{id:int}").
    ///
    /// Only `int` and `string` are recognized; anything else leaves the
    /// segment untyped.
    #[must_use]
    pub fn from_specifier(s: &str) -> Option<Self> {
        match s {
            "int" => Some(Self::Int),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::String => "string",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Path parameter value after coercion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Raw or string-typed value
    String(String),
    /// Value of an `int` segment
    Int(i64),
}

impl ParamValue {
    /// Get the value as a string
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
        }
    }

    /// Borrow the text if this is a string value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// Get as i64 if Int variant
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::String(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

/// Whether text reads as a number (integer, decimal or exponent form)
#[must_use]
pub fn is_numeric(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty()
        && trimmed == raw
        && raw.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

fn observed_type(raw: &str) -> &'static str {
    if raw.parse::<i64>().is_ok() {
        "int"
    } else if is_numeric(raw) {
        "float"
    } else {
        "string"
    }
}

/// Coerce one captured value according to its declared type.
///
/// - `int`: must parse as `i64`.
/// - `string`: in strict mode purely numeric text is rejected.
/// - untyped: returned unchanged.
///
/// # Errors
///
/// Returns `Error::WrongPathParameterType` on mismatch.
pub fn coerce_segment(
    raw: &str,
    declared: Option<SegmentType>,
    strict: bool,
) -> Result<ParamValue> {
    match declared {
        None => Ok(ParamValue::String(raw.to_string())),
        Some(SegmentType::Int) => raw.parse::<i64>().map(ParamValue::Int).map_err(|_| {
            Error::WrongPathParameterType {
                value: raw.to_string(),
                expected: SegmentType::Int.to_string(),
                actual: observed_type(raw).to_string(),
            }
        }),
        Some(SegmentType::String) => {
            if strict && is_numeric(raw) {
                return Err(Error::WrongPathParameterType {
                    value: raw.to_string(),
                    expected: SegmentType::String.to_string(),
                    actual: observed_type(raw).to_string(),
                });
            }
            Ok(ParamValue::String(raw.to_string()))
        }
    }
}

/// Coerce the positional dynamic values of a matched route.
///
/// `declared` yields the declared type of each dynamic segment in
/// left-to-right order (static segments excluded); `values` holds the
/// captured text in the same order.
///
/// # Errors
///
/// Returns the first `Error::WrongPathParameterType` encountered.
pub fn coerce_segments<I>(values: &[String], declared: I, strict: bool) -> Result<Vec<ParamValue>>
where
    I: IntoIterator<Item = Option<SegmentType>>,
{
    values
        .iter()
        .zip(declared.into_iter().chain(std::iter::repeat(None)))
        .map(|(raw, ty)| coerce_segment(raw, ty, strict))
        .collect()
}
