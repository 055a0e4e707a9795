//! # Query / Body Parameters
//!
//! Runtime parameter containers and their required parameters.
//!
//! Requirements are either a flat list of keys that must be present, or a
//! nested [`Schema`] of typed fields. Validation stops at the first
//! violation and raises the error variant matching the container's
//! [`ParamSource`].
//!
//! Reading a value through [`Params::get`] never enforces requiredness;
//! only [`Params::validate`] does.

use crate::error::{Error, Result};
use crate::types::is_numeric;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Where a parameter container's data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Query string
    Query,
    /// Decoded request body
    Body,
}

/// Normalized field type names used in schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Integral number
    Int,
    /// Any number
    Float,
    /// Boolean
    Bool,
    /// String
    String,
    /// JSON array
    Array,
    /// JSON object (no declared fields)
    Object,
    /// Any value
    Any,
}

impl FieldType {
    /// Parse a type name, normalizing aliases (`integer`, `double`, `boolean`, ...)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(Self::Int),
            "float" | "double" | "number" => Some(Self::Float),
            "bool" | "boolean" => Some(Self::Bool),
            "string" | "str" => Some(Self::String),
            "array" | "list" => Some(Self::Array),
            "object" | "map" => Some(Self::Object),
            "any" | "mixed" => Some(Self::Any),
            _ => None,
        }
    }

    /// Canonical name for error messages
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    fn accepts(self, value: &Value, source: ParamSource) -> bool {
        if let (ParamSource::Query, Value::String(text)) = (source, value) {
            return self.accepts_text(text);
        }
        match self {
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    // Query values are always text, so scalar types are read from the text itself.
    fn accepts_text(self, text: &str) -> bool {
        match self {
            Self::Int => text.parse::<i64>().is_ok(),
            Self::Float => is_numeric(text),
            Self::Bool => matches!(text, "true" | "false" | "1" | "0"),
            Self::String | Self::Any => true,
            Self::Array | Self::Object => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expected shape of a single schema field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    /// Scalar or opaque value of a given type
    Type {
        /// Declared type
        ty: FieldType,
        /// Absent or `null` values are accepted
        nullable: bool,
    },
    /// Nested object validated against its own schema
    Object(Schema),
}

impl FieldSpec {
    /// Parse a type name such as `"int"` or `"?string"` (nullable)
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for unknown type names.
    pub fn parse(spec: &str) -> Result<Self> {
        let (nullable, name) = match spec.strip_prefix('?') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let ty = FieldType::from_name(name).ok_or_else(|| Error::InvalidConfig {
            key: "schema".to_string(),
            reason: format!("unknown type name '{spec}'"),
        })?;
        Ok(Self::Type { ty, nullable })
    }
}

/// Ordered set of typed fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, FieldSpec)>,
}

impl Schema {
    /// Create an empty schema
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    /// Add a field from a type name (`"int"`, `"?string"`, ...)
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for unknown type names.
    pub fn typed(self, name: impl Into<String>, ty: &str) -> Result<Self> {
        Ok(self.field(name, FieldSpec::parse(ty)?))
    }

    /// Build a schema from a JSON description.
    ///
    /// String values are type names, object values are nested schemas:
    /// `{"user": {"name": "string", "age": "?int"}}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the description is not an object
    /// or contains unknown type names.
    pub fn from_json(description: &Value) -> Result<Self> {
        let Value::Object(map) = description else {
            return Err(Error::InvalidConfig {
                key: "schema".to_string(),
                reason: "schema description must be an object".to_string(),
            });
        };

        let mut schema = Self::new();
        for (name, value) in map {
            let spec = match value {
                Value::String(ty) => FieldSpec::parse(ty)?,
                Value::Object(_) => FieldSpec::Object(Self::from_json(value)?),
                other => {
                    return Err(Error::InvalidConfig {
                        key: name.clone(),
                        reason: format!("unsupported schema entry {other}"),
                    })
                }
            };
            schema.fields.push((name.clone(), spec));
        }
        Ok(schema)
    }

    /// Declared fields in order
    #[must_use]
    pub fn fields(&self) -> &[(String, FieldSpec)] {
        &self.fields
    }

    /// Check if schema has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Required parameters of a container
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Required {
    /// Nothing required
    #[default]
    Nothing,
    /// Every key must be present
    Keys(Vec<String>),
    /// Nested, typed structure
    Schema(Schema),
}

impl Required {
    /// Check if nothing is required
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Nothing => true,
            Self::Keys(keys) => keys.is_empty(),
            Self::Schema(schema) => schema.is_empty(),
        }
    }
}

impl<const N: usize> From<[&str; N]> for Required {
    fn from(keys: [&str; N]) -> Self {
        Self::Keys(keys.iter().map(ToString::to_string).collect())
    }
}

impl From<Vec<&str>> for Required {
    fn from(keys: Vec<&str>) -> Self {
        Self::Keys(keys.into_iter().map(ToString::to_string).collect())
    }
}

impl From<Vec<String>> for Required {
    fn from(keys: Vec<String>) -> Self {
        Self::Keys(keys)
    }
}

impl From<Schema> for Required {
    fn from(schema: Schema) -> Self {
        Self::Schema(schema)
    }
}

/// Parameter container for query or body data
#[derive(Debug, Clone)]
pub struct Params {
    source: ParamSource,
    data: Value,
    required: Required,
}

impl Params {
    /// Create an empty container for the given source
    #[must_use]
    pub fn new(source: ParamSource) -> Self {
        Self {
            source,
            data: Value::Object(Map::new()),
            required: Required::Nothing,
        }
    }

    /// Query container from a decoded query string
    #[must_use]
    pub fn query(data: &HashMap<String, String>) -> Self {
        let map = data
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let mut params = Self::new(ParamSource::Query);
        params.set_data(Value::Object(map));
        params
    }

    /// Body container from a decoded JSON body (`None` gives an empty object)
    #[must_use]
    pub fn body(data: Option<Value>) -> Self {
        let mut params = Self::new(ParamSource::Body);
        if let Some(data) = data {
            params.set_data(data);
        }
        params
    }

    /// Replace the runtime data
    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    /// Replace the required parameters
    pub fn set_required(&mut self, required: Required) {
        self.required = required;
    }

    /// Builder form of [`Params::set_required`]
    #[must_use]
    pub fn with_required(mut self, required: Required) -> Self {
        self.required = required;
        self
    }

    /// Source of this container
    #[must_use]
    pub const fn source(&self) -> ParamSource {
        self.source
    }

    /// Raw data
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Get a value by key, `None` if absent
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a string value by key
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Validate data against the required parameters.
    ///
    /// # Errors
    ///
    /// Returns a missing-parameter error for the first absent key, or a
    /// wrong-type error for the first type mismatch.
    pub fn validate(&self) -> Result<()> {
        match &self.required {
            Required::Nothing => Ok(()),
            Required::Keys(keys) => {
                for key in keys {
                    if self.data.get(key.as_str()).is_none() {
                        return Err(self.missing(key));
                    }
                }
                Ok(())
            }
            Required::Schema(schema) => self.validate_schema(&self.data, schema),
        }
    }

    fn validate_schema(&self, data: &Value, schema: &Schema) -> Result<()> {
        for (key, spec) in schema.fields() {
            let value = data.get(key.as_str());
            match spec {
                FieldSpec::Type { ty, nullable } => match value {
                    None | Some(Value::Null) if *nullable => continue,
                    None => return Err(self.missing(key)),
                    Some(v) if ty.accepts(v, self.source) => {}
                    Some(v) => return Err(self.wrong_type(key, ty.name(), v)),
                },
                FieldSpec::Object(sub) => match value {
                    None => return Err(self.missing(key)),
                    Some(v) if v.is_object() => self.validate_schema(v, sub)?,
                    Some(v) => return Err(self.wrong_type(key, FieldType::Object.name(), v)),
                },
            }
        }
        Ok(())
    }

    fn missing(&self, key: &str) -> Error {
        match self.source {
            ParamSource::Query => Error::MissingQueryParameter(key.to_string()),
            ParamSource::Body => Error::MissingBodyParameter(key.to_string()),
        }
    }

    fn wrong_type(&self, key: &str, expected: &str, value: &Value) -> Error {
        let field = key.to_string();
        let expected = expected.to_string();
        let actual = self.observed_type(value).to_string();
        match self.source {
            ParamSource::Query => Error::WrongQueryParameterType { field, expected, actual },
            ParamSource::Body => Error::WrongObjectPropertyType { field, expected, actual },
        }
    }

    fn observed_type(&self, value: &Value) -> &'static str {
        match value {
            Value::String(text) if self.source == ParamSource::Query => {
                if text.parse::<i64>().is_ok() {
                    "int"
                } else if is_numeric(text) {
                    "float"
                } else {
                    "string"
                }
            }
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_f64() => "float",
            Value::Number(_) => "int",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query_of(pairs: &[(&str, &str)]) -> Params {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Params::query(&map)
    }

    #[test]
    fn test_nothing_required_validates() {
        assert!(Params::body(None).validate().is_ok());
        let params = Params::body(None).with_required(Required::Keys(vec![]));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_flat_required_query_missing() {
        let params = query_of(&[]).with_required(["lang"].into());
        match params.validate() {
            Err(Error::MissingQueryParameter(key)) => assert_eq!(key, "lang"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_flat_required_query_present() {
        let params = query_of(&[("lang", "en")]).with_required(["lang"].into());
        assert!(params.validate().is_ok());
        assert_eq!(params.get_str("lang"), Some("en"));
    }

    #[test]
    fn test_get_undeclared_key_is_none() {
        let params = query_of(&[("lang", "en")]);
        assert!(params.get("page").is_none());
    }

    #[test]
    fn test_flat_required_body_reports_first_missing() {
        let params = Params::body(Some(json!({"info": 1})))
            .with_required(vec!["info", "user", "other"].into());
        match params.validate() {
            Err(Error::MissingBodyParameter(key)) => assert_eq!(key, "user"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    fn user_schema() -> Schema {
        Schema::from_json(&json!({"user": {"name": "string", "age": "int"}})).unwrap()
    }

    #[test]
    fn test_nested_schema_missing_field() {
        let params = Params::body(Some(json!({"user": {"name": "Bob"}})))
            .with_required(user_schema().into());
        match params.validate() {
            Err(Error::MissingBodyParameter(key)) => assert_eq!(key, "age"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_schema_keeps_declaration_order() {
        let schema = Schema::from_json(&json!({"zone": "string", "age": "int", "name": "string"}))
            .unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zone", "age", "name"]);

        let params = Params::body(Some(json!({"user": {}}))).with_required(user_schema().into());
        match params.validate() {
            Err(Error::MissingBodyParameter(key)) => assert_eq!(key, "name"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_nested_schema_wrong_type() {
        let params = Params::body(Some(json!({"user": {"name": "Bob", "age": "thirty"}})))
            .with_required(user_schema().into());
        match params.validate() {
            Err(Error::WrongObjectPropertyType { field, expected, actual }) => {
                assert_eq!(field, "age");
                assert_eq!(expected, "int");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_nested_schema_valid() {
        let params = Params::body(Some(json!({"user": {"name": "Bob", "age": 30}})))
            .with_required(user_schema().into());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_nested_object_not_an_object() {
        let params = Params::body(Some(json!({"user": "Bob"}))).with_required(user_schema().into());
        assert!(matches!(
            params.validate(),
            Err(Error::WrongObjectPropertyType { ref expected, .. }) if expected == "object"
        ));
    }

    #[test]
    fn test_nullable_field_may_be_absent_or_null() {
        let schema = Schema::new().typed("nickname", "?string").unwrap();
        let absent = Params::body(Some(json!({}))).with_required(schema.clone().into());
        assert!(absent.validate().is_ok());
        let null = Params::body(Some(json!({"nickname": null}))).with_required(schema.into());
        assert!(null.validate().is_ok());
    }

    #[test]
    fn test_null_for_non_nullable_is_wrong_type() {
        let schema = Schema::new().typed("name", "string").unwrap();
        let params = Params::body(Some(json!({"name": null}))).with_required(schema.into());
        assert!(matches!(
            params.validate(),
            Err(Error::WrongObjectPropertyType { ref actual, .. }) if actual == "null"
        ));
    }

    #[test]
    fn test_type_aliases_are_normalized() {
        let schema = Schema::from_json(&json!({
            "count": "integer",
            "ratio": "double",
            "active": "boolean",
        }))
        .unwrap();
        let params = Params::body(Some(json!({"count": 3, "ratio": 2, "active": true})))
            .with_required(schema.into());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_query_schema_reads_text() {
        let schema = Schema::new().typed("page", "int").unwrap();
        let ok = query_of(&[("page", "2")]).with_required(schema.clone().into());
        assert!(ok.validate().is_ok());

        let bad = query_of(&[("page", "two")]).with_required(schema.into());
        match bad.validate() {
            Err(Error::WrongQueryParameterType { field, expected, actual }) => {
                assert_eq!(field, "page");
                assert_eq!(expected, "int");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_name_rejected() {
        assert!(FieldSpec::parse("uuid").is_err());
        assert!(Schema::from_json(&json!(["name"])).is_err());
    }
}
