use crate::{InternalError, ProviderError};
use serde_json::{Map, Number, Value};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

/// A value read from a remote environment.
///
/// The variants are closed over the shapes an environment can hold. Anything
/// the provider has no byte encoding for lands in [`RawValue::Unsupported`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
    Sequence(Vec<RawValue>),
    Mapping(BTreeMap<String, RawValue>),
    Unsupported { kind: String },
}

impl RawValue {
    pub fn unsupported(kind: impl Into<String>) -> Self {
        RawValue::Unsupported { kind: kind.into() }
    }

    pub fn kind(&self) -> &str {
        match self {
            RawValue::String(_) => "string",
            RawValue::Number(_) => "number",
            RawValue::Bool(_) => "bool",
            RawValue::Null => "null",
            RawValue::Sequence(_) => "sequence",
            RawValue::Mapping(_) => "mapping",
            RawValue::Unsupported { kind } => kind,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts back into a JSON tree, failing on the first unsupported
    /// value found anywhere in the structure.
    pub fn to_json(&self) -> Result<Value, ProviderError> {
        Ok(match self {
            RawValue::String(s) => Value::String(s.clone()),
            RawValue::Number(n) => Value::Number(n.clone()),
            RawValue::Bool(b) => Value::Bool(*b),
            RawValue::Null => Value::Null,
            RawValue::Sequence(items) => Value::Array(
                items
                    .iter()
                    .map(RawValue::to_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            RawValue::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Result<Map<_, _>, _>>()?,
            ),
            RawValue::Unsupported { kind } => {
                return Err(InternalError::unsupported_value_type(kind, None))
            }
        })
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => RawValue::Number(n),
            Value::String(s) => RawValue::String(s),
            Value::Array(items) => RawValue::Sequence(items.into_iter().map(Into::into).collect()),
            Value::Object(entries) => {
                RawValue::Mapping(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl Display for RawValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.kind())
    }
}
