use crate::{InternalError, ProviderError};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

pub trait StructuredExt {
    /// Parses the bytes as a JSON object or array. Scalars are not structured
    /// and yield `None`.
    fn as_structured(&self) -> Option<Value>;
}

impl StructuredExt for [u8] {
    fn as_structured(&self) -> Option<Value> {
        match serde_json::from_slice::<Value>(self).ok()? {
            document @ (Value::Object(_) | Value::Array(_)) => Some(document),
            _ => None,
        }
    }
}

pub fn to_pretty_json(document: &Value) -> Result<Vec<u8>, ProviderError> {
    serde_json::to_vec_pretty(document).map_err(|e| {
        InternalError::serialize_error(&format!("Failed to format JSON: {e}"), Some("json"))
    })
}

pub fn to_yaml(document: &Value) -> Result<Vec<u8>, ProviderError> {
    serde_yaml::to_string(&YamlDocument(document))
        .map(String::into_bytes)
        .map_err(|e| {
            InternalError::serialize_error(&format!("Failed to convert JSON to YAML: {e}"), Some("yaml"))
        })
}

/// Feeds a JSON tree to a non JSON serializer. Numbers keep their digits
/// instead of going through the private arbitrary precision token.
struct YamlDocument<'a>(&'a Value);

impl Serialize for YamlDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serialize_number(n, serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => serializer.collect_seq(items.iter().map(YamlDocument)),
            Value::Object(entries) => {
                serializer.collect_map(entries.iter().map(|(k, v)| (k, YamlDocument(v))))
            }
        }
    }
}

fn serialize_number<S: Serializer>(number: &Number, serializer: S) -> Result<S::Ok, S::Error> {
    if let Some(i) = number.as_i64() {
        return serializer.serialize_i64(i);
    }
    if let Some(u) = number.as_u64() {
        return serializer.serialize_u64(u);
    }

    let text = number.to_string();
    if let Ok(i) = text.parse::<i128>() {
        serializer.serialize_i128(i)
    } else if let Ok(u) = text.parse::<u128>() {
        serializer.serialize_u128(u)
    } else {
        serializer.serialize_f64(number.as_f64().unwrap_or(f64::NAN))
    }
}
