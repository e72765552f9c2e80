use crate::{InternalError, ProviderError, RawValue};
use serde_json::Number;

/// Canonical byte encoding of a remote value, as written into a mounted file.
pub trait ToBytesExt {
    fn to_bytes(&self) -> Result<Vec<u8>, ProviderError>;
}

impl ToBytesExt for RawValue {
    fn to_bytes(&self) -> Result<Vec<u8>, ProviderError> {
        match self {
            RawValue::String(s) => Ok(s.as_bytes().to_vec()),
            RawValue::Mapping(_) => to_json_bytes(self),
            RawValue::Sequence(items) if is_string_sequence(items) => Ok(items
                .iter()
                .filter_map(RawValue::as_str)
                .collect::<Vec<_>>()
                .join("\n")
                .into_bytes()),
            RawValue::Sequence(_) => to_json_bytes(self),
            RawValue::Bool(b) => Ok(b.to_string().into_bytes()),
            RawValue::Number(n) => Ok(number_to_string(n).into_bytes()),
            RawValue::Null => Ok(Vec::new()),
            RawValue::Unsupported { kind } => Err(InternalError::unsupported_value_type(kind, None)),
        }
    }
}

fn is_string_sequence(items: &[RawValue]) -> bool {
    !items.is_empty() && items.iter().all(|item| matches!(item, RawValue::String(_)))
}

fn to_json_bytes(value: &RawValue) -> Result<Vec<u8>, ProviderError> {
    serde_json::to_vec(&value.to_json()?).map_err(|e| {
        InternalError::serialize_error(
            &format!("Failed to serialize {} value: {e}", value.kind()),
            None,
        )
    })
}

/// Integers keep their exact digits; floats use the shortest decimal that
/// round-trips, never in exponent form.
fn number_to_string(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        i.to_string()
    } else if let Some(u) = number.as_u64() {
        u.to_string()
    } else {
        let text = number.to_string();
        if text
            .strip_prefix('-')
            .unwrap_or(&text)
            .bytes()
            .all(|b| b.is_ascii_digit())
        {
            return text;
        }
        number
            .as_f64()
            .map(|f| format!("{f}"))
            .unwrap_or(text)
    }
}
