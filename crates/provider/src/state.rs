//! Resource state handling
//!
//! Resource state is exchanged as a JSON object of attributes. A `null`
//! value (or an absent document) means the resource does not exist.

use serde_json::Value;

use contabo_common::{Error, Result};

/// Decode attribute state from JSON bytes
pub fn decode_state(data: &[u8]) -> Result<Value> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_slice(data)?;
    match value {
        Value::Null | Value::Object(_) => Ok(value),
        other => Err(Error::invalid_attribute(
            "state",
            format!("expected an attribute object, found {}", type_name(&other)),
        )),
    }
}

/// Whether the state describes no resource
pub fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Remote (or composite) identifier recorded in the state
pub fn resource_id(value: &Value) -> Result<String> {
    let id = match value.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if id.is_empty() {
        return Err(Error::invalid_attribute("id", "state has no resource id"));
    }
    Ok(id)
}

/// Attribute values that mean "not set": null, empty strings, empty lists
/// and zero numbers. Booleans are always considered set.
pub fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(_) | Value::Object(_) => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_state() {
        assert_eq!(decode_state(b"").unwrap(), Value::Null);
        assert_eq!(decode_state(b"null").unwrap(), Value::Null);
        assert_eq!(decode_state(br#"{"id":"1"}"#).unwrap(), json!({ "id": "1" }));
        assert!(decode_state(b"[1,2]").is_err());
        assert!(decode_state(b"{").is_err());
    }

    #[test]
    fn test_resource_id() {
        assert_eq!(resource_id(&json!({ "id": "abc" })).unwrap(), "abc");
        assert_eq!(resource_id(&json!({ "id": 100 })).unwrap(), "100");
        assert!(resource_id(&json!({ "id": "" })).is_err());
        assert!(resource_id(&json!({})).is_err());
    }

    #[test]
    fn test_is_unset() {
        assert!(is_unset(&json!(null)));
        assert!(is_unset(&json!("")));
        assert!(is_unset(&json!([])));
        assert!(is_unset(&json!(0)));
        assert!(!is_unset(&json!(false)));
        assert!(!is_unset(&json!("x")));
        assert!(!is_unset(&json!(0.5)));
    }
}
