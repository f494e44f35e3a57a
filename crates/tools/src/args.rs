//! Argument helpers shared by the commerce tools.

use cartloop_core::error::ToolError;
use serde_json::Value;

pub const DEFAULT_LIST_LIMIT: u32 = 10;
const MAX_LIST_LIMIT: u32 = 100;

pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    match args.get(key).and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ToolError::InvalidArguments(format!(
            "Missing '{key}' argument"
        ))),
    }
}

pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `limit`, clamped to 1..=100.
pub fn limit(args: &Value) -> Result<u32, ToolError> {
    match args.get("limit") {
        None | Some(Value::Null) => Ok(DEFAULT_LIST_LIMIT),
        Some(v) => v
            .as_u64()
            .map(|n| n.clamp(1, MAX_LIST_LIMIT as u64) as u32)
            .ok_or_else(|| ToolError::InvalidArguments("'limit' must be a positive integer".into())),
    }
}

/// `quantity`, defaulting to 1. Zero is rejected.
pub fn quantity(args: &Value) -> Result<u32, ToolError> {
    match args.get("quantity") {
        None | Some(Value::Null) => Ok(1),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 && n <= u32::MAX as u64 => Ok(n as u32),
            _ => Err(ToolError::InvalidArguments(
                "'quantity' must be a positive integer".into(),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(limit(&json!({})).unwrap(), 10);
        assert_eq!(limit(&json!({"limit": 0})).unwrap(), 1);
        assert_eq!(limit(&json!({"limit": 500})).unwrap(), 100);
        assert!(limit(&json!({"limit": "ten"})).is_err());
    }

    #[test]
    fn quantity_rejects_zero() {
        assert_eq!(quantity(&json!({})).unwrap(), 1);
        assert_eq!(quantity(&json!({"quantity": 3})).unwrap(), 3);
        assert!(quantity(&json!({"quantity": 0})).is_err());
        assert!(quantity(&json!({"quantity": -2})).is_err());
    }

    #[test]
    fn blank_strings_are_missing() {
        assert!(required_str(&json!({"name": "  "}), "name").is_err());
        assert_eq!(required_str(&json!({"name": " Tripod "}), "name").unwrap(), "Tripod");
        assert_eq!(optional_str(&json!({"d": ""}), "d"), None);
    }
}
