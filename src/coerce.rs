//! Scalar Coercion - Total Functions Over Loose Input
//!
//! Nothing in here fails. Absent, empty or malformed values collapse to
//! the caller's default.

use serde_json::Value;

/// Coerce a loose value to a number, falling back to `default`.
///
/// Numbers pass through, strings are trimmed and parsed, booleans map to
/// 1/0 and everything else (absent, null, `""`, arrays, objects,
/// unparseable text) yields `default`.
pub fn coerce_number(value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(default),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return default;
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .unwrap_or(default)
        }
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => default,
    }
}

/// Coerce a loose value to a trimmed string, falling back to `default`
/// when absent or null.
pub fn coerce_string(value: Option<&Value>, default: &str) -> String {
    match value {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Loose truthiness: absent, null, `false`, zero, `""`, `[]` and `{}` are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Return the first truthy field among `aliases`, in priority order.
pub fn first_alias<'a>(object: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .map(|key| object.get(*key))
        .find(|candidate| is_truthy(*candidate))
        .flatten()
}

/// Resolve a numeric field through an ordered alias list.
pub fn alias_number(object: &Value, aliases: &[&str]) -> f64 {
    coerce_number(first_alias(object, aliases), 0.0)
}

/// Resolve a string field through an ordered alias list. Returns `None`
/// when no alias carries a value or the trimmed result is empty.
pub fn alias_string(object: &Value, aliases: &[&str]) -> Option<String> {
    first_alias(object, aliases)
        .map(|v| coerce_string(Some(v), ""))
        .filter(|s| !s.is_empty())
}

/// Iterate a field as an array, treating anything else as empty.
pub fn array_field<'a>(object: &'a Value, key: &str) -> &'a [Value] {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_defaults() {
        assert_eq!(coerce_number(None, 0.0), 0.0);
        assert_eq!(coerce_number(Some(&json!(null)), 7.0), 7.0);
        assert_eq!(coerce_number(Some(&json!("")), 3.0), 3.0);
        assert_eq!(coerce_number(Some(&json!("abc")), 0.0), 0.0);
        assert_eq!(coerce_number(Some(&json!({"a": 1})), 0.0), 0.0);
    }

    #[test]
    fn test_number_parses() {
        assert_eq!(coerce_number(Some(&json!(12.5)), 0.0), 12.5);
        assert_eq!(coerce_number(Some(&json!(" 5000 ")), 0.0), 5000.0);
        assert_eq!(coerce_number(Some(&json!(true)), 0.0), 1.0);
    }

    #[test]
    fn test_string_trims() {
        assert_eq!(coerce_string(Some(&json!("  hi ")), ""), "hi");
        assert_eq!(coerce_string(Some(&json!(55)), ""), "55");
        assert_eq!(coerce_string(None, "fallback"), "fallback");
        assert_eq!(coerce_string(Some(&json!(null)), "x"), "x");
    }

    #[test]
    fn test_alias_skips_falsy() {
        let entry = json!({"totalAmount": 0, "headerTotal": "", "total": 900});
        assert_eq!(alias_number(&entry, &["totalAmount", "headerTotal", "total"]), 900.0);

        let entry = json!({"finalAmount": 10, "totalAmount": 20});
        assert_eq!(alias_number(&entry, &["finalAmount", "totalAmount"]), 10.0);

        assert_eq!(alias_number(&json!({}), &["price"]), 0.0);
    }

    #[test]
    fn test_array_field_tolerates_wrong_types() {
        assert!(array_field(&json!({"services": "nope"}), "services").is_empty());
        assert_eq!(array_field(&json!({"services": [1, 2]}), "services").len(), 2);
        assert!(array_field(&json!(null), "services").is_empty());
    }
}
