//! Helpers for treating `serde_json::Value` as a dynamic value

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use super::error::EvaluationError;

/// Truthiness: null, false, zero, and empty strings or containers are falsy
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Equality with integers and floats compared numerically
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(l), Some(r)) => l == r,
            _ => l.as_f64() == r.as_f64(),
        },
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(k, v)| r.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => left == right,
    }
}

/// Ordering for numbers, strings, booleans and sequences of those
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(l), Some(r)) => Some(l.cmp(&r)),
            _ => l.as_f64()?.partial_cmp(&r.as_f64()?),
        },
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Array(l), Value::Array(r)) => {
            for (a, b) in l.iter().zip(r) {
                match compare_values(a, b)? {
                    Ordering::Equal => {}
                    other => return Some(other),
                }
            }
            Some(l.len().cmp(&r.len()))
        }
        _ => None,
    }
}

/// Short type name used in error messages
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Build a float value, refusing NaN and infinities
///
/// # Errors
///
/// Returns `EvaluationError::NumericOverflow` for non-finite input.
pub fn float_value(value: f64) -> Result<Value, EvaluationError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(EvaluationError::NumericOverflow)
}

/// Integer view of a number that has no fractional part
#[must_use]
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Float view of any number
#[must_use]
pub fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Items of an iterable value: list elements, string characters or mapping keys
#[must_use]
pub fn iterate(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => Some(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Object(map) => Some(map.keys().cloned().map(Value::String).collect()),
        _ => None,
    }
}

/// Remove repeated items, keeping first occurrences
#[must_use]
pub fn dedup(items: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.iter().any(|seen| values_equal(seen, &item)) {
            unique.push(item);
        }
    }
    unique
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Text form used by `str()` and by raised messages
#[must_use]
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr(other),
    }
}

/// Quoted form used inside containers
#[must_use]
pub fn repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map_or_else(|| n.to_string(), format_float),
        },
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(repr).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{k}': {}", repr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Whether a string is an ISO calendar date
#[must_use]
pub fn is_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

/// Whether a string is an RFC 3339 or naive ISO date-time
#[must_use]
pub fn is_datetime(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

/// `isinstance`-style check against a type name; `None` for unknown names
#[must_use]
pub fn matches_type(value: &Value, type_name: &str) -> Option<bool> {
    let matched = match type_name {
        "any" | "object" => true,
        "str" | "string" => value.is_string(),
        "int" | "integer" => value.is_i64() || value.is_u64(),
        "float" => value.is_f64(),
        "number" => value.is_number(),
        "bool" | "boolean" => value.is_boolean(),
        "list" | "set" | "tuple" => value.is_array(),
        "dict" => value.is_object(),
        "None" | "NoneType" => value.is_null(),
        "date" => value.as_str().is_some_and(is_date),
        "datetime" => value.as_str().is_some_and(is_datetime),
        _ => return None,
    };
    Some(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(-1), json!("x"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn test_numeric_equality_and_ordering() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!([1, "a"]), &json!([1.0, "a"])));
        assert!(!values_equal(&json!("1"), &json!(1)));
        assert_eq!(compare_values(&json!(2), &json!(10.5)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("b"), &json!(1)), None);
    }

    #[test]
    fn test_display_and_repr() {
        assert_eq!(display(&json!("plain")), "plain");
        assert_eq!(display(&json!(1000.0)), "1000.0");
        assert_eq!(display(&json!(30)), "30");
        assert_eq!(display(&json!([1, "a", null, true])), "[1, 'a', None, True]");
        assert_eq!(display(&json!({"k": 2.5})), "{'k': 2.5}");
    }

    #[test]
    fn test_matches_type() {
        assert_eq!(matches_type(&json!("x"), "str"), Some(true));
        assert_eq!(matches_type(&json!(1), "float"), Some(false));
        assert_eq!(matches_type(&json!(1.5), "number"), Some(true));
        assert_eq!(matches_type(&json!("2024-02-29"), "date"), Some(true));
        assert_eq!(matches_type(&json!("2024-02-30"), "date"), Some(false));
        assert_eq!(matches_type(&json!("2024-01-01T10:00:00Z"), "datetime"), Some(true));
        assert_eq!(matches_type(&json!(1), "complex"), None);
    }

    #[test]
    fn test_dedup_keeps_first() {
        assert_eq!(dedup(vec![json!(1), json!(2), json!(1.0), json!(3)]), vec![json!(1), json!(2), json!(3)]);
    }
}
