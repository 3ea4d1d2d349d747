//! Field types, coercion and constraints

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value, json};
use strata_core::{Result, StrataError};

use crate::expression::value::{as_float, compare_values, dedup, display};
use crate::model::CompiledModel;

/// `Collection[Item]` declarations
static PARAMETERIZED: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(\w+)\[(\w+)\]$").ok());

/// Split `list[str]` into `("list", "str")`
#[must_use]
pub fn split_parameterized(type_name: &str) -> Option<(&str, &str)> {
    let caps = PARAMETERIZED.as_ref()?.captures(type_name.trim())?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Leaf value types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// `str` / `string`
    Str,
    /// `int` / `integer`
    Int,
    /// `float` / `number`
    Float,
    /// `bool` / `boolean`
    Bool,
    /// `date`, ISO `YYYY-MM-DD`
    Date,
    /// `datetime`, RFC 3339
    DateTime,
    /// `any`, accepted unchanged
    Any,
}

impl ScalarType {
    /// Resolve a type name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "str" | "string" => Self::Str,
            "int" | "integer" => Self::Int,
            "float" | "number" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "any" => Self::Any,
            _ => return None,
        })
    }

    /// Name used by `isinstance` in synthesized validators
    #[must_use]
    pub fn isinstance_name(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Any => "any",
        }
    }

    /// JSON schema fragment
    #[must_use]
    pub fn json_schema(self) -> Value {
        match self {
            Self::Str => json!({"type": "string"}),
            Self::Int => json!({"type": "integer"}),
            Self::Float => json!({"type": "number"}),
            Self::Bool => json!({"type": "boolean"}),
            Self::Date => json!({"type": "string", "format": "date"}),
            Self::DateTime => json!({"type": "string", "format": "date-time"}),
            Self::Any => json!({}),
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Lax coercion of an input value
    ///
    /// # Errors
    ///
    /// Returns the record message when the value cannot be coerced.
    pub fn coerce(self, value: &Value) -> std::result::Result<Value, String> {
        let coerced = match self {
            Self::Any => Some(value.clone()),
            Self::Str => value.is_string().then(|| value.clone()),
            Self::Int => coerce_int(value).map(Value::from),
            Self::Float => coerce_float(value).and_then(Number::from_f64).map(Value::Number),
            Self::Bool => coerce_bool(value).map(Value::Bool),
            Self::Date => value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
            Self::DateTime => value.as_str().and_then(|s| {
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| Value::String(dt.to_rfc3339()))
                    .or_else(|| {
                        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                            .ok()
                            .map(|_| Value::String(s.to_string()))
                    })
            }),
        };
        coerced.ok_or_else(|| {
            match self {
                Self::Int => "Input should be a valid integer",
                Self::Float => "Input should be a valid number",
                Self::Bool => "Input should be a valid boolean",
                Self::Date => "Input should be a valid date in the format YYYY-MM-DD",
                Self::DateTime => "Input should be a valid datetime",
                Self::Str | Self::Any => "Input should be a valid string",
            }
            .to_string()
        })
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.isinstance_name())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.abs() < 9.2e18).then(|| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Resolved type of a field
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Leaf value
    Scalar(ScalarType),
    /// Ordered collection
    List,
    /// Collection with repeated items removed
    Set,
    /// Nested model from a property group
    Model(Arc<CompiledModel>),
}

impl FieldType {
    /// Resolve a bare (non-parameterized) type name
    ///
    /// # Errors
    ///
    /// Returns `StrataError::IncorrectFieldType` for `dict`, `object` and
    /// unknown names.
    pub fn resolve(name: &str) -> Result<Self> {
        let name = name.trim();
        if let Some(scalar) = ScalarType::parse(name) {
            return Ok(Self::Scalar(scalar));
        }
        match name {
            "list" => Ok(Self::List),
            "set" => Ok(Self::Set),
            other => Err(StrataError::incorrect_field_type(other)),
        }
    }

    /// Whether this is `list` or `set`
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List | Self::Set)
    }

    /// Short description for logs and schema output
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(scalar) => scalar.to_string(),
            Self::List => "list".to_string(),
            Self::Set => "set".to_string(),
            Self::Model(model) => model.name().to_string(),
        }
    }

    /// Coerce a value to a scalar or collection type.
    ///
    /// Nested models are handled by the model runtime.
    ///
    /// # Errors
    ///
    /// Returns the record message when the value cannot be coerced.
    pub fn coerce(&self, value: &Value) -> std::result::Result<Value, String> {
        match (self, value) {
            (Self::Scalar(scalar), value) => scalar.coerce(value),
            (Self::List, Value::Array(_)) => Ok(value.clone()),
            (Self::Set, Value::Array(items)) => Ok(Value::Array(dedup(items.clone()))),
            (Self::List, _) => Err("Input should be a valid list".to_string()),
            (Self::Set, _) => Err("Input should be a valid set".to_string()),
            (Self::Model(_), Value::Object(_)) => Ok(value.clone()),
            (Self::Model(_), _) => Err("Input should be a valid dictionary".to_string()),
        }
    }
}

/// A named constraint on a leaf field
#[derive(Debug, Clone)]
pub enum Constraint {
    /// `ge`: value >= bound
    Ge(Value),
    /// `gt`: value > bound
    Gt(Value),
    /// `le`: value <= bound
    Le(Value),
    /// `lt`: value < bound
    Lt(Value),
    /// `multiple_of`
    MultipleOf(Value),
    /// `min_length` on strings or collections
    MinLength(usize),
    /// `max_length` on strings or collections
    MaxLength(usize),
    /// `min_items` on collections
    MinItems(usize),
    /// `max_items` on collections
    MaxItems(usize),
    /// `pattern` on strings
    Pattern(Regex),
}

impl Constraint {
    /// Parse a declared constraint for a field of `field_type`
    ///
    /// # Errors
    ///
    /// Returns the loading message for unknown constraints, bad bounds, or
    /// constraints that do not apply to the type.
    pub fn parse(
        name: &str,
        value: &Value,
        field_type: &FieldType,
    ) -> std::result::Result<Self, String> {
        let numeric = matches!(field_type, FieldType::Scalar(s) if s.is_numeric());
        let sized = matches!(
            field_type,
            FieldType::Scalar(ScalarType::Str) | FieldType::List | FieldType::Set
        );
        let applies = |ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(format!(
                    "Constraint '{name}' does not apply to type {}",
                    field_type.describe()
                ))
            }
        };
        let bound = || {
            if value.is_number() {
                Ok(value.clone())
            } else {
                Err(format!("Constraint '{name}' expects a number, got {}", display(value)))
            }
        };
        let length = || {
            value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    format!(
                        "Constraint '{name}' expects a non-negative integer, got {}",
                        display(value)
                    )
                })
        };

        match name {
            "ge" => applies(numeric).and_then(|()| bound().map(Self::Ge)),
            "gt" => applies(numeric).and_then(|()| bound().map(Self::Gt)),
            "le" => applies(numeric).and_then(|()| bound().map(Self::Le)),
            "lt" => applies(numeric).and_then(|()| bound().map(Self::Lt)),
            "multiple_of" => {
                applies(numeric)?;
                let bound = bound()?;
                if as_float(&bound) == Some(0.0) {
                    return Err("Constraint 'multiple_of' must not be zero".to_string());
                }
                Ok(Self::MultipleOf(bound))
            }
            "min_length" => applies(sized).and_then(|()| length().map(Self::MinLength)),
            "max_length" => applies(sized).and_then(|()| length().map(Self::MaxLength)),
            "min_items" => {
                applies(field_type.is_collection()).and_then(|()| length().map(Self::MinItems))
            }
            "max_items" => {
                applies(field_type.is_collection()).and_then(|()| length().map(Self::MaxItems))
            }
            "pattern" => {
                applies(matches!(field_type, FieldType::Scalar(ScalarType::Str)))?;
                let pattern = value
                    .as_str()
                    .ok_or_else(|| "Constraint 'pattern' expects a string".to_string())?;
                Regex::new(pattern)
                    .map(Self::Pattern)
                    .map_err(|e| format!("Invalid pattern '{pattern}': {e}"))
            }
            other => Err(format!("Unknown constraint '{other}'")),
        }
    }

    /// Declared name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ge(_) => "ge",
            Self::Gt(_) => "gt",
            Self::Le(_) => "le",
            Self::Lt(_) => "lt",
            Self::MultipleOf(_) => "multiple_of",
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::MinItems(_) => "min_items",
            Self::MaxItems(_) => "max_items",
            Self::Pattern(_) => "pattern",
        }
    }

    /// Check a coerced value
    ///
    /// # Errors
    ///
    /// Returns the record message when the value violates the constraint.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        let size = match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        };
        let noun = if value.is_string() { "String" } else { "List" };
        let unit = if value.is_string() { "characters" } else { "items" };
        let ordered = |bound: &Value, accept: fn(std::cmp::Ordering) -> bool| {
            compare_values(value, bound).is_some_and(accept)
        };

        let (ok, message) = match self {
            Self::Ge(b) => (
                ordered(b, std::cmp::Ordering::is_ge),
                format!("Input should be greater than or equal to {}", display(b)),
            ),
            Self::Gt(b) => (
                ordered(b, std::cmp::Ordering::is_gt),
                format!("Input should be greater than {}", display(b)),
            ),
            Self::Le(b) => (
                ordered(b, std::cmp::Ordering::is_le),
                format!("Input should be less than or equal to {}", display(b)),
            ),
            Self::Lt(b) => (
                ordered(b, std::cmp::Ordering::is_lt),
                format!("Input should be less than {}", display(b)),
            ),
            Self::MultipleOf(b) => (
                is_multiple(value, b),
                format!("Input should be a multiple of {}", display(b)),
            ),
            Self::MinLength(n) | Self::MinItems(n) => (
                size.is_some_and(|len| len >= *n),
                format!("{noun} should have at least {n} {unit}"),
            ),
            Self::MaxLength(n) | Self::MaxItems(n) => (
                size.is_some_and(|len| len <= *n),
                format!("{noun} should have at most {n} {unit}"),
            ),
            Self::Pattern(re) => (
                value.as_str().is_some_and(|s| re.is_match(s)),
                format!("String should match pattern '{}'", re.as_str()),
            ),
        };
        if ok { Ok(()) } else { Err(message) }
    }

    /// Add the matching JSON schema keyword to `schema`
    pub fn annotate(&self, schema: &mut serde_json::Map<String, Value>, field_type: &FieldType) {
        let collection = field_type.is_collection();
        let (keyword, value) = match self {
            Self::Ge(b) => ("minimum", b.clone()),
            Self::Gt(b) => ("exclusiveMinimum", b.clone()),
            Self::Le(b) => ("maximum", b.clone()),
            Self::Lt(b) => ("exclusiveMaximum", b.clone()),
            Self::MultipleOf(b) => ("multipleOf", b.clone()),
            Self::MinLength(n) if collection => ("minItems", json!(n)),
            Self::MaxLength(n) if collection => ("maxItems", json!(n)),
            Self::MinLength(n) => ("minLength", json!(n)),
            Self::MaxLength(n) => ("maxLength", json!(n)),
            Self::MinItems(n) => ("minItems", json!(n)),
            Self::MaxItems(n) => ("maxItems", json!(n)),
            Self::Pattern(re) => ("pattern", json!(re.as_str())),
        };
        schema.insert(keyword.to_string(), value);
    }
}

fn is_multiple(value: &Value, bound: &Value) -> bool {
    match (value.as_i64(), bound.as_i64()) {
        (Some(v), Some(b)) if b != 0 => v.wrapping_rem(b) == 0,
        _ => match (as_float(value), as_float(bound)) {
            (Some(v), Some(b)) if b != 0.0 => {
                let ratio = v / b;
                (ratio - ratio.round()).abs() < 1e-9
            }
            _ => false,
        },
    }
}
