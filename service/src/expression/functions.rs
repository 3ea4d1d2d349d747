//! Built-in functions for validator expressions
//!
//! Method calls are routed here too: `name.startswith('A')` calls
//! `startswith(name, 'A')`.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde_json::Value;

use super::value::{
    as_float, as_integer, compare_values, dedup, display, float_value, is_truthy, iterate,
    matches_type, type_name, values_equal,
};

/// Error type for function calls
#[derive(Debug)]
pub struct FunctionError {
    pub message: String,
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FunctionError {}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn wrong_arity(name: &str, expected: &str, actual: usize) -> Self {
        Self {
            message: format!("Function '{name}' expects {expected} arguments, got {actual}"),
        }
    }

    pub fn invalid_argument(name: &str, message: impl Into<String>) -> Self {
        Self {
            message: format!(
                "Invalid argument for function '{}': {}",
                name,
                message.into()
            ),
        }
    }
}

type Handler = dyn Fn(Vec<Value>) -> Result<Value, FunctionError> + Send + Sync;

/// Function signature trait
pub trait BuiltinFunction: Send + Sync {
    /// Function name
    fn name(&self) -> &str;

    /// Validate argument count
    ///
    /// # Errors
    ///
    /// Returns an error if the number of arguments is invalid for this function
    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError>;

    /// Execute the function
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are unusable
    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError>;
}

/// Function defined by a closure and an arity range
pub struct CustomFunction {
    name: String,
    min_args: usize,
    max_args: Option<usize>,
    handler: Box<Handler>,
}

impl CustomFunction {
    /// Create a new custom function
    pub fn new(
        name: impl Into<String>,
        min_args: usize,
        max_args: Option<usize>,
        handler: impl Fn(Vec<Value>) -> Result<Value, FunctionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            handler: Box::new(handler),
        }
    }
}

impl BuiltinFunction for CustomFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() < self.min_args {
            return Err(FunctionError::wrong_arity(
                &self.name,
                &format!("at least {}", self.min_args),
                args.len(),
            ));
        }
        if let Some(max) = self.max_args
            && args.len() > max
        {
            return Err(FunctionError::wrong_arity(
                &self.name,
                &format!("at most {max}"),
                args.len(),
            ));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        (self.handler)(args)
    }
}

/// Registry of callable functions
pub struct FunctionRegistry {
    functions: HashMap<String, Box<dyn BuiltinFunction>>,
    /// Whether the registry refuses further registrations
    locked: bool,
}

impl FunctionRegistry {
    /// Create a new function registry with all built-in functions
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
            locked: false,
        };

        registry.register(Box::new(LenFunction));
        registry.register(Box::new(IsInstanceFunction));
        registry.register(Box::new(MatchesFunction));
        registry.register(Box::new(ContainsFunction));
        registry.register(Box::new(ExtremumFunction::Min));
        registry.register(Box::new(ExtremumFunction::Max));

        for function in collection_functions()
            .into_iter()
            .chain(conversion_functions())
            .chain(string_functions())
        {
            registry.register(Box::new(function));
        }

        registry
    }

    /// Create a locked registry holding only the built-ins
    #[must_use]
    pub fn new_restricted() -> Self {
        let mut registry = Self::new();
        registry.locked = true;
        registry
    }

    /// Lock the registry to prevent further registrations
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Check if the registry is locked
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn register(&mut self, function: Box<dyn BuiltinFunction>) {
        if self.locked {
            return;
        }
        self.functions.insert(function.name().to_string(), function);
    }

    /// Register a custom function
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is locked
    pub fn register_custom(&mut self, function: CustomFunction) -> Result<(), FunctionError> {
        if self.locked {
            return Err(FunctionError::new("Function registry is locked"));
        }
        self.register(Box::new(function));
        Ok(())
    }

    /// Call a function by name
    ///
    /// # Errors
    ///
    /// Returns an error if the function is not found, argument count is incorrect,
    /// or the function execution fails
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, FunctionError> {
        match self.functions.get(name) {
            Some(function) => {
                function.validate_arity(&args)?;
                function.call(args)
            }
            None => Err(FunctionError::new(format!("Unknown function: {name}"))),
        }
    }

    /// Check if a function exists
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Get list of registered function names
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.function_names();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .field("locked", &self.locked)
            .finish()
    }
}

/// `len()` - number of characters, items or keys
struct LenFunction;

impl BuiltinFunction for LenFunction {
    fn name(&self) -> &'static str {
        "len"
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() != 1 {
            return Err(FunctionError::wrong_arity(self.name(), "1", args.len()));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let len = match &args[0] {
            Value::String(s) => s.chars().count(),
            Value::Array(arr) => arr.len(),
            Value::Object(obj) => obj.len(),
            other => {
                return Err(FunctionError::invalid_argument(
                    self.name(),
                    format!("object of type '{}' has no len()", type_name(other)),
                ));
            }
        };
        Ok(Value::from(len))
    }
}

/// `isinstance(value, type_name)`; the type may also be a list of names.
///
/// The evaluator passes bare type identifiers (`str`, `int`, ...) as strings.
struct IsInstanceFunction;

impl BuiltinFunction for IsInstanceFunction {
    fn name(&self) -> &'static str {
        "isinstance"
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() != 2 {
            return Err(FunctionError::wrong_arity(self.name(), "2", args.len()));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let check = |name: &Value| match name {
            Value::String(type_name) => matches_type(&args[0], type_name).ok_or_else(|| {
                FunctionError::invalid_argument(self.name(), format!("unknown type '{type_name}'"))
            }),
            _ => Err(FunctionError::invalid_argument(
                self.name(),
                "second argument must be a type",
            )),
        };
        let matched = match &args[1] {
            Value::Array(names) => {
                let mut any = false;
                for name in names {
                    any |= check(name)?;
                }
                any
            }
            other => check(other)?,
        };
        Ok(Value::Bool(matched))
    }
}

/// `matches(text, pattern)` - regex search
struct MatchesFunction;

impl BuiltinFunction for MatchesFunction {
    fn name(&self) -> &'static str {
        "matches"
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() != 2 {
            return Err(FunctionError::wrong_arity(self.name(), "2", args.len()));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let Value::String(text) = &args[0] else {
            return Err(FunctionError::invalid_argument(
                self.name(),
                "first argument must be a string",
            ));
        };

        let Value::String(pattern) = &args[1] else {
            return Err(FunctionError::invalid_argument(
                self.name(),
                "second argument must be a string pattern",
            ));
        };

        let regex = Regex::new(pattern)
            .map_err(|e| FunctionError::invalid_argument(self.name(), e.to_string()))?;
        Ok(Value::Bool(regex.is_match(text)))
    }
}

/// `contains()` - substring, item or key membership
struct ContainsFunction;

impl BuiltinFunction for ContainsFunction {
    fn name(&self) -> &'static str {
        "contains"
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.len() != 2 {
            return Err(FunctionError::wrong_arity(self.name(), "2", args.len()));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        contains(&args[0], &args[1])
            .map(Value::Bool)
            .ok_or_else(|| {
                FunctionError::invalid_argument(self.name(), "invalid argument types for contains")
            })
    }
}

/// Membership test shared by `contains()` and the `in` operator
#[must_use]
pub fn contains(container: &Value, item: &Value) -> Option<bool> {
    match (container, item) {
        (Value::String(haystack), Value::String(needle)) => Some(haystack.contains(needle.as_str())),
        (Value::Array(arr), item) => Some(arr.iter().any(|v| values_equal(v, item))),
        (Value::Object(obj), Value::String(key)) => Some(obj.contains_key(key)),
        _ => None,
    }
}

/// `min()` / `max()` over arguments or over a single iterable
enum ExtremumFunction {
    Min,
    Max,
}

impl BuiltinFunction for ExtremumFunction {
    fn name(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    fn validate_arity(&self, args: &[Value]) -> Result<(), FunctionError> {
        if args.is_empty() {
            return Err(FunctionError::wrong_arity(
                self.name(),
                "at least 1",
                args.len(),
            ));
        }
        Ok(())
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        let items = match args.as_slice() {
            [single] => iterate(single).ok_or_else(|| {
                FunctionError::invalid_argument(self.name(), "argument is not iterable")
            })?,
            _ => args,
        };

        let mut best: Option<Value> = None;
        for item in items {
            best = Some(match best {
                None => item,
                Some(current) => {
                    let ordering = compare_values(&item, &current).ok_or_else(|| {
                        FunctionError::invalid_argument(
                            self.name(),
                            format!(
                                "cannot compare {} and {}",
                                type_name(&item),
                                type_name(&current)
                            ),
                        )
                    })?;
                    let replace = match self {
                        Self::Min => ordering.is_lt(),
                        Self::Max => ordering.is_gt(),
                    };
                    if replace { item } else { current }
                }
            });
        }
        best.ok_or_else(|| FunctionError::invalid_argument(self.name(), "empty sequence"))
    }
}

fn iterable_arg(name: &str, value: &Value) -> Result<Vec<Value>, FunctionError> {
    iterate(value).ok_or_else(|| {
        FunctionError::invalid_argument(
            name,
            format!("'{}' object is not iterable", type_name(value)),
        )
    })
}

fn string_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str, FunctionError> {
    value.as_str().ok_or_else(|| {
        FunctionError::invalid_argument(
            name,
            format!("expected str, got {}", type_name(value)),
        )
    })
}

fn collection_functions() -> Vec<CustomFunction> {
    vec![
        CustomFunction::new("sum", 1, Some(2), |args| {
            let mut int_total: i64 = args.get(1).and_then(as_integer).unwrap_or(0);
            let mut float_total: Option<f64> = args.get(1).filter(|v| v.is_f64()).and_then(as_float);
            for item in iterable_arg("sum", &args[0])? {
                match (float_total, as_integer(&item)) {
                    (None, Some(i)) if item.is_number() => {
                        int_total = int_total.checked_add(i).ok_or_else(|| {
                            FunctionError::invalid_argument("sum", "integer overflow")
                        })?;
                    }
                    _ => {
                        let f = as_float(&item).ok_or_else(|| {
                            FunctionError::invalid_argument("sum", "all items must be numbers")
                        })?;
                        #[allow(clippy::cast_precision_loss)]
                        let base = float_total.unwrap_or(int_total as f64);
                        float_total = Some(base + f);
                    }
                }
            }
            match float_total {
                Some(f) => float_value(f).map_err(|e| FunctionError::new(e.to_string())),
                None => Ok(Value::from(int_total)),
            }
        }),
        CustomFunction::new("abs", 1, Some(1), |args| match &args[0] {
            Value::Number(n) if n.is_i64() => n
                .as_i64()
                .and_then(i64::checked_abs)
                .map(Value::from)
                .ok_or_else(|| FunctionError::invalid_argument("abs", "integer overflow")),
            Value::Number(n) => float_value(n.as_f64().unwrap_or_default().abs())
                .map_err(|e| FunctionError::new(e.to_string())),
            other => Err(FunctionError::invalid_argument(
                "abs",
                format!("bad operand type '{}'", type_name(other)),
            )),
        }),
        CustomFunction::new("round", 1, Some(2), |args| {
            let value = as_float(&args[0])
                .ok_or_else(|| FunctionError::invalid_argument("round", "expected a number"))?;
            match args.get(1).and_then(as_integer) {
                None => {
                    #[allow(clippy::cast_possible_truncation)]
                    let rounded = value.round_ties_even() as i64;
                    Ok(Value::from(rounded))
                }
                Some(digits) => {
                    let factor = 10f64.powi(i32::try_from(digits).unwrap_or(0));
                    float_value((value * factor).round_ties_even() / factor)
                        .map_err(|e| FunctionError::new(e.to_string()))
                }
            }
        }),
        CustomFunction::new("all", 1, Some(1), |args| {
            Ok(Value::Bool(iterable_arg("all", &args[0])?.iter().all(is_truthy)))
        }),
        CustomFunction::new("any", 1, Some(1), |args| {
            Ok(Value::Bool(iterable_arg("any", &args[0])?.iter().any(is_truthy)))
        }),
        CustomFunction::new("sorted", 1, Some(1), |args| {
            let mut items = iterable_arg("sorted", &args[0])?;
            let mut failed = false;
            items.sort_by(|a, b| {
                compare_values(a, b).unwrap_or_else(|| {
                    failed = true;
                    std::cmp::Ordering::Equal
                })
            });
            if failed {
                return Err(FunctionError::invalid_argument(
                    "sorted",
                    "items are not mutually comparable",
                ));
            }
            Ok(Value::Array(items))
        }),
        CustomFunction::new("set", 0, Some(1), |args| match args.first() {
            None => Ok(Value::Array(Vec::new())),
            Some(value) => Ok(Value::Array(dedup(iterable_arg("set", value)?))),
        }),
        CustomFunction::new("list", 0, Some(1), |args| match args.first() {
            None => Ok(Value::Array(Vec::new())),
            Some(value) => Ok(Value::Array(iterable_arg("list", value)?)),
        }),
        CustomFunction::new("difference", 2, Some(2), |args| {
            let other = iterable_arg("difference", &args[1])?;
            let items = dedup(iterable_arg("difference", &args[0])?)
                .into_iter()
                .filter(|item| !other.iter().any(|o| values_equal(o, item)))
                .collect();
            Ok(Value::Array(items))
        }),
        CustomFunction::new("intersection", 2, Some(2), |args| {
            let other = iterable_arg("intersection", &args[1])?;
            let items = dedup(iterable_arg("intersection", &args[0])?)
                .into_iter()
                .filter(|item| other.iter().any(|o| values_equal(o, item)))
                .collect();
            Ok(Value::Array(items))
        }),
        CustomFunction::new("union", 2, Some(2), |args| {
            let mut items = iterable_arg("union", &args[0])?;
            items.extend(iterable_arg("union", &args[1])?);
            Ok(Value::Array(dedup(items)))
        }),
        CustomFunction::new("issubset", 2, Some(2), |args| {
            let other = iterable_arg("issubset", &args[1])?;
            let subset = iterable_arg("issubset", &args[0])?
                .iter()
                .all(|item| other.iter().any(|o| values_equal(o, item)));
            Ok(Value::Bool(subset))
        }),
        CustomFunction::new("count", 2, Some(2), |args| {
            let count = match (&args[0], &args[1]) {
                (Value::String(text), Value::String(needle)) if !needle.is_empty() => {
                    text.matches(needle.as_str()).count()
                }
                (Value::Array(items), needle) => {
                    items.iter().filter(|item| values_equal(item, needle)).count()
                }
                _ => {
                    return Err(FunctionError::invalid_argument(
                        "count",
                        "expected a string or list receiver",
                    ));
                }
            };
            Ok(Value::from(count))
        }),
        CustomFunction::new("get", 2, Some(3), |args| match &args[0] {
            Value::Object(map) => {
                let key = string_arg("get", &args[1])?;
                Ok(map
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| args.get(2).cloned().unwrap_or(Value::Null)))
            }
            other => Err(FunctionError::invalid_argument(
                "get",
                format!("'{}' object has no attribute 'get'", type_name(other)),
            )),
        }),
        CustomFunction::new("keys", 1, Some(1), |args| match &args[0] {
            Value::Object(map) => Ok(Value::Array(map.keys().cloned().map(Value::String).collect())),
            other => Err(FunctionError::invalid_argument(
                "keys",
                format!("'{}' object has no attribute 'keys'", type_name(other)),
            )),
        }),
        CustomFunction::new("values", 1, Some(1), |args| match &args[0] {
            Value::Object(map) => Ok(Value::Array(map.values().cloned().collect())),
            other => Err(FunctionError::invalid_argument(
                "values",
                format!("'{}' object has no attribute 'values'", type_name(other)),
            )),
        }),
    ]
}

#[allow(clippy::cast_possible_truncation)]
fn conversion_functions() -> Vec<CustomFunction> {
    vec![
        CustomFunction::new("str", 0, Some(1), |args| {
            Ok(Value::String(args.first().map(display).unwrap_or_default()))
        }),
        CustomFunction::new("bool", 0, Some(1), |args| {
            Ok(Value::Bool(args.first().is_some_and(is_truthy)))
        }),
        CustomFunction::new("int", 0, Some(1), |args| {
            let Some(value) = args.first() else {
                return Ok(Value::from(0));
            };
            let converted = match value {
                Value::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.abs() < 9.2e18)
                        .map(|f| f.trunc() as i64)
                }),
                Value::Bool(b) => Some(i64::from(*b)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            converted.map(Value::from).ok_or_else(|| {
                FunctionError::invalid_argument(
                    "int",
                    format!("invalid literal for int(): {}", display(value)),
                )
            })
        }),
        CustomFunction::new("float", 0, Some(1), |args| {
            let Some(value) = args.first() else {
                return float_value(0.0).map_err(|e| FunctionError::new(e.to_string()));
            };
            let converted = match value {
                Value::Number(n) => n.as_f64(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            let converted = converted.ok_or_else(|| {
                FunctionError::invalid_argument(
                    "float",
                    format!("could not convert to float: {}", display(value)),
                )
            })?;
            float_value(converted).map_err(|e| FunctionError::new(e.to_string()))
        }),
    ]
}

fn string_predicate(name: &'static str, predicate: fn(char) -> bool) -> CustomFunction {
    CustomFunction::new(name, 1, Some(1), move |args| {
        let text = string_arg(name, &args[0])?;
        Ok(Value::Bool(!text.is_empty() && text.chars().all(predicate)))
    })
}

fn string_transform(name: &'static str, transform: fn(&str) -> String) -> CustomFunction {
    CustomFunction::new(name, 1, Some(1), move |args| {
        Ok(Value::String(transform(string_arg(name, &args[0])?)))
    })
}

fn string_functions() -> Vec<CustomFunction> {
    vec![
        string_transform("upper", str::to_uppercase),
        string_transform("lower", str::to_lowercase),
        string_transform("strip", |s| s.trim().to_string()),
        string_predicate("isdigit", |c| c.is_ascii_digit()),
        string_predicate("isalpha", char::is_alphabetic),
        string_predicate("isalnum", char::is_alphanumeric),
        CustomFunction::new("startswith", 2, Some(2), |args| {
            let text = string_arg("startswith", &args[0])?;
            let prefix = string_arg("startswith", &args[1])?;
            Ok(Value::Bool(text.starts_with(prefix)))
        }),
        CustomFunction::new("endswith", 2, Some(2), |args| {
            let text = string_arg("endswith", &args[0])?;
            let suffix = string_arg("endswith", &args[1])?;
            Ok(Value::Bool(text.ends_with(suffix)))
        }),
        CustomFunction::new("replace", 3, Some(3), |args| {
            let text = string_arg("replace", &args[0])?;
            let from = string_arg("replace", &args[1])?;
            let to = string_arg("replace", &args[2])?;
            Ok(Value::String(text.replace(from, to)))
        }),
        CustomFunction::new("split", 1, Some(2), |args| {
            let text = string_arg("split", &args[0])?;
            let parts: Vec<Value> = match args.get(1) {
                None | Some(Value::Null) => text.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = string_arg("split", sep)?;
                    if sep.is_empty() {
                        return Err(FunctionError::invalid_argument("split", "empty separator"));
                    }
                    text.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::Array(parts))
        }),
        // Accepts both `join(items, sep)` and the method form `sep.join(items)`
        CustomFunction::new("join", 1, Some(2), |args| {
            let (items, sep) = match (&args[0], args.get(1)) {
                (Value::Array(items), None) => (items, ""),
                (Value::Array(items), Some(sep)) | (sep @ Value::String(_), Some(Value::Array(items))) => {
                    (items, string_arg("join", sep)?)
                }
                _ => {
                    return Err(FunctionError::invalid_argument(
                        "join",
                        "expected a list of strings and a separator",
                    ));
                }
            };
            let parts = items
                .iter()
                .map(|item| string_arg("join", item).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::String(parts.join(sep)))
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Vec<Value>) -> Value {
        FunctionRegistry::new()
            .call(name, args)
            .expect("Test operation failed")
    }

    #[test]
    fn test_len_function() {
        assert_eq!(call("len", vec![json!("héllo")]), json!(5));
        assert_eq!(call("len", vec![json!([1, 2, 3])]), json!(3));
        assert_eq!(call("len", vec![json!({"a": 1, "b": 2})]), json!(2));
        assert!(FunctionRegistry::new().call("len", vec![json!(1)]).is_err());
    }

    #[test]
    fn test_min_max_sum() {
        assert_eq!(call("max", vec![json!(1), json!(5), json!(3)]), json!(5));
        assert_eq!(call("min", vec![json!([4, 2.5, 9])]), json!(2.5));
        assert_eq!(call("max", vec![json!(["b", "a"])]), json!("b"));
        assert_eq!(call("sum", vec![json!([1, 2, 3])]), json!(6));
        assert_eq!(call("sum", vec![json!([1, 2.5])]), json!(3.5));
        assert!(FunctionRegistry::new().call("min", vec![json!([])]).is_err());
    }

    #[test]
    fn test_isinstance() {
        assert_eq!(call("isinstance", vec![json!("a"), json!("str")]), json!(true));
        assert_eq!(call("isinstance", vec![json!(1), json!(["float", "int"])]), json!(true));
        assert_eq!(call("isinstance", vec![json!(1.5), json!("int")]), json!(false));
        assert!(
            FunctionRegistry::new()
                .call("isinstance", vec![json!(1), json!("complex")])
                .is_err()
        );
    }

    #[test]
    fn test_collection_functions() {
        assert_eq!(call("set", vec![json!("abca")]), json!(["a", "b", "c"]));
        assert_eq!(call("difference", vec![json!(["a", "$", "!"]), json!("ab")]), json!(["$", "!"]));
        assert_eq!(call("sorted", vec![json!([3, 1, 2])]), json!([1, 2, 3]));
        assert_eq!(call("all", vec![json!([1, "x", true])]), json!(true));
        assert_eq!(call("any", vec![json!([0, "", null])]), json!(false));
        assert_eq!(call("get", vec![json!({"a": 1}), json!("b"), json!(7)]), json!(7));
        assert_eq!(call("round", vec![json!(2.5)]), json!(2));
        assert_eq!(call("round", vec![json!(2.567), json!(2)]), json!(2.57));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("upper", vec![json!("abc")]), json!("ABC"));
        assert_eq!(call("strip", vec![json!("  x ")]), json!("x"));
        assert_eq!(call("split", vec![json!("a, b"), json!(", ")]), json!(["a", "b"]));
        assert_eq!(call("join", vec![json!("-"), json!(["a", "b"])]), json!("a-b"));
        assert_eq!(call("join", vec![json!(["a", "b"]), json!("+")]), json!("a+b"));
        assert_eq!(call("isdigit", vec![json!("123")]), json!(true));
        assert_eq!(call("isdigit", vec![json!("")]), json!(false));
        assert_eq!(call("matches", vec![json!("ab-12"), json!(r"^\w+-\d+$")]), json!(true));
        assert_eq!(call("contains", vec![json!({"a": 1}), json!("a")]), json!(true));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", vec![json!("42")]), json!(42));
        assert_eq!(call("int", vec![json!(3.9)]), json!(3));
        assert_eq!(call("float", vec![json!("1.5")]), json!(1.5));
        assert_eq!(call("str", vec![json!(1000.0)]), json!("1000.0"));
        assert_eq!(call("bool", vec![json!([])]), json!(false));
        assert!(FunctionRegistry::new().call("int", vec![json!("x")]).is_err());
    }

    #[test]
    fn test_custom_functions_and_locking() {
        let mut registry = FunctionRegistry::new();
        registry
            .register_custom(CustomFunction::new("double", 1, Some(1), |args| {
                Ok(Value::from(as_integer(&args[0]).unwrap_or(0) * 2))
            }))
            .expect("Test operation failed");
        assert_eq!(
            registry.call("double", vec![json!(4)]).expect("Test operation failed"),
            json!(8)
        );

        registry.lock();
        assert!(registry.is_locked());
        assert!(
            registry
                .register_custom(CustomFunction::new("noop", 0, None, |_| Ok(Value::Null)))
                .is_err()
        );
        assert!(!FunctionRegistry::new_restricted().has_function("double"));
        assert!(registry.call("unknown", vec![]).is_err());
    }
}
