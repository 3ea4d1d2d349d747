//! Validation outcome records
//!
//! [`ErrorAccumulator`] is created fresh for every validation call and threaded
//! through the pipeline by `&mut`. Nothing here is ever stored on a model.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name used for errors that belong to a whole model rather than a field
pub const MODEL_SENTINEL: &str = "__model__";

/// One reported field/message failure.
///
/// Equality and hashing use both parts, so repeated sightings of the same
/// failure collapse to a single record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name, dot-qualified for nested models
    pub field: String,
    /// Error message
    pub message: String,
}

impl FieldError {
    /// Create a new error record
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Return a copy with `prefix.` prepended to the field name. A
    /// [`MODEL_SENTINEL`] record becomes a record for `prefix` itself.
    #[must_use]
    pub fn qualified(&self, prefix: &str) -> Self {
        let field = if self.field == MODEL_SENTINEL {
            prefix.to_string()
        } else {
            format!("{prefix}.{}", self.field)
        };
        Self {
            field,
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Call-scoped, insertion-ordered, de-duplicating error collector
#[derive(Debug, Default, Clone)]
pub struct ErrorAccumulator {
    errors: IndexSet<FieldError>,
}

impl ErrorAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; returns `false` if an identical record was already present
    pub fn push(&mut self, error: FieldError) -> bool {
        self.errors.insert(error)
    }

    /// Record an error from its parts
    pub fn record(&mut self, field: impl Into<String>, message: impl Into<String>) -> bool {
        self.push(FieldError::new(field, message))
    }

    /// Merge errors collected for a nested model, qualifying each field name
    pub fn merge_nested(&mut self, prefix: &str, nested: ErrorAccumulator) {
        for error in nested.errors {
            self.errors.insert(error.qualified(prefix));
        }
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of distinct records
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Consume into an ordered list
    #[must_use]
    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors.into_iter().collect()
    }
}

impl Extend<FieldError> for ErrorAccumulator {
    fn extend<T: IntoIterator<Item = FieldError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

/// Full outcome of one validation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResults {
    /// `true` exactly when `errors` is empty
    pub valid: bool,
    /// JSON-schema-like description of the model that was applied
    pub schema: Value,
    /// Ordered, de-duplicated error records
    pub errors: Vec<FieldError>,
    /// The input, echoed back unchanged
    pub data: Value,
}

impl ValidationResults {
    /// Assemble results, deriving `valid` from the error list
    #[must_use]
    pub fn new(schema: Value, errors: ErrorAccumulator, data: Value) -> Self {
        let errors = errors.into_errors();
        Self {
            valid: errors.is_empty(),
            schema,
            errors,
            data,
        }
    }

    /// Field names that failed, in report order and without repeats
    #[must_use]
    pub fn error_fields(&self) -> Vec<&str> {
        let mut seen = IndexSet::new();
        for error in &self.errors {
            seen.insert(error.field.as_str());
        }
        seen.into_iter().collect()
    }

    /// Errors reported for one field
    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.field == field)
    }
}
