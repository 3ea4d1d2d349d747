//! Validation facade
//!
//! [`SchemaFactory`] pairs a schema name with its compiled model. `validate`
//! reports bad data as error records and never fails for it; `build` returns
//! a typed instance only when the data is valid.

pub mod registry;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use strata_core::{FieldError, Result, ValidationResults};
use tracing::debug;

use crate::model::{CompiledModel, Instance};

pub use registry::SchemaRegistry;

/// Validation entry point for one compiled model
#[derive(Debug)]
pub struct SchemaFactory {
    model: Arc<CompiledModel>,
    /// Errors of the most recent `validate`/`build` call on this factory
    last_errors: Mutex<Vec<FieldError>>,
}

impl SchemaFactory {
    /// Wrap a compiled model
    #[must_use]
    pub fn new(model: Arc<CompiledModel>) -> Self {
        Self {
            model,
            last_errors: Mutex::new(Vec::new()),
        }
    }

    /// Schema name
    #[must_use]
    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// The compiled model
    #[must_use]
    pub fn model(&self) -> &Arc<CompiledModel> {
        &self.model
    }

    /// Validate `data`, collecting every error.
    ///
    /// Each call uses its own accumulator, so repeated or concurrent calls
    /// never see each other's errors.
    ///
    /// # Errors
    ///
    /// Only `StrataError::ForbiddenCapability` escapes; data errors are part
    /// of the returned results.
    pub fn validate(&self, data: &Value) -> Result<ValidationResults> {
        let pass = self.model.run(data)?;
        let results = ValidationResults::new(self.model.json_schema(), pass.errors, data.clone());
        debug!(
            schema = %self.name(),
            valid = results.valid,
            errors = results.errors.len(),
            "Validated data"
        );
        self.last_errors.lock().clone_from(&results.errors);
        Ok(results)
    }

    /// Validate `data` and construct an instance when it is valid.
    ///
    /// Returns `Ok(None)` for invalid data; the errors are then available
    /// from [`SchemaFactory::last_errors`].
    ///
    /// # Errors
    ///
    /// Only `StrataError::ForbiddenCapability` escapes.
    pub fn build(&self, data: &Value) -> Result<Option<Instance>> {
        let pass = self.model.run(data)?;
        *self.last_errors.lock() = pass.errors.iter().cloned().collect();
        if !pass.is_valid() {
            debug!(schema = %self.name(), errors = pass.errors.len(), "Build rejected data");
            return Ok(None);
        }
        self.model.instance_from(pass).map(Some)
    }

    /// Errors recorded by the latest `validate` or `build` call
    #[must_use]
    pub fn last_errors(&self) -> Vec<FieldError> {
        self.last_errors.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::SchemaTranspiler;
    use serde_json::json;
    use strata_core::{PropertyDecl, SchemaDocument};

    fn factory() -> SchemaFactory {
        let document = SchemaDocument::new("Person", "1.0")
            .with_property("name", PropertyDecl::leaf("str"))
            .with_property("age", PropertyDecl::leaf("int").with_constraint("ge", json!(0)));
        let model = SchemaTranspiler::default()
            .transpile(&document)
            .expect("Test operation failed");
        SchemaFactory::new(Arc::new(model))
    }

    #[test]
    fn test_validate_reports_all_fields() {
        let factory = factory();
        let results = factory
            .validate(&json!({"age": -1}))
            .expect("Test operation failed");
        assert!(!results.valid);
        assert_eq!(results.error_fields(), vec!["name", "age"]);
        assert_eq!(results.data, json!({"age": -1}));
        assert_eq!(results.schema["title"], json!("Person"));
    }

    #[test]
    fn test_build_returns_instance_or_none() {
        let factory = factory();
        let instance = factory
            .build(&json!({"name": "Ada", "age": "36"}))
            .expect("Test operation failed")
            .expect("valid data builds");
        assert_eq!(instance.get("age"), Some(&json!(36)));
        assert!(factory.last_errors().is_empty());

        assert!(
            factory
                .build(&json!({"name": 1, "age": 2}))
                .expect("Test operation failed")
                .is_none()
        );
        assert_eq!(factory.last_errors().len(), 1);
    }
}
