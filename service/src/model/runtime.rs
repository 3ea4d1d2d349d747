//! Validation pipeline for compiled models
//!
//! One pass runs: model "before" validator, per-field coercion with field
//! validators and constraints, then the model "after" validator. Failures are
//! recorded and the pass continues, so every violated field is reported.
//! The accumulator is created per pass and returned with it.

use serde_json::{Map, Value};
use strata_core::{ErrorAccumulator, MODEL_SENTINEL, Result, StrataError};
use tracing::debug;

use super::{CompiledModel, FieldDescriptor, Instance};
use crate::transpiler::compiler::{CompiledValidator, runtime_failure};
use crate::transpiler::types::FieldType;

/// Message recorded for missing required fields
pub const FIELD_REQUIRED: &str = "Field required";

/// Outcome of one validation pass
#[derive(Debug, Clone, Default)]
pub struct Pass {
    /// Every error seen during the pass
    pub errors: ErrorAccumulator,
    /// Coerced values of the fields that passed
    pub values: Map<String, Value>,
}

impl Pass {
    /// Whether no error was recorded
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl CompiledModel {
    /// Run the full pipeline against `data`.
    ///
    /// Bad data never produces an `Err`; it is recorded in the returned pass.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ForbiddenCapability` if a validator trips the
    /// isolation guard at run time.
    pub fn run(&self, data: &Value) -> Result<Pass> {
        self.run_tagged(data, self.name())
    }

    /// Run the pipeline, recording model-level failures under `model_tag`.
    /// Nested models use [`MODEL_SENTINEL`] so the parent can tell them apart
    /// from fields that share the group's name.
    fn run_tagged(&self, data: &Value, model_tag: &str) -> Result<Pass> {
        let mut pass = Pass::default();
        let mut input = data.clone();

        if let Some(validator) = self.model_validator()
            && validator.mode().runs_before_coercion()
        {
            match validator.call_model(&input, self.context()) {
                Ok(replaced) => input = replaced,
                Err(e) => {
                    let message = runtime_failure(validator, e)?;
                    pass.errors.record(model_tag, message);
                }
            }
        }

        let Value::Object(fields) = &input else {
            pass.errors
                .record(model_tag, "Input should be a valid dictionary");
            return Ok(pass);
        };

        for (name, descriptor) in self.fields() {
            match fields.get(name) {
                None => match &descriptor.default {
                    Some(default) => {
                        pass.values.insert(name.clone(), default.clone());
                    }
                    None => {
                        pass.errors.record(name.as_str(), FIELD_REQUIRED);
                    }
                },
                Some(raw) => {
                    if let Some(value) = self.run_field(descriptor, raw.clone(), &input, &mut pass.errors)? {
                        pass.values.insert(name.clone(), value);
                    }
                }
            }
        }

        if pass.is_valid()
            && let Some(validator) = self.model_validator()
            && !validator.mode().runs_before_coercion()
        {
            match validator.call_model(&Value::Object(pass.values.clone()), self.context()) {
                Ok(Value::Object(values)) => pass.values = values,
                Ok(_) => {}
                Err(e) => {
                    let message = runtime_failure(validator, e)?;
                    pass.errors.record(model_tag, message);
                }
            }
        }

        debug!(
            model = %self.name(),
            errors = pass.errors.len(),
            "Validation pass finished"
        );
        Ok(pass)
    }

    /// Validate one present field; `None` means an error was recorded
    fn run_field(
        &self,
        descriptor: &FieldDescriptor,
        mut value: Value,
        data: &Value,
        errors: &mut ErrorAccumulator,
    ) -> Result<Option<Value>> {
        let name = descriptor.name.as_str();
        let validator = descriptor.validator.as_ref();

        if let Some(validator) = validator.filter(|v| v.mode().runs_before_coercion()) {
            match self.call_field(validator, value, data, errors)? {
                Some(replaced) => value = replaced,
                None => return Ok(None),
            }
        }

        value = match &descriptor.field_type {
            FieldType::Model(nested) => {
                let nested_pass = nested.run_tagged(&value, MODEL_SENTINEL)?;
                if !nested_pass.is_valid() {
                    errors.merge_nested(name, nested_pass.errors);
                    return Ok(None);
                }
                Value::Object(nested_pass.values)
            }
            field_type => match field_type.coerce(&value) {
                Ok(coerced) => coerced,
                Err(message) => {
                    errors.record(name, message);
                    return Ok(None);
                }
            },
        };

        let mut satisfied = true;
        for constraint in &descriptor.constraints {
            if let Err(message) = constraint.check(&value) {
                errors.record(name, message);
                satisfied = false;
            }
        }
        if !satisfied {
            return Ok(None);
        }

        if let Some(validator) = validator.filter(|v| !v.mode().runs_before_coercion()) {
            return self.call_field(validator, value, data, errors);
        }
        Ok(Some(value))
    }

    fn call_field(
        &self,
        validator: &CompiledValidator,
        value: Value,
        data: &Value,
        errors: &mut ErrorAccumulator,
    ) -> Result<Option<Value>> {
        match validator.call_field(value, self.context(), data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let message = runtime_failure(validator, e)?;
                errors.record(validator.field(), message);
                Ok(None)
            }
        }
    }

    /// Construct an instance, failing on the first invalid pass
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Construction` carrying every recorded error, or
    /// `StrataError::ForbiddenCapability` from a validator.
    pub fn construct(&self, data: &Value) -> Result<Instance> {
        let pass = self.run(data)?;
        self.instance_from(pass)
    }

    /// Turn a pass into an instance
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Construction` if the pass recorded errors.
    pub fn instance_from(&self, pass: Pass) -> Result<Instance> {
        if pass.is_valid() {
            Ok(Instance {
                model: self.name().to_string(),
                values: pass.values,
            })
        } else {
            Err(StrataError::Construction {
                model: self.name().to_string(),
                errors: pass.errors.into_errors(),
            })
        }
    }
}
