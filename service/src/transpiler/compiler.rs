//! Validator compiler
//!
//! Turns validator source into a [`CompiledValidator`]: the source is screened
//! by the isolation guard, parsed, and wrapped in the field or model template.
//! The result is a reusable callable that owns its program and evaluator.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use strata_core::{MODEL_SENTINEL, Result, StrataConfig, StrataError, ValidatorMode};
use tracing::debug;

use crate::expression::{
    EvaluationError, ExpressionEngine, ParseError, Program, Scope, parser::Parser,
};

/// Source prepended to field validators that reject empty values
pub const REJECT_EMPTY_PRELUDE: &str = "if not value: raise ValueError('Value cannot be empty')";

/// Which template a validator is rendered into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorKind {
    /// Receives one field's value
    Field,
    /// Receives the whole input mapping
    Model,
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field => write!(f, "field"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// A request to compile one validator
#[derive(Debug, Clone)]
pub struct ValidatorRequest {
    /// Generated identifier, e.g. `age_validator`
    pub name: String,
    /// Field the validator belongs to, or the model sentinel
    pub field: String,
    /// Validator source
    pub source: String,
    /// Template to use
    pub kind: ValidatorKind,
    /// When the validator runs relative to coercion
    pub mode: ValidatorMode,
    /// Prepend the empty-value check (field validators only)
    pub reject_empty: bool,
    /// Additional names bound for every invocation
    pub extra_bindings: Scope,
}

impl ValidatorRequest {
    /// Request for a field validator named `<field>_validator`
    pub fn field(field: impl Into<String>, source: impl Into<String>, mode: ValidatorMode) -> Self {
        let field = field.into();
        Self {
            name: format!("{field}_validator"),
            field,
            source: source.into(),
            kind: ValidatorKind::Field,
            mode,
            reject_empty: true,
            extra_bindings: Scope::new(),
        }
    }

    /// Request for a whole-model validator
    pub fn model(name: impl Into<String>, source: impl Into<String>, mode: ValidatorMode) -> Self {
        Self {
            name: name.into(),
            field: MODEL_SENTINEL.to_string(),
            source: source.into(),
            kind: ValidatorKind::Model,
            mode,
            reject_empty: false,
            extra_bindings: Scope::new(),
        }
    }

    /// Set the empty-value check
    #[must_use]
    pub fn with_reject_empty(mut self, reject_empty: bool) -> Self {
        self.reject_empty = reject_empty;
        self
    }

    /// Bind an extra name for every invocation
    #[must_use]
    pub fn with_binding(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra_bindings.insert(name.into(), value);
        self
    }
}

/// An executable validator extracted from source
#[derive(Debug, Clone)]
pub struct CompiledValidator {
    name: String,
    field: String,
    kind: ValidatorKind,
    mode: ValidatorMode,
    program: Arc<Program>,
    bindings: Arc<Scope>,
    engine: ExpressionEngine,
}

impl CompiledValidator {
    /// Generated identifier
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target field, or the model sentinel
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Template the validator was rendered into
    #[must_use]
    pub fn kind(&self) -> ValidatorKind {
        self.kind
    }

    /// Execution mode
    #[must_use]
    pub fn mode(&self) -> ValidatorMode {
        self.mode
    }

    /// The compiled program, template included
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Run as a field validator and return the final `value`.
    ///
    /// The value is also bound under the field's own name. The program sees
    /// `context` and `info` (`field_name`, `context`, the whole input `data`).
    ///
    /// # Errors
    ///
    /// Returns the `EvaluationError` raised by the validator.
    pub fn call_field(
        &self,
        value: Value,
        context: &Map<String, Value>,
        data: &Value,
    ) -> std::result::Result<Value, EvaluationError> {
        let mut scope = (*self.bindings).clone();
        scope.insert("context".to_string(), Value::Object(context.clone()));
        scope.insert(
            "info".to_string(),
            json!({
                "field_name": self.field,
                "context": context,
                "data": data,
            }),
        );
        scope.insert(self.field.clone(), value.clone());
        scope.insert("value".to_string(), value);

        let mut scope = self.engine.run(&self.program, scope)?;
        Ok(scope.swap_remove("value").unwrap_or(Value::Null))
    }

    /// Run as a model validator and return the (possibly mutated) mapping.
    ///
    /// Every key of `data` is bound by name next to `data`, `context` and
    /// `info`. Keys reassigned by the program replace the input values.
    ///
    /// # Errors
    ///
    /// Returns the `EvaluationError` raised by the validator.
    pub fn call_model(
        &self,
        data: &Value,
        context: &Map<String, Value>,
    ) -> std::result::Result<Value, EvaluationError> {
        let mut scope = (*self.bindings).clone();
        scope.insert("context".to_string(), Value::Object(context.clone()));
        scope.insert(
            "info".to_string(),
            json!({
                "field_name": MODEL_SENTINEL,
                "context": context,
                "data": data,
            }),
        );
        if let Value::Object(fields) = data {
            for (key, value) in fields {
                scope.insert(key.clone(), value.clone());
            }
        }
        scope.insert("data".to_string(), data.clone());

        let scope = self.engine.run(&self.program, scope)?;
        let mut result = match scope.get("data") {
            Some(Value::Object(map)) => map.clone(),
            _ => match data {
                Value::Object(map) => map.clone(),
                other => return Ok(other.clone()),
            },
        };
        if let Value::Object(fields) = data {
            for (key, original) in fields {
                if let Some(current) = scope.get(key)
                    && current != original
                {
                    result.insert(key.clone(), current.clone());
                }
            }
        }
        Ok(Value::Object(result))
    }
}

/// Compiles validator requests with one expression engine
#[derive(Debug, Clone, Default)]
pub struct ValidatorCompiler {
    engine: ExpressionEngine,
}

impl ValidatorCompiler {
    /// Create a compiler around an engine
    #[must_use]
    pub fn new(engine: ExpressionEngine) -> Self {
        Self { engine }
    }

    /// Create a compiler from runtime configuration
    #[must_use]
    pub fn from_config(config: &StrataConfig) -> Self {
        Self::new(ExpressionEngine::from_config(config))
    }

    /// Engine used for compiled validators
    #[must_use]
    pub fn engine(&self) -> &ExpressionEngine {
        &self.engine
    }

    /// Compile one validator
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ForbiddenCapability` if the source uses a
    /// deny-listed capability, or `StrataError::SchemaLoading` if it does not
    /// parse.
    pub fn compile(&self, request: ValidatorRequest) -> Result<CompiledValidator> {
        let body = self
            .engine
            .compile(&request.source)
            .map_err(|e| compile_error(&request.name, e))?;

        let program = if request.kind == ValidatorKind::Field && request.reject_empty {
            Parser::new()
                .parse(REJECT_EMPTY_PRELUDE)
                .map_err(|e| compile_error(&request.name, e))?
                .then(body)
        } else {
            body
        };

        debug!(
            validator = %request.name,
            field = %request.field,
            kind = %request.kind,
            mode = %request.mode,
            statements = program.statements.len(),
            "Compiled validator"
        );

        Ok(CompiledValidator {
            name: request.name,
            field: request.field,
            kind: request.kind,
            mode: request.mode,
            program: Arc::new(program),
            bindings: Arc::new(request.extra_bindings),
            engine: self.engine.clone(),
        })
    }
}

fn compile_error(validator: &str, error: ParseError) -> StrataError {
    match error {
        ParseError::ForbiddenCapability { capability } => {
            StrataError::forbidden(capability, validator)
        }
        other => StrataError::schema_loading(validator, other.to_string()),
    }
}

/// Map a runtime failure to either a propagating error or a record message
///
/// # Errors
///
/// Returns `StrataError::ForbiddenCapability` when the guard tripped at run time.
pub fn runtime_failure(
    validator: &CompiledValidator,
    error: EvaluationError,
) -> Result<String> {
    match error {
        EvaluationError::ForbiddenCapability { capability } => {
            Err(StrataError::forbidden(capability, validator.name()))
        }
        other => Ok(other.to_string()),
    }
}
