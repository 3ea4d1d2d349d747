//! Compiled models
//!
//! A [`CompiledModel`] is the executable form of a schema document. It is a
//! plain value: nested property groups are fields whose type is another
//! `CompiledModel`, forming a tree. Models are immutable once built; all
//! per-call state lives in the accumulator threaded through [`runtime`].

pub mod json_schema;
pub mod runtime;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::transpiler::compiler::CompiledValidator;
use crate::transpiler::types::{Constraint, FieldType, ScalarType};

pub use runtime::Pass;

/// Typed description of one field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Resolved type
    pub field_type: FieldType,
    /// Item type of a `list[T]` / `set[T]` declaration
    pub item_type: Option<ScalarType>,
    /// Default value; `None` means the field is required
    pub default: Option<Value>,
    /// Constraints checked after coercion
    pub constraints: Vec<Constraint>,
    /// Field validator
    pub validator: Option<CompiledValidator>,
}

impl FieldDescriptor {
    /// Whether input must supply this field
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Nested model, for group fields
    #[must_use]
    pub fn nested_model(&self) -> Option<&Arc<CompiledModel>> {
        match &self.field_type {
            FieldType::Model(model) => Some(model),
            _ => None,
        }
    }
}

/// Executable model built from a schema document
#[derive(Debug, Clone)]
pub struct CompiledModel {
    name: String,
    version: String,
    description: String,
    context: Map<String, Value>,
    fields: IndexMap<String, FieldDescriptor>,
    model_validator: Option<CompiledValidator>,
}

impl CompiledModel {
    pub(crate) fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        context: Map<String, Value>,
        fields: IndexMap<String, FieldDescriptor>,
        model_validator: Option<CompiledValidator>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            context,
            fields,
            model_validator,
        }
    }

    /// Declared name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared version
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Declared description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Shared context passed to every validator
    #[must_use]
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Fields in declaration order
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, FieldDescriptor> {
        &self.fields
    }

    /// Look up a field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Whole-model validator
    #[must_use]
    pub fn model_validator(&self) -> Option<&CompiledValidator> {
        self.model_validator.as_ref()
    }

    /// Every validator attached directly to this model, field validators first
    pub fn validators(&self) -> impl Iterator<Item = &CompiledValidator> {
        self.fields
            .values()
            .filter_map(|f| f.validator.as_ref())
            .chain(self.model_validator.as_ref())
    }
}

/// A successfully constructed value of a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    /// Model name
    pub model: String,
    /// Coerced field values, nested groups as objects
    pub values: Map<String, Value>,
}

impl Instance {
    /// Value of one field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Field values as a JSON object
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// Consume into the field values
    #[must_use]
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}
