//! JSON-schema description of compiled models

use serde_json::{Map, Value, json};

use super::{CompiledModel, FieldDescriptor};
use crate::transpiler::types::FieldType;

impl CompiledModel {
    /// Structural description returned with validation results.
    ///
    /// Nested models are inlined rather than referenced.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, field) in self.fields() {
            properties.insert(name.clone(), field_schema(field));
            if field.is_required() {
                required.push(Value::String(name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("title".to_string(), json!(self.name()));
        if !self.description().is_empty() {
            schema.insert("description".to_string(), json!(self.description()));
        }
        if !self.version().is_empty() {
            schema.insert("version".to_string(), json!(self.version()));
        }
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), Value::Array(required));
        Value::Object(schema)
    }
}

fn field_schema(field: &FieldDescriptor) -> Value {
    let items = field.item_type.map(|item| item.json_schema());
    let mut schema = match &field.field_type {
        FieldType::Scalar(scalar) => as_map(scalar.json_schema()),
        FieldType::List => {
            let mut map = as_map(json!({"type": "array"}));
            if let Some(items) = items {
                map.insert("items".to_string(), items);
            }
            map
        }
        FieldType::Set => {
            let mut map = as_map(json!({"type": "array", "uniqueItems": true}));
            if let Some(items) = items {
                map.insert("items".to_string(), items);
            }
            map
        }
        FieldType::Model(nested) => as_map(nested.json_schema()),
    };

    if !field.description.is_empty() {
        schema.insert("description".to_string(), json!(field.description));
    }
    if let Some(default) = &field.default {
        schema.insert("default".to_string(), default.clone());
    }
    for constraint in &field.constraints {
        constraint.annotate(&mut schema, &field.field_type);
    }
    Value::Object(schema)
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
