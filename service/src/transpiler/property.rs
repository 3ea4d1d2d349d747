//! Property transpiler: one declaration to one field descriptor

use std::sync::Arc;

use serde_json::{Map, Value};
use strata_core::{
    PropertyDecl, PropertyKind, Result, StrataError, ValidatorMode,
};
use tracing::{debug, warn};

use super::compiler::ValidatorRequest;
use super::schema::SchemaTranspiler;
use super::types::{Constraint, FieldType, ScalarType, split_parameterized};
use crate::expression::parser::dedent;
use crate::model::FieldDescriptor;

/// Collection kinds accepted in `Collection[Item]` declarations
pub const COLLECTION_TYPES: &[&str] = &["list", "set"];

/// Validator source checking every item of a collection field
#[must_use]
pub fn collection_item_source(field: &str, item: ScalarType) -> String {
    let item = item.isinstance_name();
    format!(
        "for item in value:\n    \
         if not item:\n        \
         raise ValueError('Items in list cannot be empty')\n    \
         if not isinstance(item, {item}):\n        \
         raise ValueError('Items in {field} must be of type {item}')"
    )
}

/// Transpiles the properties of one schema (or property group)
pub struct PropertyTranspiler<'a> {
    schema: &'a SchemaTranspiler,
    owner: &'a str,
    context: &'a Map<String, Value>,
}

impl<'a> PropertyTranspiler<'a> {
    /// Create a transpiler for properties owned by `owner`
    #[must_use]
    pub fn new(
        schema: &'a SchemaTranspiler,
        owner: &'a str,
        context: &'a Map<String, Value>,
    ) -> Self {
        Self {
            schema,
            owner,
            context,
        }
    }

    /// Build the descriptor for one property
    ///
    /// # Errors
    ///
    /// Returns `StrataError::IncorrectFieldType` for unusable types,
    /// `StrataError::SchemaLoading` for bad constraints or validator syntax,
    /// and `StrataError::ForbiddenCapability` for forbidden validator code.
    pub fn transpile(&self, name: &str, decl: &PropertyDecl) -> Result<FieldDescriptor> {
        match decl.kind(&self.qualified(name))? {
            PropertyKind::Leaf(type_name) => self.leaf(name, decl, type_name),
            PropertyKind::Group(_) => self.group(name, decl),
        }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{name}", self.owner)
    }

    fn leaf(&self, name: &str, decl: &PropertyDecl, type_name: &str) -> Result<FieldDescriptor> {
        let (field_type, item_type) = match split_parameterized(type_name) {
            Some((collection, item)) => {
                if !COLLECTION_TYPES.contains(&collection) {
                    return Err(StrataError::incorrect_field_type(collection));
                }
                let item_type = ScalarType::parse(item)
                    .ok_or_else(|| StrataError::incorrect_field_type(item))?;
                (FieldType::resolve(collection)?, Some(item_type))
            }
            None => (FieldType::resolve(type_name)?, None),
        };

        let constraints = decl
            .constraints
            .iter()
            .map(|(constraint, value)| {
                Constraint::parse(constraint, value, &field_type)
                    .map_err(|message| StrataError::schema_loading(self.qualified(name), message))
            })
            .collect::<Result<Vec<_>>>()?;

        let user = decl
            .validator
            .as_ref()
            .map(|spec| spec.normalize(ValidatorMode::After));
        let item_check = item_type.map(|item| collection_item_source(name, item));

        let validator = match (user, item_check) {
            (None, None) => None,
            (user, item_check) => {
                let mode = user.as_ref().map_or(ValidatorMode::After, |u| u.mode);
                let source = [user.map(|u| dedent(&u.source)), item_check]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join("\n");
                let request = ValidatorRequest::field(name, source, mode)
                    .with_reject_empty(decl.reject_empty);
                Some(self.schema.compiler().compile(request)?)
            }
        };

        debug!(
            field = %self.qualified(name),
            field_type = %field_type.describe(),
            required = decl.default.is_none(),
            has_validator = validator.is_some(),
            "Transpiled property"
        );

        Ok(FieldDescriptor {
            name: name.to_string(),
            description: decl.description.clone(),
            field_type,
            item_type,
            default: decl.default.clone(),
            constraints,
            validator,
        })
    }

    fn group(&self, name: &str, decl: &PropertyDecl) -> Result<FieldDescriptor> {
        if !decl.constraints.is_empty() {
            warn!(
                field = %self.qualified(name),
                "Constraints on a property group are ignored"
            );
        }
        if decl.default.is_some() {
            warn!(
                field = %self.qualified(name),
                "Defaults on a property group are ignored; groups are always required"
            );
        }

        let nested = self.schema.transpile_group(name, decl, self.context)?;
        Ok(FieldDescriptor {
            name: name.to_string(),
            description: decl.description.clone(),
            field_type: FieldType::Model(Arc::new(nested)),
            item_type: None,
            default: None,
            constraints: Vec::new(),
            validator: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Parser;
    use serde_json::json;

    fn transpile(name: &str, decl: &PropertyDecl) -> Result<FieldDescriptor> {
        let schema = SchemaTranspiler::default();
        let context = Map::new();
        PropertyTranspiler::new(&schema, "Test", &context).transpile(name, decl)
    }

    #[test]
    fn test_item_source_parses() {
        let source = collection_item_source("tags", ScalarType::Str);
        assert!(Parser::new().parse(&source).is_ok());
        assert!(source.contains("Items in tags must be of type str"));
    }

    #[test]
    fn test_parameterized_collection_gets_item_validator() {
        let field = transpile("tags", &PropertyDecl::leaf("list[str]")).expect("Test operation failed");
        assert!(matches!(field.field_type, FieldType::List));
        assert_eq!(field.item_type, Some(ScalarType::Str));
        let validator = field.validator.expect("item validator synthesized");
        assert_eq!(validator.mode(), ValidatorMode::After);

        let ctx = Map::new();
        assert!(validator.call_field(json!(["a", "b"]), &ctx, &Value::Null).is_ok());
        let err = validator
            .call_field(json!(["a", 1]), &ctx, &Value::Null)
            .expect_err("wrong item type");
        assert_eq!(err.to_string(), "Items in tags must be of type str");
        let err = validator
            .call_field(json!(["a", ""]), &ctx, &Value::Null)
            .expect_err("empty item");
        assert_eq!(err.to_string(), "Items in list cannot be empty");
    }

    #[test]
    fn test_user_validator_combined_with_item_check() {
        let decl = PropertyDecl::leaf("set[int]")
            .with_validator("  if len(value) > 3:\n      raise ValueError('Too many')");
        let field = transpile("ids", &decl).expect("Test operation failed");
        let validator = field.validator.expect("validator compiled");
        let ctx = Map::new();
        assert!(validator.call_field(json!([1, 2]), &ctx, &Value::Null).is_ok());
        assert!(validator.call_field(json!([1, 2, 3, 4]), &ctx, &Value::Null).is_err());
        assert!(validator.call_field(json!([1, "x"]), &ctx, &Value::Null).is_err());
    }

    #[test]
    fn test_rejected_types() {
        let err = transpile("meta", &PropertyDecl::leaf("dict")).expect_err("dict rejected");
        assert!(matches!(err, StrataError::IncorrectFieldType { .. }));
        let err = transpile("meta", &PropertyDecl::leaf("dict[str]")).expect_err("dict rejected");
        assert!(err.to_string().contains("properties"));
        let err = transpile("meta", &PropertyDecl::leaf("tuple[str]")).expect_err("tuple rejected");
        assert_eq!(err.to_string(), "Invalid field type: tuple");
        assert!(transpile("meta", &PropertyDecl::leaf("list[widget]")).is_err());
    }

    #[test]
    fn test_bad_constraint_is_loading_error() {
        let decl = PropertyDecl::leaf("str").with_constraint("ge", json!(1));
        let err = transpile("name", &decl).expect_err("ge on str");
        assert!(matches!(err, StrataError::SchemaLoading { .. }));
    }

    #[test]
    fn test_group_becomes_required_nested_model() {
        let mut properties = indexmap::IndexMap::new();
        properties.insert("city".to_string(), PropertyDecl::leaf("str"));
        let field = transpile("address", &PropertyDecl::group(properties)).expect("Test operation failed");
        assert!(field.is_required());
        let nested = field.nested_model().expect("nested model");
        assert_eq!(nested.name(), "address");
        assert!(nested.field("city").is_some());
    }
}
