//! Schema document types
//!
//! A [`SchemaDocument`] is the authored description of a data shape. It is
//! decoded once (usually from YAML) and never mutated afterwards.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StrataError};

/// When a validator runs relative to type coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorMode {
    /// Runs on the raw input, before coercion
    Before,
    /// Runs on the coerced value
    After,
    /// Accepted for compatibility, executes like [`ValidatorMode::Before`]
    Wrap,
}

impl ValidatorMode {
    /// Whether the validator sees raw (uncoerced) input
    #[must_use]
    pub fn runs_before_coercion(self) -> bool {
        matches!(self, Self::Before | Self::Wrap)
    }
}

impl fmt::Display for ValidatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
            Self::Wrap => write!(f, "wrap"),
        }
    }
}

/// A validator as written in a schema document: either a bare source string
/// or a `{source, mode}` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidatorSpec {
    /// Bare source; the mode is inferred from where the validator is declared
    Source(String),
    /// Explicit form
    Full {
        /// Expression source
        source: String,
        /// Execution mode
        #[serde(default)]
        mode: Option<ValidatorMode>,
    },
}

impl ValidatorSpec {
    /// Normalize to a [`RawValidator`], filling in `default_mode` when the
    /// document did not say.
    #[must_use]
    pub fn normalize(&self, default_mode: ValidatorMode) -> RawValidator {
        match self {
            Self::Source(source) => RawValidator {
                source: source.clone(),
                mode: default_mode,
            },
            Self::Full { source, mode } => RawValidator {
                source: source.clone(),
                mode: mode.unwrap_or(default_mode),
            },
        }
    }
}

impl From<&str> for ValidatorSpec {
    fn from(source: &str) -> Self {
        Self::Source(source.to_string())
    }
}

/// Validator source with its mode resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValidator {
    /// Expression source
    pub source: String,
    /// Execution mode
    pub mode: ValidatorMode,
}

/// One entry of a schema's `properties` mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Type name for leaf properties, e.g. `int` or `list[str]`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Nested properties for group properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, PropertyDecl>>,
    /// Default value; present-but-null is kept as `Some(Value::Null)`
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
    /// Named constraints such as `ge`, `le` or `min_length`
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub constraints: IndexMap<String, Value>,
    /// Custom validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<ValidatorSpec>,
    /// Reject empty values before the validator body runs
    #[serde(default = "default_true")]
    pub reject_empty: bool,
}

/// Leaf-vs-group view of a [`PropertyDecl`]
#[derive(Debug, Clone, Copy)]
pub enum PropertyKind<'a> {
    /// Typed leaf
    Leaf(&'a str),
    /// Nested sub-schema
    Group(&'a IndexMap<String, PropertyDecl>),
}

impl PropertyDecl {
    /// Create a leaf property of the given type
    pub fn leaf(type_name: impl Into<String>) -> Self {
        Self {
            description: String::new(),
            type_name: Some(type_name.into()),
            properties: None,
            default: None,
            constraints: IndexMap::new(),
            validator: None,
            reject_empty: true,
        }
    }

    /// Create a group property from nested declarations
    pub fn group(properties: IndexMap<String, PropertyDecl>) -> Self {
        Self {
            properties: Some(properties),
            type_name: None,
            ..Self::leaf(String::new())
        }
    }

    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Add a constraint
    #[must_use]
    pub fn with_constraint(mut self, name: impl Into<String>, value: Value) -> Self {
        self.constraints.insert(name.into(), value);
        self
    }

    /// Attach a validator
    #[must_use]
    pub fn with_validator(mut self, validator: impl Into<ValidatorSpec>) -> Self {
        self.validator = Some(validator.into());
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Classify the property, enforcing that exactly one of `type` and
    /// `properties` is declared.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::SchemaLoading` when both or neither are present.
    pub fn kind(&self, name: &str) -> Result<PropertyKind<'_>> {
        match (&self.type_name, &self.properties) {
            (Some(type_name), None) => Ok(PropertyKind::Leaf(type_name)),
            (None, Some(properties)) => Ok(PropertyKind::Group(properties)),
            (Some(_), Some(_)) => Err(StrataError::schema_loading(
                name,
                "a property declares both \"type\" and \"properties\"",
            )),
            (None, None) => Err(StrataError::schema_loading(
                name,
                "a property must declare either \"type\" or \"properties\"",
            )),
        }
    }
}

impl From<ValidatorMode> for ValidatorSpec {
    fn from(mode: ValidatorMode) -> Self {
        Self::Full {
            source: String::new(),
            mode: Some(mode),
        }
    }
}

/// The authoring unit: a named, versioned set of properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Unique identifier
    pub name: String,
    /// Schema version
    pub version: String,
    /// Description
    pub description: String,
    /// Shared values passed into every validator invocation
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    /// Whole-model validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<ValidatorSpec>,
    /// Ordered property declarations
    pub properties: IndexMap<String, PropertyDecl>,
}

impl SchemaDocument {
    /// Create an empty document
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            context: Map::new(),
            validator: None,
            properties: IndexMap::new(),
        }
    }

    /// Add a property
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, property: PropertyDecl) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// Add a context entry
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Attach the whole-model validator
    #[must_use]
    pub fn with_validator(mut self, validator: impl Into<ValidatorSpec>) -> Self {
        self.validator = Some(validator.into());
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

fn default_true() -> bool {
    true
}

fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_document() {
        let yaml = r#"
name: Person
version: '1.0'
description: A person
context:
  minimum_age: 18
validator: 'assert name'
properties:
  name:
    description: Full name
    type: str
    default: null
  age:
    type: int
    constraints:
      ge: 0
    validator:
      mode: after
      source: 'if value < 18: raise ValueError("too young")'
  address:
    properties:
      city:
        type: str
"#;
        let doc: SchemaDocument = serde_yaml::from_str(yaml).expect("document should parse");
        assert_eq!(doc.name, "Person");
        assert_eq!(
            doc.properties.keys().collect::<Vec<_>>(),
            vec!["name", "age", "address"]
        );
        assert_eq!(doc.properties["name"].default, Some(Value::Null));
        assert_eq!(doc.properties["age"].default, None);
        assert!(doc.properties["age"].reject_empty);
        assert!(matches!(
            doc.properties["address"].kind("address"),
            Ok(PropertyKind::Group(_))
        ));
        assert_eq!(
            doc.validator.as_ref().map(|v| v.normalize(ValidatorMode::Before).mode),
            Some(ValidatorMode::Before)
        );
        let age = doc.properties["age"]
            .validator
            .as_ref()
            .map(|v| v.normalize(ValidatorMode::Before));
        assert_eq!(age.map(|v| v.mode), Some(ValidatorMode::After));
    }

    #[test]
    fn test_kind_requires_exactly_one() {
        let mut both = PropertyDecl::leaf("int");
        both.properties = Some(IndexMap::new());
        assert!(both.kind("x").is_err());

        let mut neither = PropertyDecl::leaf("int");
        neither.type_name = None;
        assert!(neither.kind("x").is_err());
    }
}
