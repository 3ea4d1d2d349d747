//! Schema transpiler: schema document to compiled model

use indexmap::IndexMap;
use serde_json::{Map, Value};
use strata_core::{PropertyDecl, Result, SchemaDocument, StrataConfig, StrataError, ValidatorMode, ValidatorSpec};
use tracing::info;

use super::compiler::{CompiledValidator, ValidatorCompiler, ValidatorRequest};
use super::property::PropertyTranspiler;
use crate::model::{CompiledModel, FieldDescriptor};

/// Name of the validator attached to a property group
pub const GROUP_VALIDATOR_NAME: &str = "validate_model";

/// Builds compiled models from schema documents
#[derive(Debug, Clone, Default)]
pub struct SchemaTranspiler {
    compiler: ValidatorCompiler,
}

impl SchemaTranspiler {
    /// Create a transpiler around a validator compiler
    #[must_use]
    pub fn new(compiler: ValidatorCompiler) -> Self {
        Self { compiler }
    }

    /// Create a transpiler from runtime configuration
    #[must_use]
    pub fn from_config(config: &StrataConfig) -> Self {
        Self::new(ValidatorCompiler::from_config(config))
    }

    /// Validator compiler used for every validator of every schema
    #[must_use]
    pub fn compiler(&self) -> &ValidatorCompiler {
        &self.compiler
    }

    /// Transpile a whole document.
    ///
    /// The model is named after the document. Transpiling the same document
    /// twice yields models with the same fields, validators and metadata.
    ///
    /// # Errors
    ///
    /// Returns the first loading, field type or forbidden capability error
    /// found in the document.
    pub fn transpile(&self, document: &SchemaDocument) -> Result<CompiledModel> {
        if document.name.trim().is_empty() {
            return Err(StrataError::schema_loading(
                "<unnamed>",
                "schema name must not be empty",
            ));
        }

        info!(
            schema = %document.name,
            version = %document.version,
            properties = document.properties.len(),
            "Transpiling schema"
        );

        let fields = self.transpile_properties(&document.name, &document.properties, &document.context)?;
        let validator = self.model_validator(
            format!("validate_{}", document.name.to_lowercase()),
            document.validator.as_ref(),
        )?;

        Ok(CompiledModel::new(
            document.name.clone(),
            document.version.clone(),
            document.description.clone(),
            document.context.clone(),
            fields,
            validator,
        ))
    }

    /// Transpile a property group into a nested model named after the property
    pub(crate) fn transpile_group(
        &self,
        name: &str,
        decl: &PropertyDecl,
        context: &Map<String, Value>,
    ) -> Result<CompiledModel> {
        let properties = decl.properties.as_ref().ok_or_else(|| {
            StrataError::schema_loading(name, "a property group must declare \"properties\"")
        })?;
        let fields = self.transpile_properties(name, properties, context)?;
        let validator =
            self.model_validator(GROUP_VALIDATOR_NAME.to_string(), decl.validator.as_ref())?;

        Ok(CompiledModel::new(
            name,
            String::new(),
            decl.description.clone(),
            context.clone(),
            fields,
            validator,
        ))
    }

    fn transpile_properties(
        &self,
        owner: &str,
        properties: &IndexMap<String, PropertyDecl>,
        context: &Map<String, Value>,
    ) -> Result<IndexMap<String, FieldDescriptor>> {
        let transpiler = PropertyTranspiler::new(self, owner, context);
        properties
            .iter()
            .map(|(name, decl)| Ok((name.clone(), transpiler.transpile(name, decl)?)))
            .collect()
    }

    fn model_validator(
        &self,
        name: String,
        spec: Option<&ValidatorSpec>,
    ) -> Result<Option<CompiledValidator>> {
        spec.map(|spec| {
            let raw = spec.normalize(ValidatorMode::Before);
            self.compiler
                .compile(ValidatorRequest::model(name, raw.source, raw.mode))
        })
        .transpose()
    }
}
