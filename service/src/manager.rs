//! Schema manager
//!
//! Owns the configuration, the transpiler and the schema registry. Create one
//! with [`Manager::start`] and share it (for example in an `Arc`); there is no
//! process-wide instance.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use strata_core::{Result, SchemaDocument, StrataConfig, ValidationResults};
use tracing::{info, warn};

use crate::loader::{SchemaDiscovery, SchemaLoader, YamlSchemaLoader};
use crate::model::{CompiledModel, Instance};
use crate::transpiler::SchemaTranspiler;
use crate::validator::{SchemaFactory, SchemaRegistry};

/// Entry point for loading schemas and validating data against them
#[derive(Debug)]
pub struct Manager {
    config: StrataConfig,
    transpiler: SchemaTranspiler,
    discovery: SchemaDiscovery<YamlSchemaLoader>,
    registry: SchemaRegistry,
}

impl Manager {
    /// Create a manager with an empty registry, without running discovery
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ConfigError` for invalid evaluator limits.
    pub fn new(config: StrataConfig) -> Result<Self> {
        config.validate()?;
        if config.allow_unsafe_capabilities {
            warn!("Unsafe validator capabilities are enabled");
        }
        Ok(Self {
            transpiler: SchemaTranspiler::from_config(&config),
            discovery: SchemaDiscovery::new(YamlSchemaLoader::new()),
            registry: SchemaRegistry::new(),
            config,
        })
    }

    /// Create a manager and load every schema under the configured root,
    /// unless discovery is disabled.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Discovery` if the root is unset or unusable and
    /// the loading error of the first schema that fails to transpile.
    pub fn start(config: StrataConfig) -> Result<Self> {
        info!("Starting Strata manager");
        let manager = Self::new(config)?;
        if manager.config.disable_discovery {
            info!("Schema discovery disabled");
        } else {
            manager.reload()?;
        }
        Ok(manager)
    }

    /// Start from the `STRATA__*` environment variables
    ///
    /// # Errors
    ///
    /// See [`Manager::start`].
    pub fn start_from_env() -> Result<Self> {
        Self::start(StrataConfig::from_env())
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    /// Transpile a document and register it under its name, replacing any
    /// schema with the same name. Returns the registered name.
    ///
    /// # Errors
    ///
    /// Returns the transpiler's loading, field type or forbidden capability
    /// error; the registry is left unchanged.
    pub fn load_schema(&self, document: &SchemaDocument) -> Result<String> {
        info!(schema = %document.name, "Loading schema");
        let model = self.transpiler.transpile(document)?;
        Ok(self.registry.load(model).name().to_string())
    }

    /// Read a document file and register it
    ///
    /// # Errors
    ///
    /// Returns the loader's I/O or parse error, or any [`Manager::load_schema`] error.
    pub fn load_schema_file(&self, path: &Path) -> Result<String> {
        let document = YamlSchemaLoader::new().parse_file(path)?;
        self.load_schema(&document)
    }

    /// Validate `data` against a registered schema
    ///
    /// # Errors
    ///
    /// Returns `StrataError::SchemaNotFound` for unknown names and
    /// `StrataError::ForbiddenCapability` if a validator trips the guard.
    /// Invalid data is reported in the results, never as an error.
    pub fn validate(&self, data: &Value, schema: &str) -> Result<ValidationResults> {
        info!(schema, "Validating data against schema");
        self.get_factory(schema)?.validate(data)
    }

    /// Validate `data` and construct an instance when it is valid; invalid
    /// data yields `Ok(None)` and leaves the errors on the schema's factory.
    ///
    /// # Errors
    ///
    /// See [`Manager::validate`].
    pub fn build(&self, data: &Value, schema: &str) -> Result<Option<Instance>> {
        self.get_factory(schema)?.build(data)
    }

    /// Factory for a registered schema
    ///
    /// # Errors
    ///
    /// Returns `StrataError::SchemaNotFound` for unknown names.
    pub fn get_factory(&self, name: &str) -> Result<Arc<SchemaFactory>> {
        self.registry.get(name)
    }

    /// Compiled model of a registered schema
    ///
    /// # Errors
    ///
    /// Returns `StrataError::SchemaNotFound` for unknown names.
    pub fn get_model(&self, name: &str) -> Result<Arc<CompiledModel>> {
        self.get_factory(name).map(|factory| Arc::clone(factory.model()))
    }

    /// Snapshot of every registered schema
    #[must_use]
    pub fn get_available_schemas(&self) -> BTreeMap<String, Arc<CompiledModel>> {
        self.registry.available()
    }

    /// Rediscover the schema root and swap the registry in one step.
    ///
    /// Every document is transpiled before the swap, so a failing reload
    /// leaves the previous schemas in place. Returns the loaded names.
    ///
    /// # Errors
    ///
    /// Returns discovery errors and the first transpilation error.
    pub fn reload(&self) -> Result<Vec<String>> {
        let discovered = self.discovery.discover(self.config.schema_path.as_deref())?;
        let mut models: BTreeMap<String, CompiledModel> = BTreeMap::new();
        for schema in discovered {
            let model = self.transpiler.transpile(&schema.document)?;
            if models.contains_key(model.name()) {
                warn!(
                    schema = %model.name(),
                    path = %schema.path.display(),
                    "Duplicate schema name; the later file wins"
                );
            }
            models.insert(model.name().to_string(), model);
        }

        let names: Vec<String> = models.keys().cloned().collect();
        self.registry.reload(models.into_values());
        info!(schemas = %names.join(", "), "Available schemas");
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_core::{PropertyDecl, StrataError};

    fn manager() -> Manager {
        Manager::start(StrataConfig::default().without_discovery()).expect("Test operation failed")
    }

    #[test]
    fn test_load_and_validate() {
        let manager = manager();
        let document = SchemaDocument::new("Tag", "1").with_property("label", PropertyDecl::leaf("str"));
        assert_eq!(manager.load_schema(&document).expect("Test operation failed"), "Tag");

        let results = manager
            .validate(&json!({"label": "x"}), "Tag")
            .expect("Test operation failed");
        assert!(results.valid);
        assert_eq!(manager.get_model("Tag").expect("Test operation failed").name(), "Tag");
        assert_eq!(manager.get_available_schemas().len(), 1);

        let instance = manager
            .build(&json!({"label": "x"}), "Tag")
            .expect("Test operation failed");
        assert_eq!(instance.map(|i| i.model), Some("Tag".to_string()));
        assert!(
            manager
                .build(&json!({"label": 1}), "Tag")
                .expect("Test operation failed")
                .is_none()
        );
        assert_eq!(
            manager.get_factory("Tag").expect("Test operation failed").last_errors().len(),
            1
        );
    }

    #[test]
    fn test_unknown_schema() {
        let err = manager()
            .validate(&json!({}), "Missing")
            .expect_err("unknown schema");
        assert_eq!(err.to_string(), "Schema Missing not found");
    }

    #[test]
    fn test_start_requires_root_when_discovering() {
        let err = Manager::start(StrataConfig::default()).expect_err("no root");
        assert!(matches!(err, StrataError::Discovery { .. }));
    }

    #[test]
    fn test_failed_load_leaves_registry_unchanged() {
        let manager = manager();
        let bad = SchemaDocument::new("Bad", "1").with_property("meta", PropertyDecl::leaf("dict"));
        assert!(manager.load_schema(&bad).is_err());
        assert!(manager.get_available_schemas().is_empty());
    }
}
