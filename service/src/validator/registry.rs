//! Registry of compiled schemas
//!
//! Readers take a snapshot of the whole map; writers publish a new map. A
//! reload therefore swaps every schema at once and readers never observe a
//! partially populated registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use strata_core::{Result, StrataError};
use tracing::{debug, info};

use super::SchemaFactory;
use crate::model::CompiledModel;

type SchemaMap = BTreeMap<String, Arc<SchemaFactory>>;

/// Name to factory mapping shared by readers
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: ArcSwap<SchemaMap>,
    /// Serializes writers so concurrent loads do not drop each other's entries
    write_lock: Mutex<()>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: ArcSwap::from_pointee(SchemaMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Register a compiled model, replacing any schema of the same name
    pub fn load(&self, model: CompiledModel) -> Arc<SchemaFactory> {
        let factory = Arc::new(SchemaFactory::new(Arc::new(model)));
        let _guard = self.write_lock.lock();
        let mut next = SchemaMap::clone(&self.schemas.load());
        if next
            .insert(factory.name().to_string(), Arc::clone(&factory))
            .is_some()
        {
            debug!(schema = %factory.name(), "Replaced registered schema");
        }
        self.schemas.store(Arc::new(next));
        factory
    }

    /// Replace every registered schema at once
    pub fn reload(&self, models: impl IntoIterator<Item = CompiledModel>) {
        let next: SchemaMap = models
            .into_iter()
            .map(|model| {
                let factory = Arc::new(SchemaFactory::new(Arc::new(model)));
                (factory.name().to_string(), factory)
            })
            .collect();
        let _guard = self.write_lock.lock();
        info!(schemas = next.len(), "Reloaded schema registry");
        self.schemas.store(Arc::new(next));
    }

    /// Factory for a schema
    ///
    /// # Errors
    ///
    /// Returns `StrataError::SchemaNotFound` if the name is not registered.
    pub fn get(&self, name: &str) -> Result<Arc<SchemaFactory>> {
        self.schemas
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| StrataError::SchemaNotFound(name.to_string()))
    }

    /// Whether a schema is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.load().contains_key(name)
    }

    /// Snapshot of every registered schema's model
    #[must_use]
    pub fn available(&self) -> BTreeMap<String, Arc<CompiledModel>> {
        self.schemas
            .load()
            .iter()
            .map(|(name, factory)| (name.clone(), Arc::clone(factory.model())))
            .collect()
    }

    /// Number of registered schemas
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.load().len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.load().is_empty()
    }
}
