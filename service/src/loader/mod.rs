//! Schema document loading and discovery

pub mod discovery;
pub mod yaml;

pub use discovery::{DiscoveredSchema, SchemaDiscovery};
pub use yaml::{SCHEMA_EXTENSIONS, SchemaLoader, YamlSchemaLoader};
