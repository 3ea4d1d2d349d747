//! YAML/JSON loader for schema documents

use std::path::Path;

use strata_core::{Result, SchemaDocument, StrataError};
use tracing::debug;

/// File extensions recognized as schema documents
pub const SCHEMA_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Source of schema documents
pub trait SchemaLoader {
    /// Loader name, used in logs
    fn name(&self) -> &'static str;

    /// Extensions this loader accepts, without the leading dot
    fn supported_extensions(&self) -> &[&str];

    /// Decode a document from text
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ParseError` for malformed documents.
    fn parse_str(&self, content: &str) -> Result<SchemaDocument>;

    /// Read and decode a document file
    ///
    /// # Errors
    ///
    /// Returns `StrataError::IoError` if the file cannot be read and
    /// `StrataError::ParseError` if it cannot be decoded.
    fn parse_file(&self, path: &Path) -> Result<SchemaDocument> {
        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content).map_err(|e| match e {
            StrataError::ParseError { message, location } => StrataError::ParseError {
                message: format!("{}: {message}", path.display()),
                location,
            },
            other => other,
        })
    }

    /// Whether `path` has an extension this loader accepts
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.supported_extensions()
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(ext))
            })
    }
}

/// Loader for YAML documents. JSON input is accepted as a YAML subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlSchemaLoader;

impl YamlSchemaLoader {
    /// Create a new loader
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SchemaLoader for YamlSchemaLoader {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn supported_extensions(&self) -> &[&str] {
        SCHEMA_EXTENSIONS
    }

    fn parse_str(&self, content: &str) -> Result<SchemaDocument> {
        let document: SchemaDocument = serde_yaml::from_str(content)?;
        debug!(
            loader = self.name(),
            schema = %document.name,
            properties = document.properties.len(),
            "Parsed schema document"
        );
        Ok(document)
    }
}
