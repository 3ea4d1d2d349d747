//! Error types for Strata operations
//!
//! Schema problems (bad structure, forbidden validator capabilities) are loud
//! errors raised from loading. Problems with end-user data never appear here;
//! they are reported as [`FieldError`] records inside
//! [`ValidationResults`](crate::validation::ValidationResults).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::validation::FieldError;

/// Cause of a failed schema discovery walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryErrorKind {
    /// The schema root does not exist
    NotFound,
    /// The schema root is a file, not a directory
    NotADirectory,
    /// The schema root (or an entry below it) cannot be read
    PermissionDenied,
    /// No schema root was configured
    NotConfigured,
    /// Any other I/O failure while walking
    Other,
}

impl DiscoveryErrorKind {
    /// Human-readable cause used in error messages and logs
    #[must_use]
    pub fn cause(self) -> &'static str {
        match self {
            Self::NotFound => "Schema path does not exist",
            Self::NotADirectory => "Schema path is not a directory",
            Self::PermissionDenied => "Permission denied while reading the schema path",
            Self::NotConfigured => "No schema path configured",
            Self::Other => "Error while discovering schemas",
        }
    }

    /// Classify an I/O error kind
    #[must_use]
    pub fn from_io(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::NotADirectory => Self::NotADirectory,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DiscoveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cause())
    }
}

/// Main error type for Strata operations
#[derive(Error, Debug)]
pub enum StrataError {
    /// The schema document is structurally invalid
    #[error("Failed to load schema '{schema}': {message}")]
    SchemaLoading {
        /// Schema (or property path) being loaded
        schema: String,
        /// Error message
        message: String,
    },

    /// A property declares a type that cannot be resolved
    #[error("{message}")]
    IncorrectFieldType {
        /// The offending type name
        field_type: String,
        /// Error message
        message: String,
    },

    /// A validator expression tried to use a deny-listed capability
    #[error("Forbidden module use in validator '{validator}': {capability}")]
    ForbiddenCapability {
        /// Name of the capability that was blocked
        capability: String,
        /// Validator in which the attempt happened
        validator: String,
    },

    /// Walking the schema root failed
    #[error("{kind}: {}", .path.as_ref().map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()))]
    Discovery {
        /// Root that was being walked
        path: Option<PathBuf>,
        /// Classified cause
        kind: DiscoveryErrorKind,
    },

    /// Requested schema is not registered
    #[error("Schema {0} not found")]
    SchemaNotFound(String),

    /// Typed construction was attempted with invalid data
    #[error("Cannot construct '{model}': {} validation error(s)", .errors.len())]
    Construction {
        /// Model name
        model: String,
        /// Every error collected during the attempt
        errors: Vec<FieldError>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Document parsing errors
    #[error("Failed to parse schema document: {message}")]
    ParseError {
        /// Error message
        message: String,
        /// Location in the document if available
        location: Option<String>,
    },

    /// IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for Strata operations
pub type Result<T> = std::result::Result<T, StrataError>;

impl StrataError {
    /// Create a new schema loading error
    #[must_use]
    pub fn schema_loading(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaLoading {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Create the error for an unusable field type.
    ///
    /// `dict` and `object` get a hint towards nested `properties`, since that
    /// is almost always what the author meant.
    #[must_use]
    pub fn incorrect_field_type(field_type: impl Into<String>) -> Self {
        let field_type = field_type.into();
        let message = if matches!(field_type.as_str(), "dict" | "object") {
            format!("Instead of using {field_type}, declare the \"properties\" key")
        } else {
            format!("Invalid field type: {field_type}")
        };
        Self::IncorrectFieldType {
            field_type,
            message,
        }
    }

    /// Create a forbidden capability error
    #[must_use]
    pub fn forbidden(capability: impl Into<String>, validator: impl Into<String>) -> Self {
        Self::ForbiddenCapability {
            capability: capability.into(),
            validator: validator.into(),
        }
    }

    /// Create a discovery error
    #[must_use]
    pub fn discovery(path: Option<PathBuf>, kind: DiscoveryErrorKind) -> Self {
        Self::Discovery { path, kind }
    }

    /// Create a new parse error
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: None,
        }
    }

    /// Create a new parse error with location
    #[must_use]
    pub fn parse_at(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Whether this error is the sandbox refusing a capability
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::ForbiddenCapability { .. })
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for StrataError {
    fn from(err: serde_yaml::Error) -> Self {
        match err.location() {
            Some(l) => Self::parse_at(
                err.to_string(),
                format!("line {}, column {}", l.line(), l.column()),
            ),
            None => Self::parse(err.to_string()),
        }
    }
}
