//! # Strata Core
//!
//! Plain data for Strata schema validation: schema document types, validation
//! records, the error taxonomy and configuration.
//!
//! Nothing in this crate executes validators. Compilation and the validation
//! runtime live in `strata-service`.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Error types for Strata operations
pub mod error;

/// Schema document types
pub mod types;

/// Configuration types
pub mod config;

/// Validation records and results
pub mod validation;

pub use config::{EvaluatorLimits, StrataConfig};
pub use error::{DiscoveryErrorKind, Result, StrataError};
pub use serde_json::Value;
pub use types::{
    PropertyDecl, PropertyKind, RawValidator, SchemaDocument, ValidatorMode, ValidatorSpec,
};
pub use validation::{ErrorAccumulator, FieldError, MODEL_SENTINEL, ValidationResults};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EvaluatorLimits, StrataConfig};
    pub use crate::error::{Result, StrataError};
    pub use crate::types::*;
    pub use crate::validation::*;
}
