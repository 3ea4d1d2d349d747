//! # Strata Service
//!
//! Turns declarative schema documents into executable validation models.
//!
//! A schema document declares typed properties, optional nested property
//! groups, constraints and small validator snippets written in a restricted
//! Python-like expression language. The [`transpiler`] compiles a document
//! into a [`model::CompiledModel`]; the [`validator`] facade runs data
//! through it and reports every violation as a structured record instead of
//! failing.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use strata_service::prelude::*;
//!
//! let manager = Manager::start(StrataConfig::default().without_discovery())?;
//! let document = SchemaDocument::new("Person", "1.0").with_property(
//!     "age",
//!     PropertyDecl::leaf("int")
//!         .with_validator("if value < 18:\n    raise ValueError('Age must be at least 18')"),
//! );
//! manager.load_schema(&document)?;
//!
//! let results = manager.validate(&json!({"age": 10}), "Person")?;
//! assert!(!results.valid);
//! assert_eq!(results.errors[0].field, "age");
//! # Ok::<(), strata_service::StrataError>(())
//! ```
//!
//! ## Validator isolation
//!
//! Validator source is screened when it is compiled and again while it
//! runs. Names such as `os`, `subprocess`, `open` or `eval` fail with
//! [`StrataError::ForbiddenCapability`] unless
//! `allow_unsafe_capabilities` is set in [`StrataConfig`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)] // subjective determination
#![allow(clippy::cast_precision_loss)] // int/float arithmetic in the evaluator
#![allow(clippy::match_same_arms)] // explicit matching can improve clarity
#![allow(clippy::too_many_lines)] // the evaluator's dispatch matches

/// Restricted expression language used by validators
pub mod expression;

/// Schema document to compiled model transpilation
pub mod transpiler;

/// Compiled models and the validation pipeline
pub mod model;

/// Validation facade and schema registry
pub mod validator;

/// Schema document loading and discovery
pub mod loader;

/// Schema manager
pub mod manager;

pub use manager::Manager;
pub use model::{CompiledModel, Instance};
pub use strata_core::{
    FieldError, PropertyDecl, Result, SchemaDocument, StrataConfig, StrataError,
    ValidationResults, ValidatorMode,
};
pub use transpiler::SchemaTranspiler;
pub use validator::{SchemaFactory, SchemaRegistry};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::loader::{SchemaDiscovery, SchemaLoader, YamlSchemaLoader};
    pub use crate::manager::Manager;
    pub use crate::model::{CompiledModel, Instance};
    pub use crate::transpiler::SchemaTranspiler;
    pub use crate::validator::{SchemaFactory, SchemaRegistry};
    pub use strata_core::prelude::*;
}
