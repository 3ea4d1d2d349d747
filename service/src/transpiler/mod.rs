//! Schema transpilation
//!
//! [`SchemaTranspiler`] walks a schema document's property tree with
//! [`PropertyTranspiler`], compiling every validator through
//! [`ValidatorCompiler`], and assembles a [`crate::model::CompiledModel`].

pub mod compiler;
pub mod property;
pub mod schema;
pub mod types;

pub use compiler::{CompiledValidator, ValidatorCompiler, ValidatorKind, ValidatorRequest};
pub use property::PropertyTranspiler;
pub use schema::SchemaTranspiler;
pub use types::{Constraint, FieldType, ScalarType};
