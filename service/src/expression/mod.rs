//! Restricted expression language for validator sources
//!
//! Validator text is screened, parsed into a [`Program`] and run by the
//! crate's own interpreter. No host capability is reachable from a program;
//! the [`IsolationGuard`] additionally refuses a fixed deny-list of names.

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod guard;
pub mod parser;
pub mod value;

use std::sync::Arc;

use strata_core::StrataConfig;

pub use ast::{Expression, Program, Statement};
pub use error::{EvaluationError, ExpressionError, ParseError};
pub use evaluator::{Evaluator, Scope};
pub use functions::{CustomFunction, FunctionError, FunctionRegistry};
pub use guard::{BLOCKED_CALLABLES, BLOCKED_MODULES, IsolationGuard};
pub use parser::Parser;

/// Screens, parses and runs validator programs
#[derive(Debug, Clone)]
pub struct ExpressionEngine {
    parser: Parser,
    evaluator: Arc<Evaluator>,
}

impl ExpressionEngine {
    /// Create an engine with default limits and a restricted guard
    #[must_use]
    pub fn new() -> Self {
        Self::with_evaluator(Arc::new(Evaluator::new()))
    }

    /// Create an engine around an existing evaluator
    #[must_use]
    pub fn with_evaluator(evaluator: Arc<Evaluator>) -> Self {
        let limits = evaluator.limits();
        Self {
            parser: Parser::with_limits(limits.max_call_depth, limits.max_source_length),
            evaluator,
        }
    }

    /// Create an engine from the runtime configuration
    #[must_use]
    pub fn from_config(config: &StrataConfig) -> Self {
        let evaluator = Evaluator::new()
            .with_limits(config.evaluator)
            .with_guard(IsolationGuard::from_allow_unsafe(
                config.allow_unsafe_capabilities,
            ));
        Self::with_evaluator(Arc::new(evaluator))
    }

    /// The guard applied at compile and run time
    #[must_use]
    pub fn guard(&self) -> &IsolationGuard {
        self.evaluator.guard()
    }

    /// Shared evaluator
    #[must_use]
    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }

    /// Screen and parse validator source
    ///
    /// # Errors
    ///
    /// Returns `ParseError::ForbiddenCapability` when either screen finds a
    /// deny-listed name, or another `ParseError` for malformed source.
    pub fn compile(&self, source: &str) -> Result<Program, ParseError> {
        self.guard().screen_source(source)?;
        let program = self.parser.parse(source)?;
        self.guard().screen_program(&program)?;
        Ok(program)
    }

    /// Run a compiled program
    ///
    /// # Errors
    ///
    /// Returns the `EvaluationError` raised by the program.
    pub fn run(&self, program: &Program, bindings: Scope) -> Result<Scope, EvaluationError> {
        self.evaluator.run(program, bindings)
    }

    /// Compile and evaluate a single expression
    ///
    /// # Errors
    ///
    /// Returns an `ExpressionError` if screening, parsing or evaluation fails.
    pub fn evaluate(&self, expression: &str, bindings: &Scope) -> Result<serde_json::Value, ExpressionError> {
        self.guard().screen_source(expression)?;
        let ast = self.parser.parse_expression(expression)?;
        self.guard().screen_program(&Program {
            statements: vec![Statement::Expr(ast.clone())],
        })?;
        Ok(self.evaluator.evaluate(&ast, bindings)?)
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}
