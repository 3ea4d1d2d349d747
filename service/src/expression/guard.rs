//! Capability guard for validator expressions
//!
//! Three checks share one deny-list:
//! - a textual screen over the raw source (`import os`, `from os import`, `os.`)
//! - a structural walk of the parsed program, which also catches names the
//!   textual screen cannot see, such as a bare `eval(...)` in a branch that
//!   never runs
//! - shadow bindings consulted by the evaluator before any other scope
//!
//! When the guard is disabled every check is skipped and the names resolve
//! like any other identifier.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::ast::{Expression, Program, Statement};
use super::error::{EvaluationError, ParseError};

/// Modules whose use is refused
pub const BLOCKED_MODULES: &[&str] = &[
    "os",
    "sys",
    "subprocess",
    "importlib",
    "pickle",
    "marshal",
    "shutil",
    "shlex",
    "inspect",
    "builtins",
    "ctypes",
    "socket",
    "pathlib",
    "io",
    "tempfile",
    "signal",
    "threading",
    "multiprocessing",
    "gc",
];

/// Dynamic lookup and introspection callables that are refused
pub const BLOCKED_CALLABLES: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "__import__",
    "getattr",
    "setattr",
    "delattr",
    "globals",
    "locals",
    "vars",
    "open",
    "breakpoint",
    "dir",
];

static MODULE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    BLOCKED_MODULES
        .iter()
        .filter_map(|module| {
            let escaped = regex::escape(module);
            let pattern = format!(
                r"(?:\bimport\s+{escaped}\b|\bfrom\s+{escaped}\b|(?:^|[^\w.]){escaped}\s*\.)"
            );
            Regex::new(&pattern).ok().map(|re| (*module, re))
        })
        .collect()
});

/// Whether an attribute name is a dunder (`__class__`, `__globals__`, ...)
#[must_use]
pub fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Shadow table over the deny-list
#[derive(Debug, Clone)]
pub struct IsolationGuard {
    enabled: bool,
    shadowed: HashSet<&'static str>,
}

impl IsolationGuard {
    /// Guard with the full deny-list active
    #[must_use]
    pub fn restricted() -> Self {
        Self {
            enabled: true,
            shadowed: BLOCKED_MODULES
                .iter()
                .chain(BLOCKED_CALLABLES)
                .copied()
                .collect(),
        }
    }

    /// Guard that allows everything
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            enabled: false,
            shadowed: HashSet::new(),
        }
    }

    /// Build from the `allow_unsafe_capabilities` setting
    #[must_use]
    pub fn from_allow_unsafe(allow_unsafe: bool) -> Self {
        if allow_unsafe {
            Self::unrestricted()
        } else {
            Self::restricted()
        }
    }

    /// Whether the guard is active
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `name` is shadowed
    #[must_use]
    pub fn is_shadowed(&self, name: &str) -> bool {
        self.enabled && self.shadowed.contains(name)
    }

    /// Refuse a shadowed name
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::ForbiddenCapability` if `name` is shadowed.
    pub fn check_name(&self, name: &str) -> Result<(), EvaluationError> {
        if self.is_shadowed(name) {
            return Err(EvaluationError::forbidden(name));
        }
        Ok(())
    }

    /// Refuse dunder attribute access
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::ForbiddenCapability` for dunder names.
    pub fn check_attribute(&self, name: &str) -> Result<(), EvaluationError> {
        if self.enabled && is_dunder(name) {
            return Err(EvaluationError::forbidden(name));
        }
        Ok(())
    }

    /// Textual pre-screen of raw source
    ///
    /// # Errors
    ///
    /// Returns `ParseError::ForbiddenCapability` naming the first module found.
    pub fn screen_source(&self, source: &str) -> Result<(), ParseError> {
        if !self.enabled {
            return Ok(());
        }
        for (module, pattern) in MODULE_PATTERNS.iter() {
            if pattern.is_match(source) {
                return Err(ParseError::ForbiddenCapability {
                    capability: (*module).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Structural screen of a parsed program
    ///
    /// # Errors
    ///
    /// Returns `ParseError::ForbiddenCapability` for the first shadowed name,
    /// shadowed import or dunder attribute found.
    pub fn screen_program(&self, program: &Program) -> Result<(), ParseError> {
        if !self.enabled {
            return Ok(());
        }
        program
            .statements
            .iter()
            .try_for_each(|s| self.screen_statement(s))
            .map_err(|e| match e {
                EvaluationError::ForbiddenCapability { capability } => {
                    ParseError::ForbiddenCapability { capability }
                }
                other => ParseError::ForbiddenCapability {
                    capability: other.to_string(),
                },
            })
    }

    fn screen_statement(&self, statement: &Statement) -> Result<(), EvaluationError> {
        match statement {
            Statement::Expr(expr) => self.screen_expression(expr),
            Statement::Assign { target, value } => {
                self.check_name(target)?;
                self.screen_expression(value)
            }
            Statement::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    self.screen_expression(condition)?;
                    body.iter().try_for_each(|s| self.screen_statement(s))?;
                }
                otherwise.iter().try_for_each(|s| self.screen_statement(s))
            }
            Statement::For {
                variable,
                iterable,
                body,
            } => {
                self.check_name(variable)?;
                self.screen_expression(iterable)?;
                body.iter().try_for_each(|s| self.screen_statement(s))
            }
            Statement::Raise { message, .. } => {
                message.as_ref().map_or(Ok(()), |m| self.screen_expression(m))
            }
            Statement::Assert { condition, message } => {
                self.screen_expression(condition)?;
                message.as_ref().map_or(Ok(()), |m| self.screen_expression(m))
            }
            Statement::Import(path) => path.first().map_or(Ok(()), |root| self.check_name(root)),
            Statement::Pass => Ok(()),
        }
    }

    fn screen_expression(&self, expr: &Expression) -> Result<(), EvaluationError> {
        match expr {
            Expression::Null
            | Expression::Boolean(_)
            | Expression::Integer(_)
            | Expression::Float(_)
            | Expression::String(_) => Ok(()),
            Expression::Variable(name) => self.check_name(name),
            Expression::Path(parts) => {
                if let Some(root) = parts.first() {
                    self.check_name(root)?;
                }
                parts.iter().skip(1).try_for_each(|p| self.check_attribute(p))
            }
            Expression::List(items) => items.iter().try_for_each(|e| self.screen_expression(e)),
            Expression::Binary { left, right, .. }
            | Expression::And(left, right)
            | Expression::Or(left, right)
            | Expression::Index {
                object: left,
                index: right,
            } => {
                self.screen_expression(left)?;
                self.screen_expression(right)
            }
            Expression::Compare { first, rest } => {
                self.screen_expression(first)?;
                rest.iter().try_for_each(|(_, e)| self.screen_expression(e))
            }
            Expression::Negate(inner) | Expression::Not(inner) => self.screen_expression(inner),
            Expression::Attribute { object, name } => {
                self.check_attribute(name)?;
                self.screen_expression(object)
            }
            Expression::Call { callee, args } => {
                self.screen_expression(callee)?;
                args.iter().try_for_each(|e| self.screen_expression(e))
            }
            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                self.screen_expression(condition)?;
                self.screen_expression(then_expr)?;
                self.screen_expression(else_expr)
            }
        }
    }
}

impl Default for IsolationGuard {
    fn default() -> Self {
        Self::restricted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::Parser;

    #[test]
    fn test_screen_source_modules() {
        let guard = IsolationGuard::restricted();
        for module in BLOCKED_MODULES {
            assert!(
                guard.screen_source(&format!("import {module}")).is_err(),
                "import of {module} passed the screen"
            );
            assert!(
                guard.screen_source(&format!("{module}.LOCK")).is_err(),
                "attribute access on {module} passed the screen"
            );
        }
        assert!(guard.screen_source("from os import path").is_err());
        assert!(guard.screen_source("print(os.listdir('/'))").is_err());
    }

    #[test]
    fn test_screen_source_word_boundaries() {
        let guard = IsolationGuard::restricted();
        assert!(guard.screen_source("if value.ios: pass").is_ok());
        assert!(guard.screen_source("cos = 1; import string").is_ok());
        assert!(guard.screen_source("bios.version").is_ok());
    }

    #[test]
    fn test_screen_program_catches_callables_and_dunders() {
        let guard = IsolationGuard::restricted();
        let parser = Parser::new();

        let program = parser
            .parse("if False:\n    eval('1 + 1')")
            .expect("Test operation failed");
        assert_eq!(
            guard.screen_program(&program),
            Err(ParseError::ForbiddenCapability {
                capability: "eval".to_string()
            })
        );

        let program = parser
            .parse("x = value.__class__")
            .expect("Test operation failed");
        assert!(guard.screen_program(&program).is_err());

        let program = parser
            .parse("if len(value) < 2: raise ValueError('short')")
            .expect("Test operation failed");
        assert!(guard.screen_program(&program).is_ok());
    }

    #[test]
    fn test_unrestricted_guard_allows_everything() {
        let guard = IsolationGuard::from_allow_unsafe(true);
        assert!(!guard.is_enabled());
        assert!(guard.screen_source("import os").is_ok());
        assert!(guard.check_name("eval").is_ok());
        assert!(guard.check_attribute("__class__").is_ok());
    }
}
