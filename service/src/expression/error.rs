//! Error types for the validator expression language
//!
//! Parse errors surface as schema loading errors. Evaluation errors become
//! field error records, except [`EvaluationError::ForbiddenCapability`], which
//! always propagates.

use thiserror::Error;

/// Main error type for expression operations
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// Error during parsing
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error during evaluation
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl ExpressionError {
    /// Name of the blocked capability, if this is a guard rejection
    #[must_use]
    pub fn forbidden_capability(&self) -> Option<&str> {
        match self {
            Self::Parse(ParseError::ForbiddenCapability { capability })
            | Self::Evaluation(EvaluationError::ForbiddenCapability { capability }) => {
                Some(capability)
            }
            Self::Parse(_) | Self::Evaluation(_) => None,
        }
    }
}

/// Errors that can occur while screening and parsing validator source
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Source mentions a deny-listed capability
    #[error("Forbidden capability '{capability}'")]
    ForbiddenCapability {
        /// The capability that matched
        capability: String,
    },

    /// Unexpected end of input
    #[error("Unexpected end of input on line {line}")]
    UnexpectedEof {
        /// Line where parsing stopped
        line: usize,
    },

    /// Unexpected token
    #[error("Unexpected token '{token}' on line {line}")]
    UnexpectedToken {
        /// The unexpected token that was encountered
        token: String,
        /// Line of the token
        line: usize,
    },

    /// Unexpected character in the source text
    #[error("Unexpected character '{ch}' on line {line}")]
    UnexpectedChar {
        /// Offending character
        ch: char,
        /// Line of the character
        line: usize,
    },

    /// Invalid number format
    #[error("Invalid number '{value}' on line {line}")]
    InvalidNumber {
        /// The numeric text that couldn't be parsed
        value: String,
        /// Line of the number
        line: usize,
    },

    /// Invalid string literal
    #[error("Invalid string literal on line {line}: {reason}")]
    InvalidString {
        /// Line where the string starts
        line: usize,
        /// Reason why the string is invalid
        reason: String,
    },

    /// Invalid `{name.path}` reference
    #[error("Invalid variable reference '{name}' on line {line}")]
    InvalidVariable {
        /// The text inside the braces
        name: String,
        /// Line of the reference
        line: usize,
    },

    /// Missing closing delimiter
    #[error("Missing closing '{delimiter}' on line {line}")]
    MissingDelimiter {
        /// The delimiter that was expected
        delimiter: char,
        /// Line where it was expected
        line: usize,
    },

    /// Dedent to a column that matches no open block
    #[error("Inconsistent indentation on line {line}")]
    InconsistentIndent {
        /// Offending line
        line: usize,
    },

    /// Indented block where none is allowed
    #[error("Unexpected indent on line {line}")]
    UnexpectedIndent {
        /// Offending line
        line: usize,
    },

    /// Invalid assignment target
    #[error("Cannot assign to expression on line {line}")]
    InvalidAssignment {
        /// Line of the assignment
        line: usize,
    },

    /// Expression too deep
    #[error("Expression nesting depth {depth} exceeds maximum of {max}")]
    TooDeep {
        /// Current nesting depth
        depth: usize,
        /// Maximum allowed nesting depth
        max: usize,
    },

    /// Source too long
    #[error("Validator source length {length} exceeds maximum of {max}")]
    TooLong {
        /// Source length in bytes
        length: usize,
        /// Maximum allowed length
        max: usize,
    },
}

/// Errors that can occur during evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// The validator raised (or failed an assertion)
    #[error("{message}")]
    Raised {
        /// Raised error class name, e.g. `ValueError`
        kind: String,
        /// Raised message
        message: String,
    },

    /// A shadowed capability was resolved, called, imported or a dunder
    /// attribute was read
    #[error("Forbidden capability '{capability}'")]
    ForbiddenCapability {
        /// Name of the blocked capability
        capability: String,
    },

    /// Variable not found in scope
    #[error("Undefined variable '{name}'")]
    UndefinedVariable {
        /// Name that failed to resolve
        name: String,
    },

    /// Attribute or key missing on a value
    #[error("'{type_name}' value has no attribute '{name}'")]
    MissingAttribute {
        /// Type of the receiver
        type_name: String,
        /// Attribute name
        name: String,
    },

    /// Index outside the bounds of a sequence
    #[error("Index {index} out of range")]
    IndexOutOfRange {
        /// Requested index
        index: i64,
    },

    /// Import of a module that is not provided
    #[error("No module named '{name}'")]
    UnknownModule {
        /// Module path
        name: String,
    },

    /// Type mismatch in operation
    #[error("Type error: {message}")]
    TypeError {
        /// Description of the type error
        message: String,
    },

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Function evaluation error
    #[error("Function '{name}' error: {message}")]
    FunctionError {
        /// Name of the function that failed
        name: String,
        /// Error message from the function
        message: String,
    },

    /// Too many steps
    #[error("Validator exceeded maximum iterations ({max})")]
    TooManyIterations {
        /// Maximum number of steps allowed
        max: usize,
    },

    /// Nesting too deep
    #[error("Validator exceeded maximum call depth ({max})")]
    CallStackTooDeep {
        /// Maximum depth allowed
        max: usize,
    },

    /// Overflow or non-finite result in numeric operation
    #[error("Numeric overflow in operation")]
    NumericOverflow,
}

impl EvaluationError {
    /// Create a type error for binary operations
    #[must_use]
    pub fn binary_type_error(op: &str, left: &str, right: &str) -> Self {
        Self::TypeError {
            message: format!("Cannot {op} values of type {left} and {right}"),
        }
    }

    /// Create a type error for unary operations
    #[must_use]
    pub fn unary_type_error(op: &str, value: &str) -> Self {
        Self::TypeError {
            message: format!("Cannot {op} value of type {value}"),
        }
    }

    /// Create a raised error
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create a forbidden capability error
    pub fn forbidden(capability: impl Into<String>) -> Self {
        Self::ForbiddenCapability {
            capability: capability.into(),
        }
    }

    /// Whether the error must propagate instead of becoming a field error
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::ForbiddenCapability { .. })
    }
}
