//! Abstract syntax tree for validator expressions

use std::fmt;

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `//`
    FloorDivide,
    /// `%`
    Modulo,
}

impl BinaryOp {
    /// Verb used in type error messages
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::FloorDivide => "floor-divide",
            Self::Modulo => "take the modulo of",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::FloorDivide => "//",
            Self::Modulo => "%",
        })
    }
}

/// Comparison operators; these chain like `0 <= x < 10`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessOrEqual,
    /// `>=`
    GreaterOrEqual,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `is`
    Is,
    /// `is not`
    IsNot,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
        })
    }
}

/// An expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `None` / `null`
    Null,
    /// Boolean literal
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Float literal
    Float(f64),
    /// String literal
    String(String),
    /// List literal (also used for parenthesised tuples)
    List(Vec<Expression>),

    /// Bare name
    Variable(String),
    /// `{a.b.c}` reference
    Path(Vec<String>),

    /// Arithmetic
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// Chained comparison
    Compare {
        /// First operand
        first: Box<Expression>,
        /// Operator/operand pairs applied left to right
        rest: Vec<(CompareOp, Expression)>,
    },
    /// Unary minus
    Negate(Box<Expression>),
    /// Short-circuit `and`
    And(Box<Expression>, Box<Expression>),
    /// Short-circuit `or`
    Or(Box<Expression>, Box<Expression>),
    /// `not`
    Not(Box<Expression>),

    /// `object.name`
    Attribute {
        /// Receiver
        object: Box<Expression>,
        /// Attribute name
        name: String,
    },
    /// `object[index]`
    Index {
        /// Receiver
        object: Box<Expression>,
        /// Index expression
        index: Box<Expression>,
    },
    /// `callee(args)`; a `Variable` callee is a function, an `Attribute`
    /// callee is a method call
    Call {
        /// Called expression
        callee: Box<Expression>,
        /// Positional arguments
        args: Vec<Expression>,
    },
    /// `then_expr if condition else else_expr`
    Conditional {
        /// Condition to evaluate
        condition: Box<Expression>,
        /// Value when the condition holds
        then_expr: Box<Expression>,
        /// Value otherwise
        else_expr: Box<Expression>,
    },
}

impl Expression {
    /// Create a variable reference
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Create a string literal
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Create a call to a named function
    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Call {
            callee: Box::new(Self::Variable(name.into())),
            args,
        }
    }

    /// Depth of the expression tree
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Null
            | Self::Boolean(_)
            | Self::Integer(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Variable(_)
            | Self::Path(_) => 1,

            Self::List(items) => 1 + items.iter().map(Self::depth).max().unwrap_or(0),

            Self::Negate(expr) | Self::Not(expr) | Self::Attribute { object: expr, .. } => {
                1 + expr.depth()
            }

            Self::Binary { left, right, .. }
            | Self::And(left, right)
            | Self::Or(left, right)
            | Self::Index {
                object: left,
                index: right,
            } => 1 + left.depth().max(right.depth()),

            Self::Compare { first, rest } => {
                1 + rest
                    .iter()
                    .map(|(_, e)| e.depth())
                    .fold(first.depth(), usize::max)
            }

            Self::Call { callee, args } => {
                1 + args.iter().map(Self::depth).fold(callee.depth(), usize::max)
            }

            Self::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                1 + condition
                    .depth()
                    .max(then_expr.depth())
                    .max(else_expr.depth())
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Boolean(true) => write!(f, "True"),
            Self::Boolean(false) => write!(f, "False"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Self::Variable(name) => write!(f, "{name}"),
            Self::Path(parts) => write!(f, "{{{}}}", parts.join(".")),
            Self::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            Self::Compare { first, rest } => {
                write!(f, "({first}")?;
                for (op, operand) in rest {
                    write!(f, " {op} {operand}")?;
                }
                write!(f, ")")
            }
            Self::Negate(expr) => write!(f, "-{expr}"),
            Self::And(left, right) => write!(f, "({left} and {right})"),
            Self::Or(left, right) => write!(f, "({left} or {right})"),
            Self::Not(expr) => write!(f, "not {expr}"),
            Self::Attribute { object, name } => write!(f, "{object}.{name}"),
            Self::Index { object, index } => write!(f, "{object}[{index}]"),
            Self::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Self::Conditional {
                condition,
                then_expr,
                else_expr,
            } => write!(f, "({then_expr} if {condition} else {else_expr})"),
        }
    }
}

/// A statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Expression evaluated for its effect (or its error)
    Expr(Expression),
    /// `name = value`
    Assign {
        /// Bound name
        target: String,
        /// Assigned expression
        value: Expression,
    },
    /// `if` / `elif` / `else`
    If {
        /// Condition and body for `if` and each `elif`
        branches: Vec<(Expression, Vec<Statement>)>,
        /// `else` body, empty when absent
        otherwise: Vec<Statement>,
    },
    /// `for name in iterable:`
    For {
        /// Loop variable
        variable: String,
        /// Iterated expression
        iterable: Expression,
        /// Loop body
        body: Vec<Statement>,
    },
    /// `raise Kind(message)`
    Raise {
        /// Error class name
        kind: String,
        /// Message expression
        message: Option<Expression>,
    },
    /// `assert condition, message`
    Assert {
        /// Asserted condition
        condition: Expression,
        /// Failure message
        message: Option<Expression>,
    },
    /// `import a.b`
    Import(Vec<String>),
    /// `pass`
    Pass,
}

/// A parsed validator body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Top-level statements in source order
    pub statements: Vec<Statement>,
}

impl Program {
    /// Append another program's statements after this one's
    #[must_use]
    pub fn then(mut self, other: Program) -> Self {
        self.statements.extend(other.statements);
        self
    }

    /// Whether the program does nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.iter().all(|s| matches!(s, Statement::Pass))
    }
}
