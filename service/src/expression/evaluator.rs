//! Statement interpreter for validator programs

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use strata_core::config::EvaluatorLimits;

use super::ast::{BinaryOp, CompareOp, Expression, Program, Statement};
use super::error::EvaluationError;
use super::functions::{FunctionRegistry, contains};
use super::guard::IsolationGuard;
use super::value::{
    compare_values, display, float_value, is_truthy, iterate, matches_type, repr, type_name,
    values_equal,
};

/// Variables visible to a program, in binding order
pub type Scope = IndexMap<String, Value>;

/// Interpreter with safety limits and a capability guard
#[derive(Debug, Clone)]
pub struct Evaluator {
    limits: EvaluatorLimits,
    guard: IsolationGuard,
    functions: Arc<FunctionRegistry>,
}

impl Evaluator {
    /// Create an evaluator with default limits and a restricted guard
    #[must_use]
    pub fn new() -> Self {
        Self {
            limits: EvaluatorLimits::default(),
            guard: IsolationGuard::restricted(),
            functions: Arc::new(FunctionRegistry::new_restricted()),
        }
    }

    /// Replace the resource limits
    #[must_use]
    pub fn with_limits(mut self, limits: EvaluatorLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the capability guard
    #[must_use]
    pub fn with_guard(mut self, guard: IsolationGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Use a shared function registry
    #[must_use]
    pub fn with_functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    /// Resource limits in effect
    #[must_use]
    pub fn limits(&self) -> &EvaluatorLimits {
        &self.limits
    }

    /// Capability guard in effect
    #[must_use]
    pub fn guard(&self) -> &IsolationGuard {
        &self.guard
    }

    /// Run a program and return the final scope
    ///
    /// # Errors
    ///
    /// Returns the first `EvaluationError` raised by the program, including
    /// explicit `raise`/`assert` failures and limit violations.
    pub fn run(&self, program: &Program, bindings: Scope) -> Result<Scope, EvaluationError> {
        let mut ctx = EvalContext {
            locals: bindings,
            steps: 0,
            depth: 0,
            limits: &self.limits,
            guard: &self.guard,
            functions: &self.functions,
        };
        ctx.exec_block(&program.statements)?;
        Ok(ctx.locals)
    }

    /// Evaluate a single expression against `bindings`
    ///
    /// # Errors
    ///
    /// Returns an `EvaluationError` if evaluation fails.
    pub fn evaluate(&self, expr: &Expression, bindings: &Scope) -> Result<Value, EvaluationError> {
        let mut ctx = EvalContext {
            locals: bindings.clone(),
            steps: 0,
            depth: 0,
            limits: &self.limits,
            guard: &self.guard,
            functions: &self.functions,
        };
        ctx.evaluate_expr(expr)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Contents of the importable `string` module
fn string_module() -> Value {
    const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
    const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut module = Map::new();
    module.insert("ascii_letters".into(), format!("{LOWER}{UPPER}").into());
    module.insert("ascii_lowercase".into(), LOWER.into());
    module.insert("ascii_uppercase".into(), UPPER.into());
    module.insert("digits".into(), "0123456789".into());
    module.insert("hexdigits".into(), "0123456789abcdefABCDEF".into());
    module.insert("octdigits".into(), "01234567".into());
    module.insert(
        "punctuation".into(),
        r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##.into(),
    );
    module.insert("whitespace".into(), " \t\n\r\x0b\x0c".into());
    Value::Object(module)
}

/// Numeric operand view
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        r.checked_add(b)
    } else {
        Some(r)
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

/// Repeat a sequence; the repeat count and the result size both count
/// against the iteration limit
fn repeat<T: Clone>(items: &[T], count: i64, max: usize) -> Result<Vec<T>, EvaluationError> {
    let count = usize::try_from(count).unwrap_or(0);
    if count > max || items.len().saturating_mul(count) > max {
        return Err(EvaluationError::TooManyIterations { max });
    }
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    Ok(out)
}

/// Internal evaluation state for one run
struct EvalContext<'a> {
    locals: Scope,
    steps: usize,
    depth: usize,
    limits: &'a EvaluatorLimits,
    guard: &'a IsolationGuard,
    functions: &'a FunctionRegistry,
}

impl EvalContext<'_> {
    fn tick(&mut self) -> Result<(), EvaluationError> {
        self.steps += 1;
        if self.steps > self.limits.max_iterations {
            return Err(EvaluationError::TooManyIterations {
                max: self.limits.max_iterations,
            });
        }
        Ok(())
    }

    fn exec_block(&mut self, statements: &[Statement]) -> Result<(), EvaluationError> {
        statements.iter().try_for_each(|s| self.exec_statement(s))
    }

    fn exec_statement(&mut self, statement: &Statement) -> Result<(), EvaluationError> {
        self.tick()?;
        match statement {
            Statement::Pass => Ok(()),
            Statement::Expr(expr) => self.evaluate_expr(expr).map(|_| ()),
            Statement::Assign { target, value } => {
                self.guard.check_name(target)?;
                let value = self.evaluate_expr(value)?;
                self.locals.insert(target.clone(), value);
                Ok(())
            }
            Statement::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if is_truthy(&self.evaluate_expr(condition)?) {
                        return self.exec_block(body);
                    }
                }
                self.exec_block(otherwise)
            }
            Statement::For {
                variable,
                iterable,
                body,
            } => {
                self.guard.check_name(variable)?;
                let source = self.evaluate_expr(iterable)?;
                let items = iterate(&source).ok_or_else(|| EvaluationError::TypeError {
                    message: format!("'{}' object is not iterable", type_name(&source)),
                })?;
                for item in items {
                    self.tick()?;
                    self.locals.insert(variable.clone(), item);
                    self.exec_block(body)?;
                }
                Ok(())
            }
            Statement::Raise { kind, message } => {
                let message = match message {
                    Some(expr) => display(&self.evaluate_expr(expr)?),
                    None => kind.clone(),
                };
                Err(EvaluationError::raised(kind.clone(), message))
            }
            Statement::Assert { condition, message } => {
                if is_truthy(&self.evaluate_expr(condition)?) {
                    return Ok(());
                }
                let message = match message {
                    Some(expr) => display(&self.evaluate_expr(expr)?),
                    None => "Assertion failed".to_string(),
                };
                Err(EvaluationError::raised("AssertionError", message))
            }
            Statement::Import(path) => {
                if let Some(root) = path.first() {
                    self.guard.check_name(root)?;
                }
                match path.as_slice() {
                    [module] if module == "string" => {
                        self.locals.insert(module.clone(), string_module());
                        Ok(())
                    }
                    _ => Err(EvaluationError::UnknownModule {
                        name: path.join("."),
                    }),
                }
            }
        }
    }

    fn evaluate_expr(&mut self, expr: &Expression) -> Result<Value, EvaluationError> {
        self.depth += 1;
        if self.depth > self.limits.max_call_depth {
            self.depth -= 1;
            return Err(EvaluationError::CallStackTooDeep {
                max: self.limits.max_call_depth,
            });
        }
        let result = self.evaluate_inner(expr);
        self.depth -= 1;
        result
    }

    fn evaluate_inner(&mut self, expr: &Expression) -> Result<Value, EvaluationError> {
        match expr {
            Expression::Null => Ok(Value::Null),
            Expression::Boolean(b) => Ok(Value::Bool(*b)),
            Expression::Integer(n) => Ok(Value::from(*n)),
            Expression::Float(f) => float_value(*f),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::List(items) => items
                .iter()
                .map(|item| self.evaluate_expr(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expression::Variable(name) => self.resolve(name),
            Expression::Path(parts) => self.resolve_path(parts),
            Expression::Binary { op, left, right } => {
                let left = self.evaluate_expr(left)?;
                let right = self.evaluate_expr(right)?;
                arithmetic(*op, &left, &right, self.limits.max_iterations)
            }
            Expression::Compare { first, rest } => self.evaluate_compare(first, rest),
            Expression::Negate(inner) => {
                let value = self.evaluate_expr(inner)?;
                match Num::of(&value) {
                    Some(Num::Int(i)) => i
                        .checked_neg()
                        .map(Value::from)
                        .ok_or(EvaluationError::NumericOverflow),
                    Some(Num::Float(f)) => float_value(-f),
                    None => Err(EvaluationError::unary_type_error(
                        "negate",
                        type_name(&value),
                    )),
                }
            }
            Expression::And(left, right) => {
                let left = self.evaluate_expr(left)?;
                if is_truthy(&left) {
                    self.evaluate_expr(right)
                } else {
                    Ok(left)
                }
            }
            Expression::Or(left, right) => {
                let left = self.evaluate_expr(left)?;
                if is_truthy(&left) {
                    Ok(left)
                } else {
                    self.evaluate_expr(right)
                }
            }
            Expression::Not(inner) => Ok(Value::Bool(!is_truthy(&self.evaluate_expr(inner)?))),
            Expression::Attribute { object, name } => {
                self.guard.check_attribute(name)?;
                let receiver = self.evaluate_expr(object)?;
                read_attribute(&receiver, name)
            }
            Expression::Index { object, index } => {
                let receiver = self.evaluate_expr(object)?;
                let index = self.evaluate_expr(index)?;
                read_index(&receiver, &index)
            }
            Expression::Call { callee, args } => self.evaluate_call(callee, args),
            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                if is_truthy(&self.evaluate_expr(condition)?) {
                    self.evaluate_expr(then_expr)
                } else {
                    self.evaluate_expr(else_expr)
                }
            }
        }
    }

    fn resolve(&self, name: &str) -> Result<Value, EvaluationError> {
        self.guard.check_name(name)?;
        self.locals
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn resolve_path(&self, parts: &[String]) -> Result<Value, EvaluationError> {
        let Some((root, rest)) = parts.split_first() else {
            return Ok(Value::Null);
        };
        let mut current = self.resolve(root)?;
        for part in rest {
            self.guard.check_attribute(part)?;
            current = read_attribute(&current, part)?;
        }
        Ok(current)
    }

    fn evaluate_compare(
        &mut self,
        first: &Expression,
        rest: &[(CompareOp, Expression)],
    ) -> Result<Value, EvaluationError> {
        let mut left = self.evaluate_expr(first)?;
        for (op, operand) in rest {
            let right = self.evaluate_expr(operand)?;
            if !compare(*op, &left, &right)? {
                return Ok(Value::Bool(false));
            }
            left = right;
        }
        Ok(Value::Bool(true))
    }

    /// Bare type names become strings so `isinstance(x, int)` reads naturally
    fn evaluate_type_arg(&mut self, expr: &Expression) -> Result<Value, EvaluationError> {
        match expr {
            Expression::Variable(name)
                if !self.locals.contains_key(name)
                    && matches_type(&Value::Null, name).is_some() =>
            {
                self.guard.check_name(name)?;
                Ok(Value::String(name.clone()))
            }
            Expression::List(items) => items
                .iter()
                .map(|item| self.evaluate_type_arg(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => self.evaluate_expr(other),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
    ) -> Result<Value, EvaluationError> {
        let (name, mut values) = match callee {
            Expression::Variable(name) => {
                self.guard.check_name(name)?;
                (name.as_str(), Vec::with_capacity(args.len()))
            }
            Expression::Attribute { object, name } => {
                self.guard.check_attribute(name)?;
                let receiver = self.evaluate_expr(object)?;
                if !self.functions.has_function(name) {
                    return Err(EvaluationError::MissingAttribute {
                        type_name: type_name(&receiver).to_string(),
                        name: name.clone(),
                    });
                }
                let mut values = Vec::with_capacity(args.len() + 1);
                values.push(receiver);
                (name.as_str(), values)
            }
            other => {
                let value = self.evaluate_expr(other)?;
                return Err(EvaluationError::TypeError {
                    message: format!("'{}' object is not callable", type_name(&value)),
                });
            }
        };

        if !self.functions.has_function(name) {
            return Err(EvaluationError::UndefinedVariable {
                name: name.to_string(),
            });
        }

        for (position, arg) in args.iter().enumerate() {
            let value = if name == "isinstance" && position == 1 {
                self.evaluate_type_arg(arg)?
            } else {
                self.evaluate_expr(arg)?
            };
            values.push(value);
        }

        self.functions
            .call(name, values)
            .map_err(|e| EvaluationError::FunctionError {
                name: name.to_string(),
                message: e.to_string(),
            })
    }
}

fn read_attribute(receiver: &Value, name: &str) -> Result<Value, EvaluationError> {
    match receiver {
        Value::Object(map) if map.contains_key(name) => Ok(map[name].clone()),
        other => Err(EvaluationError::MissingAttribute {
            type_name: type_name(other).to_string(),
            name: name.to_string(),
        }),
    }
}

fn read_index(receiver: &Value, index: &Value) -> Result<Value, EvaluationError> {
    let position = |len: usize, i: i64| -> Result<usize, EvaluationError> {
        let len = i64::try_from(len).map_err(|_| EvaluationError::NumericOverflow)?;
        let resolved = if i < 0 { len + i } else { i };
        if (0..len).contains(&resolved) {
            usize::try_from(resolved).map_err(|_| EvaluationError::NumericOverflow)
        } else {
            Err(EvaluationError::IndexOutOfRange { index: i })
        }
    };

    match (receiver, index) {
        (Value::Array(items), Value::Number(n)) if n.is_i64() => {
            let i = n.as_i64().unwrap_or_default();
            Ok(items[position(items.len(), i)?].clone())
        }
        (Value::String(text), Value::Number(n)) if n.is_i64() => {
            let i = n.as_i64().unwrap_or_default();
            let chars: Vec<char> = text.chars().collect();
            Ok(Value::String(chars[position(chars.len(), i)?].to_string()))
        }
        (Value::Object(map), Value::String(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| EvaluationError::raised("KeyError", repr(index))),
        (receiver, index) => Err(EvaluationError::TypeError {
            message: format!(
                "'{}' indices must be valid, not {}",
                type_name(receiver),
                type_name(index)
            ),
        }),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvaluationError> {
    let ordered = |accept: fn(std::cmp::Ordering) -> bool| {
        compare_values(left, right)
            .map(accept)
            .ok_or_else(|| EvaluationError::TypeError {
                message: format!(
                    "'{op}' not supported between {} and {}",
                    type_name(left),
                    type_name(right)
                ),
            })
    };
    let membership = || {
        contains(right, left).ok_or_else(|| EvaluationError::TypeError {
            message: format!(
                "'in' not supported between {} and {}",
                type_name(left),
                type_name(right)
            ),
        })
    };

    match op {
        CompareOp::Equal => Ok(values_equal(left, right)),
        CompareOp::NotEqual => Ok(!values_equal(left, right)),
        CompareOp::Less => ordered(std::cmp::Ordering::is_lt),
        CompareOp::Greater => ordered(std::cmp::Ordering::is_gt),
        CompareOp::LessOrEqual => ordered(std::cmp::Ordering::is_le),
        CompareOp::GreaterOrEqual => ordered(std::cmp::Ordering::is_ge),
        CompareOp::In => membership(),
        CompareOp::NotIn => membership().map(|found| !found),
        CompareOp::Is => Ok(left == right),
        CompareOp::IsNot => Ok(left != right),
    }
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    max_items: usize,
) -> Result<Value, EvaluationError> {
    let type_error =
        || EvaluationError::binary_type_error(op.verb(), type_name(left), type_name(right));

    match (op, left, right) {
        (BinaryOp::Add, Value::String(l), Value::String(r)) => {
            return Ok(Value::String(format!("{l}{r}")));
        }
        (BinaryOp::Add, Value::Array(l), Value::Array(r)) => {
            return Ok(Value::Array(l.iter().chain(r).cloned().collect()));
        }
        (BinaryOp::Multiply, Value::String(s), Value::Number(n))
        | (BinaryOp::Multiply, Value::Number(n), Value::String(s))
            if n.is_i64() =>
        {
            let chars: Vec<char> = s.chars().collect();
            return Ok(Value::String(
                repeat(&chars, n.as_i64().unwrap_or_default(), max_items)?
                    .into_iter()
                    .collect(),
            ));
        }
        (BinaryOp::Multiply, Value::Array(items), Value::Number(n))
        | (BinaryOp::Multiply, Value::Number(n), Value::Array(items))
            if n.is_i64() =>
        {
            return Ok(Value::Array(repeat(
                items,
                n.as_i64().unwrap_or_default(),
                max_items,
            )?));
        }
        _ => {}
    }

    let (Some(l), Some(r)) = (Num::of(left), Num::of(right)) else {
        return Err(type_error());
    };

    match (op, l, r) {
        (BinaryOp::Divide, _, _) => {
            if r.to_f64() == 0.0 {
                return Err(EvaluationError::DivisionByZero);
            }
            float_value(l.to_f64() / r.to_f64())
        }
        (BinaryOp::FloorDivide | BinaryOp::Modulo, _, Num::Int(0)) => {
            Err(EvaluationError::DivisionByZero)
        }
        (BinaryOp::FloorDivide | BinaryOp::Modulo, _, Num::Float(f)) if f == 0.0 => {
            Err(EvaluationError::DivisionByZero)
        }
        (_, Num::Int(a), Num::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::FloorDivide => floor_div(a, b),
                BinaryOp::Modulo => floor_mod(a, b),
                BinaryOp::Divide => None,
            };
            result.map(Value::from).ok_or(EvaluationError::NumericOverflow)
        }
        (_, l, r) => {
            let (a, b) = (l.to_f64(), r.to_f64());
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::FloorDivide => (a / b).floor(),
                BinaryOp::Modulo => float_mod(a, b),
                BinaryOp::Divide => a / b,
            };
            float_value(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::Parser;
    use serde_json::json;

    fn run(source: &str, bindings: &[(&str, Value)]) -> Result<Scope, EvaluationError> {
        let program = Parser::new().parse(source).expect("Test operation failed");
        let scope = bindings
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        Evaluator::new().run(&program, scope)
    }

    fn eval(source: &str) -> Value {
        let expr = Parser::new()
            .parse_expression(source)
            .expect("Test operation failed");
        Evaluator::new()
            .evaluate(&expr, &Scope::new())
            .expect("Test operation failed")
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), json!(7));
        assert_eq!(eval("7 / 2"), json!(3.5));
        assert_eq!(eval("-7 // 2"), json!(-4));
        assert_eq!(eval("-7 % 3"), json!(2));
        assert_eq!(eval("1 + 0.5"), json!(1.5));
        assert_eq!(eval("'ab' * 2"), json!("abab"));
        assert_eq!(eval("[1] + [2]"), json!([1, 2]));
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(eval("0 <= 5 < 10"), json!(true));
        assert_eq!(eval("0 <= 15 < 10"), json!(false));
        assert_eq!(eval("'a' in ['a', 'b']"), json!(true));
        assert_eq!(eval("'z' not in 'abc'"), json!(true));
        assert_eq!(eval("None is None"), json!(true));
        assert_eq!(eval("0 or 'fallback'"), json!("fallback"));
        assert_eq!(eval("1 and 2"), json!(2));
        assert_eq!(eval("'yes' if 3 > 2 else 'no'"), json!("yes"));
    }

    #[test]
    fn test_raise_and_assert() {
        let err = run(
            "if age < 18: raise ValueError('Age must be at least 18')",
            &[("age", json!(10))],
        )
        .expect_err("validator should fail");
        assert_eq!(err.to_string(), "Age must be at least 18");
        assert!(run(
            "if age < 18: raise ValueError('Age must be at least 18')",
            &[("age", json!(30))]
        )
        .is_ok());

        let err = run("assert len(value) > 1", &[("value", json!(["x"]))])
            .expect_err("assertion should fail");
        assert_eq!(err.to_string(), "Assertion failed");
    }

    #[test]
    fn test_assignments_and_loops() {
        let scope = run(
            "total = 0\nfor n in value:\n    total = total + n\nvalue = total",
            &[("value", json!([1, 2, 3]))],
        )
        .expect("Test operation failed");
        assert_eq!(scope["value"], json!(6));
    }

    #[test]
    fn test_isinstance_and_methods() {
        let scope = run(
            "ok = isinstance(value, str) and value.startswith('A')\nparts = ','.join(['a', 'b'])",
            &[("value", json!("Alice"))],
        )
        .expect("Test operation failed");
        assert_eq!(scope["ok"], json!(true));
        assert_eq!(scope["parts"], json!("a,b"));

        let err = run("value.nonexistent()", &[("value", json!(1))]).expect_err("no such method");
        assert!(matches!(err, EvaluationError::MissingAttribute { .. }));
    }

    #[test]
    fn test_string_module_import() {
        let scope = run(
            "import string\nbad = set(value).difference(string.ascii_letters + string.digits)",
            &[("value", json!("ab$1"))],
        )
        .expect("Test operation failed");
        assert_eq!(scope["bad"], json!(["$"]));

        let err = run("import json", &[]).expect_err("unknown module");
        assert!(matches!(err, EvaluationError::UnknownModule { .. }));
    }

    #[test]
    fn test_shadowed_names_are_forbidden() {
        let err = run("x = open('/etc/passwd')", &[]).expect_err("open is shadowed");
        assert!(err.is_forbidden());
        let err = run("value.__class__", &[("value", json!({}))]).expect_err("dunder");
        assert!(err.is_forbidden());
    }

    #[test]
    fn test_unrestricted_guard_resolves_names_normally() {
        let program = Parser::new().parse("y = os").expect("Test operation failed");
        let mut scope = Scope::new();
        scope.insert("os".to_string(), json!("linux"));
        let out = Evaluator::new()
            .with_guard(IsolationGuard::unrestricted())
            .run(&program, scope)
            .expect("Test operation failed");
        assert_eq!(out["y"], json!("linux"));
    }

    #[test]
    fn test_iteration_limit() {
        let program = Parser::new()
            .parse("for a in value:\n    for b in value:\n        pass")
            .expect("Test operation failed");
        let mut scope = Scope::new();
        scope.insert("value".to_string(), json!((0..100).collect::<Vec<_>>()));
        let evaluator = Evaluator::new().with_limits(EvaluatorLimits {
            max_iterations: 500,
            ..EvaluatorLimits::default()
        });
        let err = evaluator.run(&program, scope).expect_err("limit exceeded");
        assert_eq!(err, EvaluationError::TooManyIterations { max: 500 });
    }

    #[test]
    fn test_repetition_limit() {
        let evaluator = Evaluator::new().with_limits(EvaluatorLimits {
            max_iterations: 500,
            ..EvaluatorLimits::default()
        });
        let program = Parser::new().parse("x = seq * value").expect("Test operation failed");
        let scope = |seq: Value, count: i64| -> Scope {
            [("seq".to_string(), seq), ("value".to_string(), json!(count))]
                .into_iter()
                .collect()
        };

        for seq in [json!([]), json!([1, 2]), json!(""), json!("ab")] {
            let err = evaluator
                .run(&program, scope(seq, 3_000_000_000))
                .expect_err("repeat count above the limit");
            assert_eq!(err, EvaluationError::TooManyIterations { max: 500 });
        }

        let err = evaluator
            .run(&program, scope(json!([1, 2]), 300))
            .expect_err("result size above the limit");
        assert_eq!(err, EvaluationError::TooManyIterations { max: 500 });

        let locals = evaluator
            .run(&program, scope(json!([1, 2]), 3))
            .expect("Test operation failed");
        assert_eq!(locals["x"], json!([1, 2, 1, 2, 1, 2]));
        let locals = evaluator
            .run(&program, scope(json!([1]), -4))
            .expect("Test operation failed");
        assert_eq!(locals["x"], json!([]));
    }

    #[test]
    fn test_runtime_errors() {
        assert!(matches!(
            run("x = 1 / 0", &[]),
            Err(EvaluationError::DivisionByZero)
        ));
        assert!(matches!(
            run("x = missing + 1", &[]),
            Err(EvaluationError::UndefinedVariable { .. })
        ));
        assert!(matches!(
            run("x = value[5]", &[("value", json!([1]))]),
            Err(EvaluationError::IndexOutOfRange { index: 5 })
        ));
        assert_eq!(
            run("x = value[-1]", &[("value", json!([1, 2]))]).expect("Test operation failed")["x"],
            json!(2)
        );
    }
}
