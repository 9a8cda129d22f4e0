use super::ast::{BinaryOp, Body, Expr, Stmt, UnaryOp};
use crate::value::Value;

/// Evaluate a compiled body against the positional dependency values.
///
/// Evaluation is total: unknown identifiers, bad member accesses and
/// numeric nonsense degrade to `Undefined`/`NaN` instead of failing, so
/// a schema-authored expression can never take the propagator down.
///
/// With `coerce` the result collapses to a plain boolean (gate and
/// branch-condition semantics); without it the raw value flows through
/// (derived-value semantics).
pub fn eval_body(body: &Body, coerce: bool, deps: &[Value]) -> Value {
    let mut scope = Scope {
        deps,
        locals: Vec::new(),
    };
    let coerced = |value: Value| {
        if coerce {
            Value::Bool(value.is_truthy())
        } else {
            value
        }
    };
    match body {
        Body::Expr(expr) => coerced(scope.eval(expr)),
        Body::Block(stmts) => match scope.exec_all(stmts) {
            Flow::Return(Some(value)) => coerced(value),
            Flow::Return(None) => coerced(Value::Undefined),
            // Falling off the end is never coerced: the result stays
            // undefined.
            Flow::Next => Value::Undefined,
        },
    }
}

enum Flow {
    Next,
    Return(Option<Value>),
}

struct Scope<'deps> {
    deps: &'deps [Value],
    locals: Vec<(String, Value)>,
}

impl Scope<'_> {
    fn exec_all(&mut self, stmts: &[Stmt]) -> Flow {
        for stmt in stmts {
            match self.exec(stmt) {
                Flow::Next => {}
                flow => return flow,
            }
        }
        Flow::Next
    }

    fn exec(&mut self, stmt: &Stmt) -> Flow {
        match stmt {
            Stmt::Declare { name, init } => {
                let value = init
                    .as_ref()
                    .map(|expr| self.eval(expr))
                    .unwrap_or(Value::Undefined);
                self.set_local(name, value);
                Flow::Next
            }
            Stmt::Assign { name, value } => {
                let value = self.eval(value);
                self.set_local(name, value);
                Flow::Next
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond).is_truthy() {
                    self.exec_all(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec_all(otherwise)
                } else {
                    Flow::Next
                }
            }
            Stmt::Return(expr) => Flow::Return(expr.as_ref().map(|expr| self.eval(expr))),
            Stmt::Expr(expr) => {
                self.eval(expr);
                Flow::Next
            }
        }
    }

    fn set_local(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.locals.iter_mut().rev().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.locals.push((name.to_string(), value));
        }
    }

    fn eval(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::text(s),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Null => Value::Null,
            Expr::Undefined => Value::Undefined,
            Expr::SelfRef => Value::SelfRef,
            Expr::Ident(name) => self
                .locals
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Undefined),
            Expr::Member { object, property } => self.eval(object).member(property),
            Expr::Index { object, index } => {
                // `deps[i]` reads the dependency array directly.
                if let Some(dep) = expr.as_dep_index() {
                    return self
                        .deps
                        .get(dep as usize)
                        .cloned()
                        .unwrap_or(Value::Undefined);
                }
                let object = self.eval(object);
                let index = self.eval(index);
                object.index(&index)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand);
                match op {
                    UnaryOp::Not => Value::Bool(!operand.is_truthy()),
                    UnaryOp::Neg => Value::Number(-operand.to_number()),
                    UnaryOp::Plus => Value::Number(operand.to_number()),
                }
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond).is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Value {
        // Short-circuiting operators return an operand, not a boolean.
        match op {
            BinaryOp::And => {
                let left = self.eval(left);
                return if left.is_truthy() {
                    self.eval(right)
                } else {
                    left
                };
            }
            BinaryOp::Or => {
                let left = self.eval(left);
                return if left.is_truthy() {
                    left
                } else {
                    self.eval(right)
                };
            }
            BinaryOp::Nullish => {
                let left = self.eval(left);
                return if matches!(left, Value::Undefined | Value::Null) {
                    self.eval(right)
                } else {
                    left
                };
            }
            _ => {}
        }

        let left = self.eval(left);
        let right = self.eval(right);
        match op {
            BinaryOp::Add => {
                // Concatenation when either side is text.
                if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) {
                    Value::text(&format!("{left}{right}"))
                } else {
                    Value::Number(left.to_number() + right.to_number())
                }
            }
            BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
            BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
            BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
            BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
            BinaryOp::Less => compare(&left, &right, |o| o == std::cmp::Ordering::Less),
            BinaryOp::LessEq => compare(&left, &right, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::Greater => compare(&left, &right, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::GreaterEq => compare(&left, &right, |o| o != std::cmp::Ordering::Less),
            BinaryOp::EqLoose => Value::Bool(left.loose_eq(&right)),
            BinaryOp::NeLoose => Value::Bool(!left.loose_eq(&right)),
            BinaryOp::EqStrict => Value::Bool(left.strict_eq(&right)),
            BinaryOp::NeStrict => Value::Bool(!left.strict_eq(&right)),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => unreachable!(),
        }
    }
}

/// Relational comparison: lexicographic for two texts, numeric otherwise
/// (false when either side is NaN).
fn compare(left: &Value, right: &Value, check: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    if let (Value::Text(a), Value::Text(b)) = (left, right) {
        return Value::Bool(check(a.cmp(b)));
    }
    let (a, b) = (left.to_number(), right.to_number());
    Value::Bool(a.partial_cmp(&b).is_some_and(check))
}
