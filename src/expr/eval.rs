//! Tree-walking interpreter and the built-in function table.

use std::cmp::Ordering;

use bigdecimal::{BigDecimal, RoundingMode};
use num_bigint::BigInt;
use num_traits::Zero;
use regex::Regex;

use crate::expr::ast::{BinaryOp, Expr, UnaryOp};
use crate::expr::{EvalError, VariableEnv};
use crate::value::Value;

pub fn eval_expr(expr: &Expr, env: &VariableEnv<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Lit(value) => Ok(value.clone()),
        Expr::Var(name) => {
            let bound = lookup(env, name)?;
            // A bare identifier naming an artifact that wraps a scalar
            // collapses to the wrapped value.
            if let Value::Domain(artifact) = bound {
                let mut attrs = artifact.attrs();
                if let Some(wrapped) = attrs.remove("value") {
                    return Ok(wrapped);
                }
            }
            Ok(bound.clone())
        }
        Expr::Field { object, name } => {
            let receiver = eval_receiver(object, env)?;
            field_access(&receiver, name)
        }
        Expr::Index { object, index } => {
            let receiver = eval_receiver(object, env)?;
            let index = eval_expr(index, env)?;
            index_access(&receiver, &index)
        }
        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, env)?;
            match op {
                UnaryOp::Neg => match value {
                    Value::Int(n) => Ok(Value::Int(-n)),
                    Value::Decimal(d) => Ok(Value::decimal(-d)),
                    other => Err(EvalError::type_mismatch(format!(
                        "cannot negate {}",
                        other.kind()
                    ))),
                },
                UnaryOp::Not => match value {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    other => Err(EvalError::type_mismatch(format!(
                        "'!' requires Bool, got {}",
                        other.kind()
                    ))),
                },
            }
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, env),
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let cond = eval_expr(cond, env)?;
            match cond {
                Value::Bool(true) => eval_expr(then, env),
                Value::Bool(false) => eval_expr(otherwise, env),
                other => Err(EvalError::type_mismatch(format!(
                    "ternary condition must be Bool, got {}",
                    other.kind()
                ))),
            }
        }
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, env)?);
            }
            call_builtin(name, &values)
        }
    }
}

fn lookup<'a>(env: &VariableEnv<'a>, name: &str) -> Result<&'a Value, EvalError> {
    env.lookup(name)
        .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
}

/// Evaluates the receiver of a field/index access. A bare identifier is
/// looked up without the scalar collapse so `p.coefficients` reaches the
/// artifact's attributes even when `p` also exposes `value`.
fn eval_receiver(expr: &Expr, env: &VariableEnv<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Var(name) => Ok(lookup(env, name)?.clone()),
        other => eval_expr(other, env),
    }
}

fn field_access(receiver: &Value, name: &str) -> Result<Value, EvalError> {
    match receiver {
        Value::Map(entries) => entries.get(name).cloned().ok_or_else(|| {
            EvalError::UnknownField {
                field: name.to_string(),
                on: "Map".to_string(),
            }
        }),
        Value::Domain(artifact) => {
            artifact
                .attrs()
                .remove(name)
                .ok_or_else(|| EvalError::UnknownField {
                    field: name.to_string(),
                    on: artifact.type_name().to_string(),
                })
        }
        other => Err(EvalError::type_mismatch(format!(
            "field access requires Map or Domain, got {}",
            other.kind()
        ))),
    }
}

fn index_access(receiver: &Value, index: &Value) -> Result<Value, EvalError> {
    match (receiver, index) {
        (Value::List(items), Value::Int(n)) => {
            let idx = bigint_to_index(n, items.len())?;
            Ok(items[idx].clone())
        }
        (Value::Map(entries), Value::Str(key)) => {
            entries
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::UnknownField {
                    field: key.clone(),
                    on: "Map".to_string(),
                })
        }
        (receiver, index) => Err(EvalError::type_mismatch(format!(
            "cannot index {} with {}",
            receiver.kind(),
            index.kind()
        ))),
    }
}

fn bigint_to_index(n: &BigInt, len: usize) -> Result<usize, EvalError> {
    let out_of_bounds = || EvalError::IndexOutOfBounds {
        index: n.to_string(),
        len,
    };
    let idx: usize = n.try_into().map_err(|_| out_of_bounds())?;
    if idx >= len {
        return Err(out_of_bounds());
    }
    Ok(idx)
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    env: &VariableEnv<'_>,
) -> Result<Value, EvalError> {
    // Boolean combinators short-circuit; everything else is strict.
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let l = expect_bool(op, eval_expr(left, env)?)?;
            if (op == BinaryOp::And && !l) || (op == BinaryOp::Or && l) {
                return Ok(Value::Bool(l));
            }
            let r = expect_bool(op, eval_expr(right, env)?)?;
            Ok(Value::Bool(r))
        }
        _ => {
            let l = eval_expr(left, env)?;
            let r = eval_expr(right, env)?;
            match op {
                BinaryOp::Eq => Ok(Value::Bool(l == r)),
                BinaryOp::Ne => Ok(Value::Bool(l != r)),
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    let ord = compare(&l, &r)?;
                    Ok(Value::Bool(match op {
                        BinaryOp::Lt => ord == Ordering::Less,
                        BinaryOp::Le => ord != Ordering::Greater,
                        BinaryOp::Gt => ord == Ordering::Greater,
                        _ => ord != Ordering::Less,
                    }))
                }
                _ => arith(op, &l, &r),
            }
        }
    }
}

fn expect_bool(op: BinaryOp, value: Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::type_mismatch(format!(
            "'{}' requires Bool operands, got {}",
            op.symbol(),
            other.kind()
        ))),
    }
}

/// Natural order for comparable values: numeric across Int/Decimal,
/// lexicographic for Str.
pub(crate) fn compare(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => Ok(a.cmp(b)),
        (Value::Int(a), Value::Decimal(b)) => Ok(BigDecimal::from(a.clone()).cmp(b)),
        (Value::Decimal(a), Value::Int(b)) => Ok(a.cmp(&BigDecimal::from(b.clone()))),
        (l, r) => Err(EvalError::type_mismatch(format!(
            "cannot compare {} with {}",
            l.kind(),
            r.kind()
        ))),
    }
}

/// Arithmetic with Int/Decimal promotion. Int op Int stays Int except for
/// division, which must be exact; any Decimal operand promotes the result.
pub(crate) fn arith(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    // String concatenation rides on '+'.
    if op == BinaryOp::Add {
        if let (Value::Str(a), Value::Str(b)) = (left, right) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
    }

    match numeric_pair(op, left, right)? {
        NumPair::Ints(a, b) => match op {
            BinaryOp::Add => Ok(Value::Int(a + b)),
            BinaryOp::Sub => Ok(Value::Int(a - b)),
            BinaryOp::Mul => Ok(Value::Int(a * b)),
            BinaryOp::Div => {
                if b.is_zero() {
                    return Err(EvalError::DivisionByZero);
                }
                if (&a % &b).is_zero() {
                    Ok(Value::Int(a / b))
                } else {
                    Err(EvalError::FloatResult(format!("{a} / {b}")))
                }
            }
            BinaryOp::Rem => {
                if b.is_zero() {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Value::Int(a % b))
            }
            _ => unreachable!("non-arithmetic operator in arith"),
        },
        NumPair::Decimals(a, b) => match op {
            BinaryOp::Add => Ok(Value::decimal(&a + &b)),
            BinaryOp::Sub => Ok(Value::decimal(&a - &b)),
            BinaryOp::Mul => Ok(Value::decimal(&a * &b)),
            BinaryOp::Div => {
                if b.is_zero() {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Value::decimal(&a / &b))
            }
            BinaryOp::Rem => {
                if b.is_zero() {
                    return Err(EvalError::DivisionByZero);
                }
                // Truncating remainder: a - trunc(a / b) * b.
                let q = (&a / &b).with_scale_round(0, RoundingMode::Down);
                Ok(Value::decimal(&a - &(q * &b)))
            }
            _ => unreachable!("non-arithmetic operator in arith"),
        },
    }
}

enum NumPair {
    Ints(BigInt, BigInt),
    Decimals(BigDecimal, BigDecimal),
}

fn numeric_pair(op: BinaryOp, left: &Value, right: &Value) -> Result<NumPair, EvalError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(NumPair::Ints(a.clone(), b.clone())),
        (Value::Decimal(a), Value::Decimal(b)) => Ok(NumPair::Decimals(a.clone(), b.clone())),
        (Value::Int(a), Value::Decimal(b)) => {
            Ok(NumPair::Decimals(BigDecimal::from(a.clone()), b.clone()))
        }
        (Value::Decimal(a), Value::Int(b)) => {
            Ok(NumPair::Decimals(a.clone(), BigDecimal::from(b.clone())))
        }
        (l, r) => Err(EvalError::type_mismatch(format!(
            "'{}' requires numeric operands, got {} and {}",
            op.symbol(),
            l.kind(),
            r.kind()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "decimal" => {
            let arg = exactly(name, args, 1)?;
            match &arg[0] {
                Value::Int(n) => Ok(Value::decimal(BigDecimal::from(n.clone()))),
                Value::Str(s) => Value::decimal_str(s).map_err(EvalError::TypeMismatch),
                Value::Decimal(d) => Ok(Value::decimal(d.clone())),
                other => Err(EvalError::type_mismatch(format!(
                    "decimal() takes Int, Str, or Decimal, got {}",
                    other.kind()
                ))),
            }
        }
        "min" | "max" => {
            let arg = exactly(name, args, 2)?;
            let ord = compare(&arg[0], &arg[1])?;
            let first = (name == "min") == (ord != Ordering::Greater);
            Ok(if first { arg[0].clone() } else { arg[1].clone() })
        }
        "size" => {
            let arg = exactly(name, args, 1)?;
            let len = match &arg[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(EvalError::type_mismatch(format!(
                        "size() takes Str, List, or Map, got {}",
                        other.kind()
                    )));
                }
            };
            Ok(Value::Int(BigInt::from(len)))
        }
        "contains" | "startsWith" | "endsWith" => {
            let arg = exactly(name, args, 2)?;
            let (s, needle) = str_pair(name, &arg[0], &arg[1])?;
            Ok(Value::Bool(match name {
                "contains" => s.contains(needle),
                "startsWith" => s.starts_with(needle),
                _ => s.ends_with(needle),
            }))
        }
        "matches" => {
            let arg = exactly(name, args, 2)?;
            let (s, pattern) = str_pair(name, &arg[0], &arg[1])?;
            let re = Regex::new(pattern).map_err(|e| EvalError::InvalidRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            Ok(Value::Bool(re.is_match(s)))
        }
        "in" => {
            let arg = exactly(name, args, 2)?;
            match (&arg[0], &arg[1]) {
                (needle, Value::List(items)) => {
                    Ok(Value::Bool(items.iter().any(|item| item == needle)))
                }
                (Value::Str(key), Value::Map(entries)) => {
                    Ok(Value::Bool(entries.contains_key(key)))
                }
                (l, r) => Err(EvalError::type_mismatch(format!(
                    "in() takes (value, List) or (Str, Map), got ({}, {})",
                    l.kind(),
                    r.kind()
                ))),
            }
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn exactly<'a>(name: &str, args: &'a [Value], expected: usize) -> Result<&'a [Value], EvalError> {
    if args.len() != expected {
        return Err(EvalError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(args)
}

fn str_pair<'a>(
    name: &str,
    left: &'a Value,
    right: &'a Value,
) -> Result<(&'a str, &'a str), EvalError> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok((a, b)),
        (l, r) => Err(EvalError::type_mismatch(format!(
            "{name}() takes two Str arguments, got ({}, {})",
            l.kind(),
            r.kind()
        ))),
    }
}
