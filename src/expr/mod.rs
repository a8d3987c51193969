//! Pure expression evaluation over a variable environment.
//!
//! The language is deliberately small: variables, field access, indexing,
//! arithmetic, comparison, boolean combinators, ternary, and a closed
//! built-in table. No loops, no user functions, no mutation, so
//! evaluation always terminates. Floating point cannot be produced: fractional
//! literals are rejected at parse time and inexact integer division is
//! rejected at evaluation time.

pub mod ast;
pub mod eval;
pub mod parser;
pub mod token;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::value::Value;

/// Evaluates an expression source string against an environment.
pub fn eval(source: &str, env: &VariableEnv<'_>) -> Result<Value, EvalError> {
    let expr = parser::parse(source)?;
    eval::eval_expr(&expr, env)
}

/// Name → value bindings visible to an expression. Borrows the artifacts it
/// binds; evaluation never mutates them.
#[derive(Debug, Default)]
pub struct VariableEnv<'a> {
    vars: BTreeMap<&'a str, &'a Value>,
}

impl<'a> VariableEnv<'a> {
    pub fn new() -> Self {
        VariableEnv {
            vars: BTreeMap::new(),
        }
    }

    /// Binds every entry of a map under its key.
    pub fn from_map(map: &'a BTreeMap<String, Value>) -> Self {
        let mut env = VariableEnv::new();
        for (name, value) in map {
            env.bind(name, value);
        }
        env
    }

    pub fn bind(&mut self, name: &'a str, value: &'a Value) {
        self.vars.insert(name, value);
    }

    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        self.vars.get(name).copied()
    }
}

/// Fatal evaluation failures. Every message names the offending token,
/// variable, or operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("fractional literal '{0}' is not allowed; write decimal(\"{0}\")")]
    FloatLiteral(String),

    #[error("non-integer quotient in '{0}'; promote with decimal(...)")]
    FloatResult(String),

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("unknown field '{field}' on {on}")]
    UnknownField { field: String, on: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: String, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
}

impl EvalError {
    pub fn parse(message: impl Into<String>) -> Self {
        EvalError::Parse(message.into())
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        EvalError::TypeMismatch(message.into())
    }
}
