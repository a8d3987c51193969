//! Phase 1: parameter resolution.
//!
//! Walks a vertex's parameter tree, resolving the three marker kinds
//! (reference, expression, string interpolation) against the dependency
//! environment, and produces the fully-resolved manifest that gets hashed.
//! Resolution is pure: it borrows the tree and the environment and builds
//! fresh output.

pub mod template;

use std::collections::BTreeMap;

use crate::expr::{self, EvalError, VariableEnv};
use crate::graph::{Param, ParamMap};
use crate::resolve::template::{Segment, split_segments, whole_expression};
use crate::value::Value;

/// The resolved parameter map of a vertex. Its canonical hash is the
/// vertex's cache digest.
pub type Manifest = BTreeMap<String, Value>;

/// Resolves a whole parameter map into a manifest.
pub fn resolve_params(params: &ParamMap, env: &VariableEnv<'_>) -> Result<Manifest, EvalError> {
    let mut manifest = Manifest::new();
    for (key, param) in params {
        manifest.insert(key.clone(), resolve(param, env)?);
    }
    Ok(manifest)
}

/// Resolves one parameter tree node.
pub fn resolve(param: &Param, env: &VariableEnv<'_>) -> Result<Value, EvalError> {
    match param {
        Param::Lit(value) => Ok(value.clone()),
        Param::Ref(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
        Param::Cel(source) => expr::eval(source, env),
        Param::Str(s) => resolve_str(s, env),
        Param::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve(item, env)?);
            }
            Ok(Value::List(out))
        }
        Param::Map(entries) => {
            let mut out = BTreeMap::new();
            for (key, value) in entries {
                out.insert(key.clone(), resolve(value, env)?);
            }
            Ok(Value::Map(out))
        }
    }
}

/// A string literal may be plain text, a whole-string interpolation (which
/// resolves to the expression's native value), or a template that
/// stringifies each segment.
fn resolve_str(s: &str, env: &VariableEnv<'_>) -> Result<Value, EvalError> {
    if !s.contains("${") {
        return Ok(Value::str(s));
    }
    if let Some(source) = whole_expression(s) {
        return expr::eval(source, env);
    }
    let mut out = String::new();
    for segment in split_segments(s) {
        match segment {
            Segment::Lit(text) => out.push_str(&text),
            Segment::Expr(source) => {
                let value = expr::eval(&source, env)?;
                out.push_str(&value.display_string());
            }
        }
    }
    Ok(Value::Str(out))
}
