//! Operation registry: a passive name → implementation lookup table.
//!
//! A `Registry` is a plain value constructed per embedding (or per test)
//! and held by the executor; there is no process-wide singleton to leak
//! state between runs.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::resolve::Manifest;
use crate::value::Value;

/// Failure reported from inside an operation. The executor attaches the
/// vertex name when surfacing it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct OpError(pub String);

impl OpError {
    pub fn new(message: impl Into<String>) -> Self {
        OpError(message.into())
    }
}

/// One named parameter of an operation.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    /// Filled in when the manifest omits the parameter. `None` makes the
    /// parameter required.
    pub default: Option<Value>,
}

/// Declared call shape of an operation. The executor pairs manifest keys
/// to these parameters by name.
#[derive(Debug, Clone, Default)]
pub struct OpSignature {
    pub params: Vec<ParamSpec>,
    /// Accepts manifest keys beyond the declared parameters; they are
    /// passed through in sorted order.
    pub catch_all: bool,
}

impl OpSignature {
    pub fn new() -> Self {
        OpSignature::default()
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, default: Value) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            default: Some(default),
        });
        self
    }

    pub fn with_catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }
}

/// A pure named callable. Inputs are drawn from a manifest by name; the
/// output is a value, which makes it cacheable by construction.
pub trait Operation: Send + Sync {
    fn signature(&self) -> OpSignature;
    fn invoke(&self, args: &Manifest) -> Result<Value, OpError>;
}

#[derive(Default, Clone)]
pub struct Registry {
    ops: HashMap<String, Arc<dyn Operation>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&mut self, name: impl Into<String>, op: Arc<dyn Operation>) {
        self.ops.insert(name.into(), op);
    }

    /// Registers a package of operations under `prefix:short_name` names.
    pub fn register_package(&mut self, prefix: &str, ops: Vec<(&str, Arc<dyn Operation>)>) {
        for (short_name, op) in ops {
            self.register(format!("{prefix}:{short_name}"), op);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl Operation for Nop {
        fn signature(&self) -> OpSignature {
            OpSignature::new()
        }

        fn invoke(&self, _args: &Manifest) -> Result<Value, OpError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn package_registration_prefixes_names() {
        let mut registry = Registry::new();
        registry.register_package("demo", vec![("a", Arc::new(Nop)), ("b", Arc::new(Nop))]);
        assert!(registry.contains("demo:a"));
        assert!(registry.contains("demo:b"));
        assert!(!registry.contains("a"));
    }

    #[test]
    fn clear_empties_the_table() {
        let mut registry = Registry::new();
        registry.register("x", Arc::new(Nop));
        registry.clear();
        assert!(!registry.contains("x"));
    }
}
