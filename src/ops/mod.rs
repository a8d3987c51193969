//! Bundled `core` operation package.
//!
//! Small, pure building blocks used by graphs and by the end-to-end tests.
//! Heavier domain libraries live in their own packages; `poly` ships here
//! as the reference Domain-artifact package.

pub mod poly;

use std::sync::Arc;

use crate::exec::registry::{OpError, OpSignature, Operation, Registry};
use crate::expr::ast::BinaryOp;
use crate::expr::eval::arith;
use crate::resolve::Manifest;
use crate::value::Value;

/// Registers the `core:*` operations.
pub fn register(registry: &mut Registry) {
    registry.register_package(
        "core",
        vec![
            ("identity", Arc::new(Identity) as Arc<dyn Operation>),
            ("add", Arc::new(Arith(BinaryOp::Add)) as Arc<dyn Operation>),
            ("sub", Arc::new(Arith(BinaryOp::Sub)) as Arc<dyn Operation>),
            ("mul", Arc::new(Arith(BinaryOp::Mul)) as Arc<dyn Operation>),
            ("concat", Arc::new(Concat) as Arc<dyn Operation>),
            ("pack", Arc::new(Pack) as Arc<dyn Operation>),
        ],
    );
}

/// Echoes its `value` argument.
struct Identity;

impl Operation for Identity {
    fn signature(&self) -> OpSignature {
        OpSignature::new().required("value")
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        Ok(args["value"].clone())
    }
}

/// Numeric binary operation over `a` and `b` with Int/Decimal promotion.
struct Arith(BinaryOp);

impl Operation for Arith {
    fn signature(&self) -> OpSignature {
        OpSignature::new().required("a").required("b")
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        arith(self.0, &args["a"], &args["b"]).map_err(|e| OpError::new(e.to_string()))
    }
}

/// Concatenates `a` and `b` as strings.
struct Concat;

impl Operation for Concat {
    fn signature(&self) -> OpSignature {
        OpSignature::new().required("a").required("b")
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        match (&args["a"], &args["b"]) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (a, b) => Err(OpError::new(format!(
                "concat takes two Str arguments, got ({}, {})",
                a.kind(),
                b.kind()
            ))),
        }
    }
}

/// Packs every argument into a Map. The catch-all operation.
struct Pack;

impl Operation for Pack {
    fn signature(&self) -> OpSignature {
        OpSignature::new().with_catch_all()
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        Ok(Value::Map(args.clone()))
    }
}
