//! Shared test scaffolding: the bundled packages wrapped so every dispatch
//! is counted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use invariant::exec::registry::{OpError, OpSignature, Operation, Registry};
use invariant::ops;
use invariant::resolve::Manifest;
use invariant::value::Value;

pub const OP_NAMES: &[&str] = &[
    "core:identity",
    "core:add",
    "core:sub",
    "core:mul",
    "core:concat",
    "core:pack",
    "poly:from_coefficients",
    "poly:add",
    "poly:multiply",
    "poly:evaluate",
];

struct CountingOp {
    inner: Arc<dyn Operation>,
    count: Arc<AtomicUsize>,
}

impl Operation for CountingOp {
    fn signature(&self) -> OpSignature {
        self.inner.signature()
    }

    fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.invoke(args)
    }
}

pub struct Dispatches {
    counts: HashMap<String, Arc<AtomicUsize>>,
}

impl Dispatches {
    pub fn of(&self, op_name: &str) -> usize {
        self.counts
            .get(op_name)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts
            .values()
            .map(|count| count.load(Ordering::Relaxed))
            .sum()
    }
}

/// The bundled packages, each operation wrapped to count dispatches.
pub fn counting_registry() -> (Registry, Dispatches) {
    let mut base = Registry::new();
    ops::register(&mut base);
    ops::poly::register(&mut base);

    let mut registry = Registry::new();
    let mut counts = HashMap::new();
    for &name in OP_NAMES {
        let inner = base.get(name).expect("bundled op").clone();
        let count = Arc::new(AtomicUsize::new(0));
        counts.insert(name.to_string(), count.clone());
        registry.register(name, Arc::new(CountingOp { inner, count }));
    }
    (registry, Dispatches { counts })
}
