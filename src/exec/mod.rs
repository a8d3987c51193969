//! The two-phase executor.
//!
//! Phase 1 builds the dependency environment and resolves the vertex's
//! parameter tree into a manifest; phase 2 looks the manifest's digest up
//! in the store and dispatches to the operation on a miss. Sub-graph
//! vertices recurse with the manifest as the inner context, sharing the
//! store and registry, so deduplication across nesting levels is exactly
//! the cache behaviour of the shared store.

pub mod registry;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::EngineError;
use crate::expr::VariableEnv;
use crate::graph::{Context, Graph, OpVertex, Vertex, sort};
use crate::resolve::{Manifest, resolve_params};
use crate::store::ArtifactStore;
use crate::value::Value;
use crate::value::hash::digest_hex;
use registry::Registry;

/// Cooperative cancellation. The executor checks between vertices and
/// between phases; work already written to a persistent store survives.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Executes graphs against a shared store and registry. Vertices run
/// serially in the deterministic order produced by the graph resolver.
pub struct Executor<'a> {
    store: &'a dyn ArtifactStore,
    registry: &'a Registry,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a dyn ArtifactStore, registry: &'a Registry) -> Self {
        Executor {
            store,
            registry,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Runs the graph. The result map has exactly one entry per top-level
    /// vertex; context keys are not included.
    pub fn execute(
        &self,
        graph: &Graph,
        context: &Context,
    ) -> Result<BTreeMap<String, Value>, EngineError> {
        let order = sort::execution_order(graph, context, Some(self.registry))?;

        let mut artifacts: BTreeMap<String, Value> = context.clone();

        for name in &order {
            self.check_cancelled()?;
            let vertex = &graph[name];

            // Phase 1: bind dependencies, resolve the manifest, digest it.
            let manifest = {
                let mut env = VariableEnv::new();
                for dep in vertex.deps() {
                    let artifact = artifacts.get(dep).ok_or_else(|| {
                        EngineError::contract(name, format!("dependency '{dep}' has no artifact"))
                    })?;
                    env.bind(dep, artifact);
                }
                resolve_params(vertex.params(), &env)
                    .map_err(|e| EngineError::resolution(name, e.to_string()))?
            };
            let digest = digest_hex(&manifest);

            self.check_cancelled()?;

            // Phase 2: consult the store, dispatch, or recurse.
            let artifact = match vertex {
                Vertex::Op(op) => self.run_op(name, op, &manifest, &digest)?,
                Vertex::SubGraph(sub) => {
                    let inner = self.execute(&sub.graph, &manifest)?;
                    inner.get(&sub.output).cloned().ok_or_else(|| {
                        EngineError::contract(
                            name,
                            format!("sub-graph produced no artifact for output '{}'", sub.output),
                        )
                    })?
                }
            };
            artifacts.insert(name.clone(), artifact);
        }

        let mut results = BTreeMap::new();
        for name in graph.keys() {
            let artifact = artifacts.get(name).ok_or_else(|| {
                EngineError::contract(name, "vertex was never executed")
            })?;
            results.insert(name.clone(), artifact.clone());
        }
        Ok(results)
    }

    fn run_op(
        &self,
        name: &str,
        op: &OpVertex,
        manifest: &Manifest,
        digest: &str,
    ) -> Result<Value, EngineError> {
        if !op.cache {
            // Ephemeral vertex: never read from or written to the store.
            return self.dispatch(name, op, manifest);
        }
        if self.store.exists(&op.op_name, digest)? {
            return Ok(self.store.get(&op.op_name, digest)?);
        }
        let artifact = self.dispatch(name, op, manifest)?;
        self.store.put(&op.op_name, digest, &artifact)?;
        Ok(artifact)
    }

    /// Pairs manifest keys to operation parameters by name and invokes.
    fn dispatch(
        &self,
        name: &str,
        op: &OpVertex,
        manifest: &Manifest,
    ) -> Result<Value, EngineError> {
        let operation = self.registry.get(&op.op_name).ok_or_else(|| {
            EngineError::dispatch(name, format!("operation '{}' is not registered", op.op_name))
        })?;
        let signature = operation.signature();

        let mut args = Manifest::new();
        let mut extras = manifest.clone();
        for param in &signature.params {
            match extras.remove(&param.name) {
                Some(value) => {
                    args.insert(param.name.clone(), value);
                }
                None => match &param.default {
                    Some(default) => {
                        args.insert(param.name.clone(), default.clone());
                    }
                    None => {
                        return Err(EngineError::dispatch(
                            name,
                            format!(
                                "operation '{}' requires parameter '{}'",
                                op.op_name, param.name
                            ),
                        ));
                    }
                },
            }
        }

        if !extras.is_empty() {
            if signature.catch_all {
                // BTreeMap drains in sorted key order.
                args.append(&mut extras);
            } else {
                let unexpected = extras.keys().next().expect("non-empty");
                return Err(EngineError::dispatch(
                    name,
                    format!(
                        "operation '{}' does not accept parameter '{unexpected}'",
                        op.op_name
                    ),
                ));
            }
        }

        operation
            .invoke(&args)
            .map_err(|e| EngineError::dispatch(name, format!("operation '{}': {e}", op.op_name)))
    }

    fn check_cancelled(&self) -> Result<(), EngineError> {
        match self.cancel {
            Some(flag) if flag.is_cancelled() => Err(EngineError::Cancelled),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::registry::{OpError, OpSignature, Operation};
    use super::*;
    use crate::graph::{Param, ParamMap};
    use crate::store::memory::MemoryStore;

    struct Echo;

    impl Operation for Echo {
        fn signature(&self) -> OpSignature {
            OpSignature::new().required("value")
        }

        fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
            Ok(args["value"].clone())
        }
    }

    fn echo_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register("echo", Arc::new(Echo));
        registry
    }

    fn echo_vertex(value: Param) -> Vertex {
        let mut params = ParamMap::new();
        params.insert("value".to_string(), value);
        Vertex::op("echo", params, vec![]).unwrap()
    }

    #[test]
    fn empty_graph_executes_to_empty_result() {
        let store = MemoryStore::new();
        let registry = Registry::new();
        let executor = Executor::new(&store, &registry);
        let results = executor.execute(&Graph::new(), &Context::new()).unwrap();
        assert!(results.is_empty());
        assert_eq!(store.stats(), crate::store::StoreStats::default());
    }

    #[test]
    fn context_keys_are_not_in_the_result() {
        let store = MemoryStore::new();
        let registry = echo_registry();
        let executor = Executor::new(&store, &registry);

        let mut graph = Graph::new();
        graph.insert("v".to_string(), echo_vertex(Param::int(1)));
        let mut context = Context::new();
        context.insert("outside".to_string(), Value::int(9));

        let results = executor.execute(&graph, &context).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("v"));
    }

    #[test]
    fn missing_required_parameter_is_a_dispatch_error() {
        let store = MemoryStore::new();
        let registry = echo_registry();
        let executor = Executor::new(&store, &registry);

        let mut graph = Graph::new();
        graph.insert(
            "v".to_string(),
            Vertex::op("echo", ParamMap::new(), vec![]).unwrap(),
        );
        let err = executor.execute(&graph, &Context::new()).unwrap_err();
        assert!(matches!(err, EngineError::Dispatch { .. }), "got: {err}");
        assert!(err.to_string().contains("'value'"), "got: {err}");
    }

    #[test]
    fn extra_parameter_without_catch_all_is_fatal() {
        let store = MemoryStore::new();
        let registry = echo_registry();
        let executor = Executor::new(&store, &registry);

        let mut params = ParamMap::new();
        params.insert("value".to_string(), Param::int(1));
        params.insert("stray".to_string(), Param::int(2));
        let mut graph = Graph::new();
        graph.insert(
            "v".to_string(),
            Vertex::op("echo", params, vec![]).unwrap(),
        );
        let err = executor.execute(&graph, &Context::new()).unwrap_err();
        assert!(err.to_string().contains("'stray'"), "got: {err}");
    }

    #[test]
    fn cancellation_stops_before_dispatch() {
        let store = MemoryStore::new();
        let registry = echo_registry();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let executor = Executor::new(&store, &registry).with_cancel(&cancel);

        let mut graph = Graph::new();
        graph.insert("v".to_string(), echo_vertex(Param::int(1)));
        let err = executor.execute(&graph, &Context::new()).unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(store.stats().puts, 0);
    }

    #[test]
    fn defaults_fill_absent_parameters() {
        struct WithDefault;

        impl Operation for WithDefault {
            fn signature(&self) -> OpSignature {
                OpSignature::new()
                    .required("a")
                    .optional("b", Value::int(10))
            }

            fn invoke(&self, args: &Manifest) -> Result<Value, OpError> {
                match (&args["a"], &args["b"]) {
                    (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                    _ => Err(OpError::new("a and b must be Int")),
                }
            }
        }

        let store = MemoryStore::new();
        let mut registry = Registry::new();
        registry.register("with_default", Arc::new(WithDefault));
        let executor = Executor::new(&store, &registry);

        let mut params = ParamMap::new();
        params.insert("a".to_string(), Param::int(5));
        let mut graph = Graph::new();
        graph.insert(
            "v".to_string(),
            Vertex::op("with_default", params, vec![]).unwrap(),
        );
        let results = executor.execute(&graph, &Context::new()).unwrap();
        assert_eq!(results["v"], Value::int(15));
    }
}
