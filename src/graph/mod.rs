//! Graph model: parameter trees, vertices, and construction invariants.

pub mod sort;

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::error::EngineError;
use crate::value::Value;

/// A leaf or branch of a vertex's parameter tree. Markers (`Ref`, `Cel`,
/// and `Str` carrying `${…}`) are resolved in phase 1; everything else
/// passes through as a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// An inert literal value, exempt from marker interpretation.
    Lit(Value),
    /// A string literal, subject to `${…}` interpolation.
    Str(String),
    /// Reference marker: resolves to the named dependency's artifact.
    Ref(String),
    /// Expression marker: resolves to the expression's result.
    Cel(String),
    List(Vec<Param>),
    Map(BTreeMap<String, Param>),
}

impl Param {
    pub fn int(n: i64) -> Self {
        Param::Lit(Value::int(n))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Param::Str(s.into())
    }

    pub fn reference(dep: impl Into<String>) -> Self {
        Param::Ref(dep.into())
    }

    pub fn cel(source: impl Into<String>) -> Self {
        Param::Cel(source.into())
    }
}

/// A vertex's parameter map. Resolving it yields the manifest.
pub type ParamMap = BTreeMap<String, Param>;

/// A user-defined graph: vertex name → vertex, in insertion order.
/// Insertion order breaks ties between siblings during the sort.
pub type Graph = IndexMap<String, Vertex>;

/// Caller-provided bindings addressable as dependencies but excluded from
/// the result map.
pub type Context = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Vertex {
    Op(OpVertex),
    SubGraph(SubGraphVertex),
}

/// A vertex that dispatches to a named operation.
#[derive(Debug, Clone)]
pub struct OpVertex {
    pub op_name: String,
    pub params: ParamMap,
    pub deps: Vec<String>,
    /// `false` makes the vertex ephemeral: never read from or written to
    /// the store, dispatched on every run.
    pub cache: bool,
}

/// A vertex whose body is itself a graph. Executes recursively against the
/// shared store; only the artifact of the `output` inner vertex is visible
/// to the parent.
#[derive(Debug, Clone)]
pub struct SubGraphVertex {
    pub params: ParamMap,
    pub deps: Vec<String>,
    pub graph: Graph,
    pub output: String,
}

impl Vertex {
    /// Builds an op vertex with caching on.
    pub fn op(
        op_name: impl Into<String>,
        params: ParamMap,
        deps: Vec<String>,
    ) -> Result<Self, EngineError> {
        Vertex::op_with_cache(op_name, params, deps, true)
    }

    /// Builds an ephemeral op vertex: always dispatched, never stored.
    pub fn op_ephemeral(
        op_name: impl Into<String>,
        params: ParamMap,
        deps: Vec<String>,
    ) -> Result<Self, EngineError> {
        Vertex::op_with_cache(op_name, params, deps, false)
    }

    pub fn op_with_cache(
        op_name: impl Into<String>,
        params: ParamMap,
        deps: Vec<String>,
        cache: bool,
    ) -> Result<Self, EngineError> {
        let op_name = op_name.into();
        if op_name.trim().is_empty() {
            return Err(EngineError::validation("operation name is empty", None));
        }
        check_refs_declared(&params, &deps)?;
        Ok(Vertex::Op(OpVertex {
            op_name,
            params,
            deps,
            cache,
        }))
    }

    pub fn subgraph(
        params: ParamMap,
        deps: Vec<String>,
        graph: Graph,
        output: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let output = output.into();
        if !graph.contains_key(&output) {
            return Err(EngineError::validation(
                format!("sub-graph output '{output}' is not an inner vertex"),
                None,
            ));
        }
        check_refs_declared(&params, &deps)?;
        Ok(Vertex::SubGraph(SubGraphVertex {
            params,
            deps,
            graph,
            output,
        }))
    }

    pub fn params(&self) -> &ParamMap {
        match self {
            Vertex::Op(v) => &v.params,
            Vertex::SubGraph(v) => &v.params,
        }
    }

    pub fn deps(&self) -> &[String] {
        match self {
            Vertex::Op(v) => &v.deps,
            Vertex::SubGraph(v) => &v.deps,
        }
    }
}

/// Every reference marker anywhere in the tree must name a declared dep.
fn check_refs_declared(params: &ParamMap, deps: &[String]) -> Result<(), EngineError> {
    for param in params.values() {
        walk_refs(param, &mut |name| {
            if deps.iter().any(|d| d == name) {
                Ok(())
            } else {
                Err(EngineError::validation(
                    format!("reference to '{name}' is not declared as a dependency"),
                    None,
                ))
            }
        })?;
    }
    Ok(())
}

fn walk_refs(
    param: &Param,
    visit: &mut impl FnMut(&str) -> Result<(), EngineError>,
) -> Result<(), EngineError> {
    match param {
        Param::Ref(name) => visit(name),
        Param::List(items) => {
            for item in items {
                walk_refs(item, visit)?;
            }
            Ok(())
        }
        Param::Map(entries) => {
            for value in entries.values() {
                walk_refs(value, visit)?;
            }
            Ok(())
        }
        Param::Lit(_) | Param::Str(_) | Param::Cel(_) => Ok(()),
    }
}
