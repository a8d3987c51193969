//! Graph validation and topological ordering.

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::error::EngineError;
use crate::exec::registry::Registry;
use crate::graph::{Context, Graph, Vertex};

/// Validates the graph and returns vertex names in execution order.
///
/// Checks, in order: every dependency is a vertex or a context key; every
/// op name is registered (when a registry is supplied); the dependency
/// digraph is acyclic. The returned order is Kahn's algorithm over the
/// vertex-only edges, with ties broken by original vertex position so the
/// order is stable for an unchanged graph. Context dependencies are
/// pre-bound and contribute no in-edges.
pub fn execution_order(
    graph: &Graph,
    context: &Context,
    registry: Option<&Registry>,
) -> Result<Vec<String>, EngineError> {
    validate(graph, context, registry)?;
    Ok(kahn_order(graph))
}

/// Validation alone: dependency references, operation registration, and
/// acyclicity, in that order.
pub fn validate(
    graph: &Graph,
    context: &Context,
    registry: Option<&Registry>,
) -> Result<(), EngineError> {
    validate_deps(graph, context)?;
    if let Some(registry) = registry {
        validate_ops(graph, registry)?;
    }
    detect_cycle(graph)
}

fn validate_deps(graph: &Graph, context: &Context) -> Result<(), EngineError> {
    for (name, vertex) in graph {
        for dep in vertex.deps() {
            if !graph.contains_key(dep) && !context.contains_key(dep) {
                return Err(EngineError::validation(
                    format!("dependency '{dep}' is not a vertex or context key"),
                    Some(name.clone()),
                ));
            }
        }
    }
    Ok(())
}

fn validate_ops(graph: &Graph, registry: &Registry) -> Result<(), EngineError> {
    for (name, vertex) in graph {
        if let Vertex::Op(op) = vertex {
            if !registry.contains(&op.op_name) {
                return Err(EngineError::validation(
                    format!("operation '{}' is not registered", op.op_name),
                    Some(name.clone()),
                ));
            }
        }
    }
    Ok(())
}

/// Builds the dependency digraph (dep → vertex) and reports one vertex on
/// any cycle.
fn detect_cycle(graph: &Graph) -> Result<(), EngineError> {
    let mut digraph: DiGraph<&str, ()> = DiGraph::new();
    let indices: Vec<_> = graph.keys().map(|name| digraph.add_node(name.as_str())).collect();

    for (i, (_, vertex)) in graph.iter().enumerate() {
        for dep in vertex.deps() {
            if let Some(dep_pos) = graph.get_index_of(dep) {
                digraph.add_edge(indices[dep_pos], indices[i], ());
            }
        }
    }

    match toposort(&digraph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => {
            let name = digraph[cycle.node_id()];
            Err(EngineError::validation(
                format!("dependency cycle detected at vertex '{name}'"),
                Some(name.to_string()),
            ))
        }
    }
}

/// Kahn's algorithm with a ready set ordered by original vertex position.
/// The graph is known acyclic by the time this runs.
fn kahn_order(graph: &Graph) -> Vec<String> {
    let n = graph.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, (_, vertex)) in graph.iter().enumerate() {
        for dep in vertex.deps() {
            if let Some(dep_pos) = graph.get_index_of(dep) {
                in_degree[i] += 1;
                dependents[dep_pos].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(&pos) = ready.iter().next() {
        ready.remove(&pos);
        let (name, _) = graph.get_index(pos).expect("position is in range");
        order.push(name.clone());
        for &dependent in &dependents[pos] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    order
}
