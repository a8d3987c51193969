//! Distributive-law pipeline over the `poly` package.

mod helpers;

use pretty_assertions::assert_eq;

use invariant::exec::Executor;
use invariant::graph::{Context, Graph, Param, ParamMap, Vertex};
use invariant::store::memory::MemoryStore;
use invariant::value::Value;

use helpers::counting_registry;

fn coefficients(values: &[i64]) -> Param {
    Param::List(values.iter().map(|&v| Param::int(v)).collect())
}

fn from_coefficients(values: &[i64]) -> Vertex {
    let mut params = ParamMap::new();
    params.insert("coefficients".to_string(), coefficients(values));
    Vertex::op("poly:from_coefficients", params, vec![]).unwrap()
}

fn binop(op_name: &str, a: &str, b: &str) -> Vertex {
    let mut params = ParamMap::new();
    params.insert("a".to_string(), Param::reference(a));
    params.insert("b".to_string(), Param::reference(b));
    Vertex::op(op_name, params, vec![a.to_string(), b.to_string()]).unwrap()
}

fn evaluate(p: &str, x: i64) -> Vertex {
    let mut params = ParamMap::new();
    params.insert("p".to_string(), Param::reference(p));
    params.insert("x".to_string(), Param::int(x));
    Vertex::op("poly:evaluate", params, vec![p.to_string()]).unwrap()
}

#[test]
fn distributive_law_holds_and_dedupes() {
    // p = 1 + 2x + x^2, q = 3 - x^2, r = 1 + x.
    let mut graph = Graph::new();
    graph.insert("p".to_string(), from_coefficients(&[1, 2, 1]));
    graph.insert("q".to_string(), from_coefficients(&[3, 0, -1]));
    graph.insert("r".to_string(), from_coefficients(&[1, 1]));
    graph.insert("p_plus_q".to_string(), binop("poly:add", "p", "q"));
    graph.insert("lhs".to_string(), binop("poly:multiply", "p_plus_q", "r"));
    graph.insert("p_times_r".to_string(), binop("poly:multiply", "p", "r"));
    graph.insert("q_times_r".to_string(), binop("poly:multiply", "q", "r"));
    graph.insert("rhs".to_string(), binop("poly:add", "p_times_r", "q_times_r"));
    graph.insert("eval_lhs".to_string(), evaluate("lhs", 5));
    graph.insert("eval_rhs".to_string(), evaluate("rhs", 5));

    let store = MemoryStore::new();
    let (registry, dispatches) = counting_registry();
    let executor = Executor::new(&store, &registry);

    let results = executor.execute(&graph, &Context::new()).unwrap();

    // (p + q) * r == p * r + q * r, structurally.
    assert_eq!(results["lhs"], results["rhs"]);

    // Both sides evaluate to the same integer at x = 5:
    // (4 + 2x)(1 + x) = 4 + 6x + 2x^2 → 4 + 30 + 50 = 84.
    assert_eq!(results["eval_lhs"], Value::int(84));
    assert_eq!(results["eval_rhs"], Value::int(84));

    // Three distinct products over a cold store.
    assert_eq!(dispatches.of("poly:multiply"), 3);

    // lhs and rhs are equal artifacts, so the two evaluate vertices share
    // one (op, digest) key: a single dispatch.
    assert_eq!(dispatches.of("poly:evaluate"), 1);
    assert_eq!(dispatches.of("poly:from_coefficients"), 3);
    assert_eq!(dispatches.of("poly:add"), 2);
}

#[test]
fn polynomial_attributes_flow_through_expressions() {
    let mut graph = Graph::new();
    graph.insert("p".to_string(), from_coefficients(&[1, 2, 1]));

    let mut params = ParamMap::new();
    params.insert("value".to_string(), Param::cel("p.degree * 10 + size(p.coefficients)"));
    graph.insert(
        "shape".to_string(),
        Vertex::op("core:identity", params, vec!["p".to_string()]).unwrap(),
    );

    let store = MemoryStore::new();
    let (registry, _) = counting_registry();
    let executor = Executor::new(&store, &registry);

    let results = executor.execute(&graph, &Context::new()).unwrap();
    assert_eq!(results["shape"], Value::int(23));
}
