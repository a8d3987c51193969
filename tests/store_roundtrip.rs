//! Store behaviour end-to-end: persistence across runs, tier promotion,
//! and Domain artifacts on disk.

mod helpers;

use std::collections::BTreeMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use invariant::exec::Executor;
use invariant::graph::Context;
use invariant::ops::poly::{self, Polynomial};
use invariant::store::chain::ChainStore;
use invariant::store::disk::DiskStore;
use invariant::store::memory::MemoryStore;
use invariant::store::null::NullStore;
use invariant::store::{ArtifactStore, TypeRegistry};
use invariant::value::{Artifact, Value};
use invariant::wire;

use helpers::counting_registry;

const DIGEST: &str = "8da18791ec7b03b92e492d66c7ebb9704d23855e6cac276f37e26d07c7f534a1";

fn poly_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    poly::register_types(&mut types);
    types
}

fn pipeline() -> invariant::graph::Graph {
    wire::parse(
        include_str!("fixtures/addition_pipeline.json"),
        &TypeRegistry::new(),
    )
    .expect("fixture parses")
}

#[test]
fn persistent_store_survives_executor_instances() {
    let dir = tempfile::tempdir().unwrap();
    let graph = pipeline();
    let (registry, dispatches) = counting_registry();

    let first = {
        let store = DiskStore::new(dir.path().join("cache"), poly_types());
        Executor::new(&store, &registry)
            .execute(&graph, &Context::new())
            .unwrap()
    };
    assert_eq!(dispatches.total(), 3);

    // A brand-new store over the same root sees every artifact.
    let store = DiskStore::new(dir.path().join("cache"), poly_types());
    let second = Executor::new(&store, &registry)
        .execute(&graph, &Context::new())
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(dispatches.total(), 3);
}

#[test]
fn domain_artifacts_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = Value::Domain(Arc::new(Polynomial::new(vec![
        1.into(),
        (-2).into(),
        300.into(),
    ])));

    {
        let store = DiskStore::new(dir.path().join("cache"), poly_types());
        store.put("poly:add", DIGEST, &artifact).unwrap();
    }

    let store = DiskStore::new(dir.path().join("cache"), poly_types());
    let loaded = store.get("poly:add", DIGEST).unwrap();
    assert_eq!(loaded, artifact);

    let Value::Domain(loaded) = loaded else {
        panic!("expected a Domain value");
    };
    assert_eq!(loaded.type_name(), Polynomial::TYPE_NAME);
}

#[test]
fn composite_values_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskStore::new(dir.path().join("cache"), poly_types());

    let mut map = BTreeMap::new();
    map.insert("ints".to_string(), Value::List(vec![Value::int(-1), Value::int(2)]));
    map.insert("flag".to_string(), Value::Bool(true));
    map.insert("name".to_string(), Value::str("déjà"));
    map.insert("nothing".to_string(), Value::Null);
    map.insert("exact".to_string(), Value::decimal_str("10.500").unwrap());
    map.insert(
        "poly".to_string(),
        Value::Domain(Arc::new(Polynomial::new(vec![7.into()]))),
    );
    let value = Value::Map(map);

    store.put("core:pack", DIGEST, &value).unwrap();
    assert_eq!(store.get("core:pack", DIGEST).unwrap(), value);
}

#[test]
fn chain_recovers_and_promotes_after_l1_loss() {
    let dir = tempfile::tempdir().unwrap();
    let chain = ChainStore::new(
        Box::new(MemoryStore::new()),
        Box::new(DiskStore::new(dir.path().join("cache"), poly_types())),
    );

    chain.put("op", DIGEST, &Value::int(8)).unwrap();
    chain.l1().clear().unwrap();
    assert!(!chain.l1().exists("op", DIGEST).unwrap());

    assert_eq!(chain.get("op", DIGEST).unwrap(), Value::int(8));
    assert!(chain.l1().exists("op", DIGEST).unwrap());
}

#[test]
fn chained_executor_reuses_l2_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let graph = pipeline();
    let (registry, dispatches) = counting_registry();

    {
        let chain = ChainStore::new(
            Box::new(MemoryStore::new()),
            Box::new(DiskStore::new(dir.path().join("cache"), poly_types())),
        );
        Executor::new(&chain, &registry)
            .execute(&graph, &Context::new())
            .unwrap();
    }
    assert_eq!(dispatches.total(), 3);

    // Fresh L1, same on-disk L2: still zero new dispatches.
    let chain = ChainStore::new(
        Box::new(MemoryStore::new()),
        Box::new(DiskStore::new(dir.path().join("cache"), poly_types())),
    );
    Executor::new(&chain, &registry)
        .execute(&graph, &Context::new())
        .unwrap();
    assert_eq!(dispatches.total(), 3);
}

#[test]
fn null_store_forces_execution_every_run() {
    let graph = pipeline();
    let store = NullStore::new();
    let (registry, dispatches) = counting_registry();
    let executor = Executor::new(&store, &registry);

    let first = executor.execute(&graph, &Context::new()).unwrap();
    let second = executor.execute(&graph, &Context::new()).unwrap();
    assert_eq!(first, second);
    assert_eq!(dispatches.total(), 6);
    assert_eq!(store.stats().puts, 0);
}
