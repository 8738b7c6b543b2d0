//! Registered types get private per-slot namespaces.

use std::thread;

use replica_kit::prelude::*;
use replica_kit::registry::{Catalog, Namespace, Registered};
use replica_kit::{namespace_name, ROOT_NAMESPACE};

#[test]
fn model_and_replicas_are_detached() {
    let engine = Replicated::from_fn(|| Histogram::new("managed-detached", 5, 0.0, 5.0));
    let index = engine.engine_index();

    let slot_ns = Catalog::global().get(&namespace_name(index, 0)).unwrap();
    assert!(engine.model().namespace().is_none());

    let replica = engine.get().unwrap();
    assert!(replica.lock().namespace().is_none());
    assert!(slot_ns.is_empty());
}

#[test]
fn replicas_do_not_pile_up_in_the_callers_namespace() {
    let ns = Namespace::new("caller");
    let _scope = ns.enter();
    let engine = Replicated::from_fn(|| Histogram::new("pileup", 4, 0.0, 4.0));

    thread::scope(|s| {
        for i in 0..4 {
            let engine = &engine;
            s.spawn(move || engine.get().unwrap().lock().fill(f64::from(i)));
        }
    });

    assert!(ns.is_empty());
    let total = engine.merge().into_inner();
    assert_eq!(total.lock().integral(), 4.0);
    assert_eq!(total.lock().name(), "pileup");
}

#[test]
fn snapshot_target_does_not_stay_registered() {
    let engine = Replicated::from_fn(|| Histogram::new("managed-snapshot", 2, 0.0, 2.0));
    engine.with(|h| h.fill(1.5)).unwrap();

    let snapshot = engine.snapshot_merge().into_inner();
    assert_eq!(snapshot.bin(1), 1.0);
    assert!(snapshot.namespace().is_none());

    let root = Catalog::global().mkdir(ROOT_NAMESPACE);
    assert!(!root.contains("managed-snapshot"));
}

#[test]
fn namespaces_are_released_with_the_engine() {
    let engine = Replicated::from_fn(|| Histogram::new("managed-release", 2, 0.0, 2.0));
    let name = namespace_name(engine.engine_index(), engine.capacity() - 1);
    assert!(Catalog::global().get(&name).is_some());

    drop(engine);
    assert!(Catalog::global().get(&name).is_none());
}

#[test]
fn plain_types_get_no_namespaces() {
    let engine = Replicated::with_capacity(3, Counter::new()).unwrap();
    let name = namespace_name(engine.engine_index(), 0);
    assert!(Catalog::global().get(&name).is_none());
}
