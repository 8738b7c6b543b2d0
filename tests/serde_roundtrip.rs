//! Serialization of the public value types behind the `serde` feature.
#![cfg(feature = "serde")]

use replica_kit::prelude::*;
use replica_kit::registry::{Namespace, Registered};

#[test]
fn engine_config_roundtrip() {
    let config = EngineConfig::default()
        .with_min_capacity(8)
        .with_parallelism_hint(12);
    let json = serde_json::to_string(&config).unwrap();
    let back: EngineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
    assert_eq!(back.effective_capacity().unwrap(), 12);
}

#[test]
fn engine_config_from_hand_written_json() {
    let config: EngineConfig =
        serde_json::from_str(r#"{"capacity":3,"min_capacity":64,"parallelism_hint":null}"#)
            .unwrap();
    assert_eq!(config.effective_capacity().unwrap(), 3);
}

#[test]
fn counter_roundtrip() {
    let mut counter = Counter::new();
    counter.increment_by(-7);
    let json = serde_json::to_string(&counter).unwrap();
    assert_eq!(json, r#"{"value":-7}"#);
    let back: Counter = serde_json::from_str(&json).unwrap();
    assert_eq!(back, counter);
}

#[test]
fn histogram_roundtrip_keeps_contents() {
    let ns = Namespace::new("serde-contents");
    let _scope = ns.enter();
    let mut h = Histogram::new("pt", 4, 0.0, 4.0);
    h.fill(0.5);
    h.fill(2.5);
    h.fill_weighted(3.5, 2.0);
    h.fill(9.0);

    let json = serde_json::to_string(&h).unwrap();
    assert!(!json.contains("namespace"));
    let back: Histogram = serde_json::from_str(&json).unwrap();

    assert_eq!(back.name(), "pt");
    assert_eq!(back.bins(), 4);
    assert_eq!(back.range(), (0.0, 4.0));
    assert_eq!(back.bin(3), 2.0);
    assert_eq!(back.overflow(), 1.0);
    assert_eq!(back.entries(), 4);
    assert_eq!(back.mean(), h.mean());
}

#[test]
fn deserialized_histogram_joins_current_scope() {
    let json = {
        let source = Namespace::new("serde-source");
        let _scope = source.enter();
        serde_json::to_string(&Histogram::new("eta", 2, 0.0, 1.0)).unwrap()
    };

    let ns = Namespace::new("serde-target");
    {
        let _scope = ns.enter();
        let back: Histogram = serde_json::from_str(&json).unwrap();
        assert!(back.namespace().unwrap().ptr_eq(&ns));
        assert_eq!(ns.count("eta"), 1);
    }
    assert!(ns.is_empty());
}

#[test]
fn degenerate_histogram_json_is_fixed_up() {
    let ns = Namespace::new("serde-shape");
    let _scope = ns.enter();
    let json = r#"{"name":"h","lo":2.0,"hi":2.0,"bins":[],"underflow":0.0,
        "overflow":0.0,"entries":0,"sum_w":0.0,"sum_wx":0.0}"#;
    let back: Histogram = serde_json::from_str(json).unwrap();
    assert_eq!(back.bins(), 1);
    assert_eq!(back.range(), (2.0, 3.0));
}
