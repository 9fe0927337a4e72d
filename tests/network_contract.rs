//! Contract-level tests for the `Network` trait, covering the six
//! concrete seeded scenarios plus the round-trip laws and boundary
//! behaviours.

use overlay_dht_sim::dataset::{AttributeMap, AttributeValue};
use overlay_dht_sim::{DhtError, Network, PrefixNetwork, RingNetwork};

fn popularity(v: f64) -> AttributeMap {
    let mut m = AttributeMap::new();
    m.insert("popularity".into(), AttributeValue::Float(v));
    m
}

/// Scenario 1: Ring-DHT, N=20, seed=0 — insert/lookup/update/lookup/
/// delete/lookup round trip.
#[test]
fn scenario_1_ring_put_update_delete_roundtrip() {
    let mut net = RingNetwork::new();
    net.build(20, 0);

    let h1 = net.insert("A", popularity(1.0)).unwrap();
    let (v, _h2) = net.lookup("A").unwrap();
    assert_eq!(v, Some(popularity(1.0)));

    let _h3 = net.update("A", popularity(2.0)).unwrap();
    let (v, _) = net.lookup("A").unwrap();
    assert_eq!(v, Some(popularity(2.0)));

    let _h4 = net.delete("A").unwrap();
    let (v, _) = net.lookup("A").unwrap();
    assert_eq!(v, None);

    assert!(h1 <= 25); // hop bound: |nodes| + 5
}

/// Scenario 2: Prefix-DHT, N=30, seed=1 — same round trip.
#[test]
fn scenario_2_prefix_put_update_delete_roundtrip() {
    let mut net = PrefixNetwork::new(16);
    net.build(30, 1);

    net.insert("Inception", popularity(99.0)).unwrap();
    let (v, _) = net.lookup("Inception").unwrap();
    assert_eq!(v, Some(popularity(99.0)));

    net.update("Inception", popularity(100.0)).unwrap();
    let (v, _) = net.lookup("Inception").unwrap();
    assert_eq!(v, Some(popularity(100.0)));

    net.delete("Inception").unwrap();
    let (v, _) = net.lookup("Inception").unwrap();
    assert_eq!(v, None);
}

/// Scenario 3: insert 20 distinct keys into a 20-node network of either
/// overlay; every key remains retrievable (a proxy for "the union of
/// per-node stores has all 20 keys").
#[test]
fn scenario_3_distinct_keys_all_retrievable_both_overlays() {
    let cases: [(Box<dyn Network>, &str); 2] = [
        (Box::new(RingNetwork::new()), "ring"),
        (Box::new(PrefixNetwork::new(16)), "prefix"),
    ];
    for (mut net, name) in cases {
        net.build(20, 5);
        for i in 0..20 {
            let key = format!("key-{i}");
            net.insert(&key, popularity(i as f64)).unwrap();
        }
        for i in 0..20 {
            let key = format!("key-{i}");
            let (v, _) = net.lookup(&key).unwrap();
            assert_eq!(v, Some(popularity(i as f64)), "overlay {name} lost key {key}");
        }
    }
}

/// Scenario 4: Ring-DHT, N=5, educational 2^20 space — after a middle
/// node leaves, every surviving node still has a successor/predecessor
/// among the survivors, and previously inserted keys remain retrievable.
#[test]
fn scenario_4_ring_leave_preserves_topology_and_keys_in_small_space() {
    use overlay_dht_sim::ring::Ring;

    let ids: Vec<u128> = vec![100_000, 300_000, 500_000, 700_000, 900_000];
    let mut ring = Ring::new(20);
    ring.join(ids[0], None);
    for &id in &ids[1..] {
        ring.join(id, Some(ids[0]));
    }
    for _ in 0..3 {
        for &id in &ids {
            ring.stabilise(id);
            ring.fix_fingers(id);
        }
    }

    let mut rec = AttributeMap::new();
    rec.insert("title".into(), AttributeValue::Text("x".into()));
    ring.put(ids[0], "x", rec.clone());
    ring.put(ids[0], "y", rec.clone());

    let middle = ids[2];
    ring.leave(middle);
    for _ in 0..3 {
        for &id in &ids {
            if id == middle {
                continue;
            }
            ring.stabilise(id);
            ring.fix_fingers(id);
        }
    }

    let survivors: Vec<u128> = ids.iter().copied().filter(|&i| i != middle).collect();
    for &id in &survivors {
        let node = ring.node(id).unwrap();
        assert!(survivors.contains(&node.successor));
        assert!(survivors.contains(&node.predecessor.unwrap()));
    }
    assert_eq!(ring.get(survivors[0], "x").unwrap(), vec![rec.clone()]);
    assert_eq!(ring.get(survivors[0], "y").unwrap(), vec![rec]);
}

/// Scenario 5: identical seed + identical workload on two independently
/// built networks yields identical hop sequences for every operation.
#[test]
fn scenario_5_determinism_across_independent_constructions() {
    fn run() -> Vec<u32> {
        let mut net = RingNetwork::new();
        net.build(30, 0);
        let mut hops = Vec::new();
        for i in 0..15 {
            let key = format!("k{i}");
            hops.push(net.insert(&key, popularity(i as f64)).unwrap());
        }
        for i in 0..15 {
            let key = format!("k{i}");
            hops.push(net.lookup(&key).unwrap().1);
        }
        hops
    }

    assert_eq!(run(), run());
}

/// Scenario 6: N=100, seed=0, 2000 inserts + 2000 lookups on both
/// overlays -- metrics carry both "insert" and "lookup" at count 2000.
#[test]
fn scenario_6_metrics_summary_counts_at_scale() {
    for mut net in [Box::new(RingNetwork::new()) as Box<dyn Network>, Box::new(PrefixNetwork::new(16)) as Box<dyn Network>] {
        net.build(100, 0);
        for i in 0..2000 {
            let key = format!("title-{i}");
            net.insert(&key, popularity(i as f64)).unwrap();
        }
        for i in 0..2000 {
            let key = format!("title-{i}");
            net.lookup(&key).unwrap();
        }
        let summary = net.metrics_summary();
        assert_eq!(summary["insert"].count, 2000);
        assert_eq!(summary["lookup"].count, 2000);
        assert!(summary["insert"].mean >= 0.0);
        assert!(summary["lookup"].mean >= 0.0);
    }
}

#[test]
fn empty_network_operations_error_except_join_and_leave() {
    let mut net = RingNetwork::new();
    assert_eq!(net.insert("a", popularity(1.0)).unwrap_err(), DhtError::EmptyNetwork);
    assert_eq!(net.lookup("a").unwrap_err(), DhtError::EmptyNetwork);
    assert_eq!(net.update("a", popularity(1.0)).unwrap_err(), DhtError::EmptyNetwork);
    assert_eq!(net.delete("a").unwrap_err(), DhtError::EmptyNetwork);
    assert_eq!(net.leave(None), 0);

    let cost = net.join();
    assert_eq!(cost, 0);
    assert_eq!(net.node_count(), 1);
    let (_, hops) = net.lookup("a").unwrap();
    assert_eq!(hops, 0);
}

#[test]
fn join_leave_preserve_all_live_keys_over_several_cycles() {
    let mut net = PrefixNetwork::new(8);
    net.build(15, 11);
    for i in 0..10 {
        net.insert(&format!("k{i}"), popularity(i as f64)).unwrap();
    }
    for _ in 0..4 {
        net.join();
        net.leave(None);
    }
    for i in 0..10 {
        let (v, _) = net.lookup(&format!("k{i}")).unwrap();
        assert_eq!(v, Some(popularity(i as f64)));
    }
}
