//! Invariant and property tests for the Prefix-DHT
//! (`overlay_dht_sim::prefix`), exercised directly through its arena API.

use overlay_dht_sim::idspace::{common_prefix_hex, ID_HEX_LEN};
use overlay_dht_sim::prefix::Prefix;
use proptest::prelude::*;

fn build_prefix(ids: &[u128], leaf_l: usize) -> Prefix {
    let mut p = Prefix::new(leaf_l);
    for &id in ids {
        p.insert_bare(id);
    }
    p.rebuild_structures();
    p
}

fn distinct_ids_strategy(n: usize) -> impl Strategy<Value = Vec<u128>> {
    proptest::collection::hash_set(0u64.., n).prop_map(|set| set.into_iter().map(|v| v as u128).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every leaf-set member is distinct from self and the set never
    /// exceeds its configured capacity.
    #[test]
    fn leaf_set_excludes_self_and_bounds_capacity(ids in distinct_ids_strategy(12)) {
        let p = build_prefix(&ids, 6);
        for &id in &ids {
            let leaves = p.node(id).unwrap().leaf_set.nodes();
            prop_assert!(!leaves.contains(&id));
            prop_assert!(leaves.len() <= 6);
            let mut unique: Vec<u128> = leaves.to_vec();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), leaves.len());
        }
    }

    /// Every routing-table entry at row `r` genuinely shares exactly `r`
    /// hex digits of prefix with self -- never more, never less.
    #[test]
    fn routing_table_entries_share_exact_row_prefix(ids in distinct_ids_strategy(14)) {
        let p = build_prefix(&ids, 8);
        for &id in &ids {
            let node = p.node(id).unwrap();
            for row in 0..ID_HEX_LEN {
                for col in 0..16u8 {
                    if let Some(dest) = node.routing_table.entry(row, col) {
                        prop_assert_eq!(common_prefix_hex(id, dest), row);
                    }
                }
            }
        }
    }

    /// Routing from any node to any target's ID always terminates on a
    /// live node in the network (never a stale or nonexistent ID).
    #[test]
    fn routing_always_terminates_on_a_live_node(ids in distinct_ids_strategy(16), target in any::<u128>()) {
        let p = build_prefix(&ids, 8);
        let (dest, hops) = p.route(ids[0], target);
        prop_assert!(p.contains(dest));
        prop_assert!((hops as usize) <= ids.len() + 1);
    }
}

#[test]
fn leaf_set_is_empty_for_a_singleton_network() {
    let mut p = Prefix::new(16);
    p.insert_bare(42);
    p.rebuild_structures();
    assert!(p.node(42).unwrap().leaf_set.nodes().is_empty());
}

#[test]
fn store_load_overwrite_and_remove() {
    let mut p = Prefix::new(8);
    for id in [10u128, 200, 3000, 40000] {
        p.insert_bare(id);
    }
    p.rebuild_structures();

    let mut v1 = overlay_dht_sim::dataset::AttributeMap::new();
    v1.insert("popularity".into(), overlay_dht_sim::dataset::AttributeValue::Float(4.2));
    let (dest, _) = p.route(10, p.key_id("Amelie"));
    p.store(dest, "Amelie", v1.clone());
    assert_eq!(p.load(dest, "Amelie"), Some(&v1));

    let mut v2 = overlay_dht_sim::dataset::AttributeMap::new();
    v2.insert("popularity".into(), overlay_dht_sim::dataset::AttributeValue::Float(5.5));
    p.store(dest, "Amelie", v2.clone());
    assert_eq!(p.load(dest, "Amelie"), Some(&v2));

    assert!(p.remove_key(dest, "Amelie"));
    assert!(p.load(dest, "Amelie").is_none());
}
