//! The orchestrator layer: a uniform `Network` contract implemented once
//! per overlay (`RingNetwork`, `PrefixNetwork`), each wrapping the bare
//! node arena (`ring::Ring` / `prefix::Prefix`) with random-start routing,
//! hop-count metrics, and the join/leave cost model.
//!
//! Both implementations guard all mutable state behind a single coarse
//! `std::sync::Mutex` — there is no async runtime here since this crate
//! performs no I/O — and share a seeded RNG for reproducible random-start
//! routing and a snapshot/count-changed cost proxy for join/leave.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::dataset::AttributeMap;
use crate::error::DhtError;
use crate::idspace::{self, ID_BITS, ID_HEX_LEN};
use crate::metrics::{Metrics, Summary};
use crate::prefix::Prefix;
use crate::ring::Ring;

/// The uniform contract both overlays expose, so experiment drivers and
/// comparative tests can treat `RingNetwork`/`PrefixNetwork`
/// interchangeably.
pub trait Network {
    fn build(&mut self, n_nodes: usize, seed: u64);
    fn insert(&mut self, key: &str, value: AttributeMap) -> Result<u32, DhtError>;
    fn lookup(&mut self, key: &str) -> Result<(Option<AttributeMap>, u32), DhtError>;
    fn update(&mut self, key: &str, value: AttributeMap) -> Result<u32, DhtError>;
    fn delete(&mut self, key: &str) -> Result<u32, DhtError>;
    fn join(&mut self) -> u32;
    fn leave(&mut self, node_id: Option<u128>) -> u32;
    fn metrics_summary(&self) -> HashMap<String, Summary>;
    fn node_count(&self) -> usize;
}

fn random_id<R: Rng + ?Sized>(rng: &mut R, ids: &[u128]) -> u128 {
    ids[rng.gen_range(0..ids.len())]
}

fn unique_random_id<R: Rng + ?Sized>(rng: &mut R, taken: impl Fn(u128) -> bool) -> u128 {
    loop {
        let candidate: u128 = rng.gen();
        if !taken(candidate) {
            return candidate;
        }
    }
}

// =====================================================================
// Ring-DHT network
// =====================================================================

type RingSnapshot = HashMap<u128, (u128, Option<u128>, Vec<u128>)>;

fn ring_snapshot(ring: &Ring) -> RingSnapshot {
    ring.ids()
        .map(|id| {
            let n = ring.node(id).expect("id came from ring.ids()");
            (id, (n.successor, n.predecessor, n.finger.clone()))
        })
        .collect()
}

fn count_changed<K: Eq + std::hash::Hash, V: PartialEq>(before: &HashMap<K, V>, after: &HashMap<K, V>) -> u32 {
    let mut changed = 0;
    for (id, b) in before {
        if let Some(a) = after.get(id) {
            if a != b {
                changed += 1;
            }
        }
    }
    changed
}

/// Drain every node's storage and reinsert each key-ID via fresh routing
/// from a random start node. Returns the total migration hop count. Used
/// identically by both join (new node may now own some keys) and leave
/// (departing node's keys must land somewhere).
fn rebalance_ring(ring: &mut Ring, rng: &mut StdRng) -> u32 {
    let all = ring.drain_all_data();
    let mut ordered: Vec<_> = all.into_iter().collect();
    ordered.sort_unstable_by_key(|(key_id, _)| *key_id);
    let mut hops_total = 0u32;
    for (key_id, values) in ordered {
        if ring.is_empty() {
            warn!(key_id = %idspace::to_hex(key_id), "dropped key: ring emptied during rebalance");
            break;
        }
        let mut ids: Vec<u128> = ring.ids().collect();
        ids.sort_unstable();
        let start = random_id(rng, &ids);
        let (dest, hops) = ring.route_with_fuse(start, key_id);
        ring.store_raw(dest, key_id, values);
        hops_total += hops;
    }
    hops_total
}

struct RingInner {
    ring: Ring,
    metrics: Metrics,
    rng: StdRng,
}

/// The Chord-style comparative network: single-value overwrite semantics,
/// full topology rebuild (not gossip) on every join/leave.
pub struct RingNetwork(Mutex<RingInner>);

impl RingNetwork {
    pub fn new() -> Self {
        Self(Mutex::new(RingInner {
            ring: Ring::new(ID_BITS),
            metrics: Metrics::new(),
            rng: StdRng::seed_from_u64(0),
        }))
    }
}

impl Default for RingNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Network for RingNetwork {
    fn build(&mut self, n_nodes: usize, seed: u64) {
        let mut inner = self.0.lock().expect("ring network mutex poisoned");
        inner.rng = StdRng::seed_from_u64(seed);
        inner.ring = Ring::new(ID_BITS);
        inner.metrics = Metrics::new();
        while inner.ring.len() < n_nodes {
            let id = unique_random_id(&mut inner.rng, |c| inner.ring.contains(c));
            inner.ring.insert_bare(id);
        }
        inner.ring.rebuild_topology();
        debug!(n_nodes, "ring network built");
    }

    fn insert(&mut self, key: &str, value: AttributeMap) -> Result<u32, DhtError> {
        let mut inner = self.0.lock().expect("ring network mutex poisoned");
        if inner.ring.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let key_id = idspace::hash128(key);
        let mut ids: Vec<u128> = inner.ring.ids().collect();
        ids.sort_unstable();
        let start = random_id(&mut inner.rng, &ids);
        let (dest, hops) = inner.ring.route_with_fuse(start, key_id);
        inner.ring.store_raw(dest, key_id, vec![value]);
        inner.metrics.record("insert", hops);
        Ok(hops)
    }

    fn lookup(&mut self, key: &str) -> Result<(Option<AttributeMap>, u32), DhtError> {
        let mut inner = self.0.lock().expect("ring network mutex poisoned");
        if inner.ring.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let key_id = idspace::hash128(key);
        let mut ids: Vec<u128> = inner.ring.ids().collect();
        ids.sort_unstable();
        let start = random_id(&mut inner.rng, &ids);
        let (dest, hops) = inner.ring.route_with_fuse(start, key_id);
        let value = inner.ring.get_raw(dest, key_id).and_then(|v| v.first().cloned());
        if value.is_none() {
            debug!(key, "lookup miss");
        }
        inner.metrics.record("lookup", hops);
        Ok((value, hops))
    }

    fn update(&mut self, key: &str, value: AttributeMap) -> Result<u32, DhtError> {
        let mut inner = self.0.lock().expect("ring network mutex poisoned");
        if inner.ring.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let key_id = idspace::hash128(key);
        let mut ids: Vec<u128> = inner.ring.ids().collect();
        ids.sort_unstable();
        let start = random_id(&mut inner.rng, &ids);
        let (dest, hops) = inner.ring.route_with_fuse(start, key_id);
        if inner.ring.get_raw(dest, key_id).is_none() {
            debug!(key, "update on absent key: storing anyway (overwrite contract)");
        }
        inner.ring.store_raw(dest, key_id, vec![value]);
        inner.metrics.record("update", hops);
        Ok(hops)
    }

    fn delete(&mut self, key: &str) -> Result<u32, DhtError> {
        let mut inner = self.0.lock().expect("ring network mutex poisoned");
        if inner.ring.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let key_id = idspace::hash128(key);
        let mut ids: Vec<u128> = inner.ring.ids().collect();
        ids.sort_unstable();
        let start = random_id(&mut inner.rng, &ids);
        let (dest, hops) = inner.ring.route_with_fuse(start, key_id);
        inner.ring.remove_raw(dest, key_id);
        inner.metrics.record("delete", hops);
        Ok(hops)
    }

    fn join(&mut self) -> u32 {
        let mut inner = self.0.lock().expect("ring network mutex poisoned");
        if inner.ring.is_empty() {
            let id: u128 = inner.rng.gen();
            inner.ring.insert_bare(id);
            inner.ring.rebuild_topology();
            inner.metrics.record("join", 0);
            return 0;
        }

        let before = ring_snapshot(&inner.ring);

        let new_id = unique_random_id(&mut inner.rng, |c| inner.ring.contains(c));
        let mut existing_ids: Vec<u128> = inner.ring.ids().collect();
        existing_ids.sort_unstable();
        let bootstrap = random_id(&mut inner.rng, &existing_ids);
        let (_, route_hops) = inner.ring.route_with_fuse(bootstrap, new_id);

        inner.ring.insert_bare(new_id);
        inner.ring.rebuild_topology();

        let migration_hops = rebalance_ring(&mut inner.ring, &mut inner.rng);

        let after = ring_snapshot(&inner.ring);
        let update_cost = count_changed(&before, &after);
        let total = route_hops + update_cost + migration_hops;
        inner.metrics.record("join", total);
        total
    }

    fn leave(&mut self, node_id: Option<u128>) -> u32 {
        let mut inner = self.0.lock().expect("ring network mutex poisoned");
        if inner.ring.is_empty() {
            inner.metrics.record("leave", 0);
            return 0;
        }
        let id = match node_id {
            Some(i) if inner.ring.contains(i) => i,
            Some(_) => {
                inner.metrics.record("leave", 0);
                return 0;
            }
            None => {
                let mut ids: Vec<u128> = inner.ring.ids().collect();
                ids.sort_unstable();
                random_id(&mut inner.rng, &ids)
            }
        };

        let before = ring_snapshot(&inner.ring);
        let departing_data = inner.ring.remove_bare(id);

        let mut migration_hops = 0;
        if !inner.ring.is_empty() {
            if let Some(data) = departing_data {
                let any = inner.ring.ids().next().expect("ring is non-empty");
                for (key_id, values) in data {
                    inner.ring.merge_raw(any, key_id, values);
                }
            }
            inner.ring.rebuild_topology();
            migration_hops = rebalance_ring(&mut inner.ring, &mut inner.rng);
        }

        let after = ring_snapshot(&inner.ring);
        let update_cost = count_changed(&before, &after);
        let total = update_cost + migration_hops;
        inner.metrics.record("leave", total);
        total
    }

    fn metrics_summary(&self) -> HashMap<String, Summary> {
        self.0.lock().expect("ring network mutex poisoned").metrics.summary()
    }

    fn node_count(&self) -> usize {
        self.0.lock().expect("ring network mutex poisoned").ring.len()
    }
}

// =====================================================================
// Prefix-DHT network
// =====================================================================

type PrefixSnapshot = HashMap<u128, (Vec<u128>, Vec<(usize, u8, u128)>)>;

fn prefix_snapshot(prefix: &Prefix) -> PrefixSnapshot {
    prefix
        .ids()
        .map(|id| {
            let n = prefix.node(id).expect("id came from prefix.ids()");
            let mut leaf: Vec<u128> = n.leaf_set.nodes().to_vec();
            leaf.sort_unstable();
            let mut rt_items = Vec::new();
            for row in 0..ID_HEX_LEN {
                for col in 0..16u8 {
                    if let Some(dest) = n.routing_table.entry(row, col) {
                        rt_items.push((row, col, dest));
                    }
                }
            }
            rt_items.sort_unstable();
            (id, (leaf, rt_items))
        })
        .collect()
}

fn rebalance_prefix(prefix: &mut Prefix, rng: &mut StdRng) -> u32 {
    let all = prefix.drain_all_data();
    let mut ordered: Vec<_> = all.into_iter().collect();
    ordered.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
    let mut hops_total = 0u32;
    for (key, value) in ordered {
        if prefix.is_empty() {
            warn!(key, "dropped key: prefix network emptied during rebalance");
            break;
        }
        let key_id = prefix.key_id(&key);
        let mut ids: Vec<u128> = prefix.ids().collect();
        ids.sort_unstable();
        let start = random_id(rng, &ids);
        let (dest, hops) = prefix.route(start, key_id);
        prefix.store(dest, &key, value);
        hops_total += hops;
    }
    hops_total
}

struct PrefixInner {
    prefix: Prefix,
    metrics: Metrics,
    rng: StdRng,
}

/// The Pastry-style comparative network: single-value overwrite
/// semantics at every layer, deterministic leaf-set/routing-table rebuild
/// on every join/leave.
pub struct PrefixNetwork {
    inner: Mutex<PrefixInner>,
    leaf_l: usize,
}

impl PrefixNetwork {
    pub fn new(leaf_l: usize) -> Self {
        Self {
            inner: Mutex::new(PrefixInner {
                prefix: Prefix::new(leaf_l),
                metrics: Metrics::new(),
                rng: StdRng::seed_from_u64(0),
            }),
            leaf_l,
        }
    }
}

impl Default for PrefixNetwork {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Network for PrefixNetwork {
    fn build(&mut self, n_nodes: usize, seed: u64) {
        let mut inner = self.inner.lock().expect("prefix network mutex poisoned");
        inner.rng = StdRng::seed_from_u64(seed);
        inner.prefix = Prefix::new(self.leaf_l);
        inner.metrics = Metrics::new();
        while inner.prefix.len() < n_nodes {
            let id = unique_random_id(&mut inner.rng, |c| inner.prefix.contains(c));
            inner.prefix.insert_bare(id);
        }
        inner.prefix.rebuild_structures();
        debug!(n_nodes, "prefix network built");
    }

    fn insert(&mut self, key: &str, value: AttributeMap) -> Result<u32, DhtError> {
        let mut inner = self.inner.lock().expect("prefix network mutex poisoned");
        if inner.prefix.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let key_id = inner.prefix.key_id(key);
        let mut ids: Vec<u128> = inner.prefix.ids().collect();
        ids.sort_unstable();
        let start = random_id(&mut inner.rng, &ids);
        let (dest, hops) = inner.prefix.route(start, key_id);
        inner.prefix.store(dest, key, value);
        inner.metrics.record("insert", hops);
        Ok(hops)
    }

    fn lookup(&mut self, key: &str) -> Result<(Option<AttributeMap>, u32), DhtError> {
        let mut inner = self.inner.lock().expect("prefix network mutex poisoned");
        if inner.prefix.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let key_id = inner.prefix.key_id(key);
        let mut ids: Vec<u128> = inner.prefix.ids().collect();
        ids.sort_unstable();
        let start = random_id(&mut inner.rng, &ids);
        let (dest, hops) = inner.prefix.route(start, key_id);
        let value = inner.prefix.load(dest, key).cloned();
        if value.is_none() {
            debug!(key, "lookup miss");
        }
        inner.metrics.record("lookup", hops);
        Ok((value, hops))
    }

    fn update(&mut self, key: &str, value: AttributeMap) -> Result<u32, DhtError> {
        let mut inner = self.inner.lock().expect("prefix network mutex poisoned");
        if inner.prefix.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let key_id = inner.prefix.key_id(key);
        let mut ids: Vec<u128> = inner.prefix.ids().collect();
        ids.sort_unstable();
        let start = random_id(&mut inner.rng, &ids);
        let (dest, hops) = inner.prefix.route(start, key_id);
        if inner.prefix.load(dest, key).is_none() {
            debug!(key, "update on absent key: storing anyway (overwrite contract)");
        }
        inner.prefix.store(dest, key, value);
        inner.metrics.record("update", hops);
        Ok(hops)
    }

    fn delete(&mut self, key: &str) -> Result<u32, DhtError> {
        let mut inner = self.inner.lock().expect("prefix network mutex poisoned");
        if inner.prefix.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let key_id = inner.prefix.key_id(key);
        let mut ids: Vec<u128> = inner.prefix.ids().collect();
        ids.sort_unstable();
        let start = random_id(&mut inner.rng, &ids);
        let (dest, hops) = inner.prefix.route(start, key_id);
        inner.prefix.remove_key(dest, key);
        inner.metrics.record("delete", hops);
        Ok(hops)
    }

    fn join(&mut self) -> u32 {
        let mut inner = self.inner.lock().expect("prefix network mutex poisoned");
        if inner.prefix.is_empty() {
            let id: u128 = inner.rng.gen();
            inner.prefix.insert_bare(id);
            inner.prefix.rebuild_structures();
            inner.metrics.record("join", 0);
            return 0;
        }

        let before = prefix_snapshot(&inner.prefix);

        let new_id = unique_random_id(&mut inner.rng, |c| inner.prefix.contains(c));
        let mut existing_ids: Vec<u128> = inner.prefix.ids().collect();
        existing_ids.sort_unstable();
        let bootstrap = random_id(&mut inner.rng, &existing_ids);
        let (_, route_hops) = inner.prefix.route(bootstrap, new_id);

        inner.prefix.insert_bare(new_id);
        inner.prefix.rebuild_structures();

        let migration_hops = rebalance_prefix(&mut inner.prefix, &mut inner.rng);

        let after = prefix_snapshot(&inner.prefix);
        let update_cost = count_changed(&before, &after);
        let total = route_hops + update_cost + migration_hops;
        inner.metrics.record("join", total);
        total
    }

    fn leave(&mut self, node_id: Option<u128>) -> u32 {
        let mut inner = self.inner.lock().expect("prefix network mutex poisoned");
        if inner.prefix.is_empty() {
            inner.metrics.record("leave", 0);
            return 0;
        }
        let id = match node_id {
            Some(i) if inner.prefix.contains(i) => i,
            Some(_) => {
                inner.metrics.record("leave", 0);
                return 0;
            }
            None => {
                let mut ids: Vec<u128> = inner.prefix.ids().collect();
                ids.sort_unstable();
                random_id(&mut inner.rng, &ids)
            }
        };

        let before = prefix_snapshot(&inner.prefix);
        let departing_data = inner.prefix.remove_bare(id);

        let mut migration_hops = 0;
        if !inner.prefix.is_empty() {
            if let Some(data) = departing_data {
                for (key, value) in data {
                    let any = inner.prefix.ids().next().expect("prefix is non-empty");
                    inner.prefix.store(any, &key, value);
                }
            }
            inner.prefix.rebuild_structures();
            migration_hops = rebalance_prefix(&mut inner.prefix, &mut inner.rng);
        }

        let after = prefix_snapshot(&inner.prefix);
        let update_cost = count_changed(&before, &after);
        let total = update_cost + migration_hops;
        inner.metrics.record("leave", total);
        total
    }

    fn metrics_summary(&self) -> HashMap<String, Summary> {
        self.inner.lock().expect("prefix network mutex poisoned").metrics.summary()
    }

    fn node_count(&self) -> usize {
        self.inner.lock().expect("prefix network mutex poisoned").prefix.len()
    }
}
