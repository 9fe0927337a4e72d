//! Per-operation hop histograms, recorded in insertion order and summarised
//! on demand.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Summary statistics for one operation's recorded hop counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: u32,
    pub p95: u32,
}

/// Insertion-ordered per-operation hop histograms.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    order: Vec<String>,
    hops: HashMap<String, Vec<u32>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hop count observation for operation `op`.
    pub fn record(&mut self, op: &str, hops: u32) {
        let bucket = self.hops.entry(op.to_string()).or_insert_with(|| {
            self.order.push(op.to_string());
            Vec::new()
        });
        bucket.push(hops);
    }

    /// Summaries for every op with at least one observation, in the order
    /// each op was first recorded. Ops with zero observations are omitted.
    pub fn summary(&self) -> HashMap<String, Summary> {
        let mut out = HashMap::with_capacity(self.order.len());
        for op in &self.order {
            let Some(values) = self.hops.get(op) else { continue };
            if values.is_empty() {
                continue;
            }
            let mut sorted = values.clone();
            sorted.sort_unstable();
            let n = sorted.len();
            let mean = sorted.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
            let median = sorted[n / 2];
            let p95_idx = ((0.95 * (n - 1) as f64).floor()) as usize;
            let p95 = sorted[p95_idx];
            out.insert(
                op.clone(),
                Summary {
                    count: n,
                    mean,
                    median,
                    p95,
                },
            );
        }
        out
    }
}
