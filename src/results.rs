//! The experiment-result document shape: written by an external driver,
//! consumed by external reporters. The core only defines the schema;
//! reading/writing the JSON file is the driver's job.
//!
//! Grounded in `original_source/experiments/run_experiments.py`'s output
//! dict and `original_source/tools/kquery_report.py`'s consumption of
//! `pastry.k_query` / `chord.k_query`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::metrics::Summary;

/// Result of the parallel K-title lookup phase for one overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KQueryResult {
    pub k: u32,
    pub found_count: u32,
    pub total_hops: u64,
    pub mean_hops: f64,
}

/// One overlay's contribution to the experiment-result document: its
/// per-operation metrics summary plus its K-query result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayResult {
    pub metrics: HashMap<String, Summary>,
    pub k_query: Option<KQueryResult>,
}

/// Echo of the run parameters the driver used (`--N`, `--seed`, per-phase
/// workload sizes, `--join_leave`, `--K`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentParams {
    pub n: u32,
    pub inserts: u32,
    pub lookups: u32,
    pub updates: u32,
    pub deletes: u32,
    pub join_leave: u32,
    pub k: u32,
    pub seed: u64,
}

/// The full experiment-result document: one entry per overlay plus the
/// param echo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub pastry: OverlayResult,
    pub chord: OverlayResult,
    pub params: ExperimentParams,
}
