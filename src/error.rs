//! Contract-level error taxonomy.
//!
//! Only errors that must propagate to the caller are modeled here; routing
//! dead-ends and update-on-absent are absorbed internally and are observable
//! only through hop counts and `tracing` events.

use thiserror::Error;

/// Errors surfaced by the `Network` contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DhtError {
    /// insert/lookup/update/delete was called on a network with no nodes.
    #[error("operation attempted on an empty network")]
    EmptyNetwork,
}
