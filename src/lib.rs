//! A DHT simulator comparing two overlay routing strategies over a shared
//! 128-bit identifier space: a Pastry-style prefix-routed overlay
//! ([`prefix`]) and a Chord-style ring-with-fingers overlay ([`ring`]).
//! Both are wrapped in a uniform comparative contract ([`network`]) that
//! records per-operation hop counts ([`metrics`]) so the two strategies
//! can be benchmarked side by side.
//!
//! This crate is a CPU-bound, in-memory simulation: there is no real
//! network transport, no cryptographic node authenticity, and no
//! persistence beyond the process — see each module's docs for its exact
//! scope.

pub mod dataset;
pub mod error;
pub mod idspace;
pub mod metrics;
pub mod network;
pub mod prefix;
pub mod results;
pub mod ring;

pub use error::DhtError;
pub use network::{Network, PrefixNetwork, RingNetwork};
