//! Stateful trackers owned by a single polling loop each.
//!
//! - [`PhaseTracker`] turns consensus snapshots into per-height phase timing
//! - [`CounterDeltaCalculator`] turns cumulative counters into per-tick deltas

pub mod counters;
pub mod phase;

pub use counters::{CounterDeltaCalculator, ModuleDeltaSet};
pub use phase::{PhaseRecord, PhaseTracker};
