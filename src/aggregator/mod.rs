//! Analysis of block contents and of collected runs.
//!
//! This module turns raw data into summaries:
//! - Per-block transaction, gas and event analysis
//! - Run-level block time, consensus and module statistics
//! - Baseline vs. test run comparison

pub mod block_inspector;
pub mod comparison;
pub mod statistics;

// Re-export main types and functions
pub use block_inspector::{inspect_block, resolve_gas, Tip, TxAnalysis};
pub use comparison::{compare_runs, RunComparison};
pub use statistics::{calculate_run_statistics, Distribution, RunStatistics};
