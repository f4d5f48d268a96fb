//! Decoders for raw node data.
//!
//! This module handles:
//! - Consensus `height/round/step` strings
//! - Prometheus counter text
//! - Block header timestamps
//! - ABCI timing lines from the node log

pub mod abci_log;
pub mod consensus;
pub mod metrics;
pub mod timestamp;

// Re-export main types
pub use abci_log::{parse_abci_line, AbciLogTailer, AbciTiming};
pub use consensus::{parse_round_step, Phase, RoundStep};
pub use metrics::{CounterScraper, CounterSnapshot};
pub use timestamp::{parse_block_time, seconds_between};
