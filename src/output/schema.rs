//! Output JSON schema for per-block timing records.
//!
//! One [`BlockTimingRecord`] is written per committed height, as one line of
//! a JSON-Lines file. Records are never modified after emission.

use crate::aggregator::block_inspector::TxAnalysis;
use crate::parser::abci_log::AbciTiming;
use crate::tracker::counters::ModuleDeltaSet;
use crate::tracker::phase::PhaseRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final merged record for one height
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTimingRecord {
    pub height: u64,

    /// Block header time, as reported by the node
    pub timestamp: String,

    /// Proposer address from the block header
    pub proposer: String,

    /// Seconds since the previous block's header time (0 if unknown)
    pub total_block_time_seconds: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionSection>,

    pub transactions: TxAnalysis,

    /// Absent when the consensus poller had not finalized this height in time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abci: Option<AbciSection>,

    pub analysis: BlockAnalysis,
}

/// Module execution time attributed to this block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSection {
    pub begin_block_modules: ModuleTimes,
    pub end_block_modules: ModuleTimes,
    pub total_execution_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_of_block_time: Option<f64>,
}

/// Per-module milliseconds plus their sum, flattened into one JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleTimes {
    #[serde(flatten)]
    pub modules: BTreeMap<String, f64>,
    pub total: f64,
}

/// Consensus phase timing merged from the correlation buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSection {
    #[serde(flatten)]
    pub phases: PhaseRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_of_block_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbciSection {
    pub finalize_block_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_txs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockAnalysis {
    pub has_tips: bool,
    pub tip_count: usize,
}

/// Round to `places` decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `part_ms` as a percentage of the block time, when there is one
fn percent_of_block(part_ms: f64, block_time_seconds: f64) -> Option<f64> {
    (block_time_seconds > 0.0).then(|| round_to(part_ms / (block_time_seconds * 1000.0) * 100.0, 1))
}

impl ExecutionSection {
    pub fn from_deltas(deltas: &ModuleDeltaSet, block_time_seconds: f64) -> Self {
        let begin_total = deltas.begin_total();
        let end_total = deltas.end_total();
        let total = begin_total + end_total;

        Self {
            begin_block_modules: ModuleTimes {
                modules: deltas.begin.clone(),
                total: round_to(begin_total, 1),
            },
            end_block_modules: ModuleTimes {
                modules: deltas.end.clone(),
                total: round_to(end_total, 1),
            },
            total_execution_ms: round_to(total, 1),
            percent_of_block_time: percent_of_block(total, block_time_seconds),
        }
    }

    /// Module with the largest end-block time
    pub fn slowest_end_module(&self) -> Option<(&str, f64)> {
        self.end_block_modules
            .modules
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, ms)| (name.as_str(), *ms))
    }
}

impl ConsensusSection {
    pub fn from_phases(phases: PhaseRecord, block_time_seconds: f64) -> Self {
        let percent_of_block_time = percent_of_block(phases.total_consensus_ms, block_time_seconds);
        Self {
            phases,
            percent_of_block_time,
        }
    }
}

impl From<AbciTiming> for AbciSection {
    fn from(timing: AbciTiming) -> Self {
        Self {
            finalize_block_ms: timing.finalize_block_ms.unwrap_or(0),
            num_txs: timing.num_txs,
        }
    }
}

/// Everything gathered for one height before assembly
#[derive(Debug, Clone, Default)]
pub struct BlockInputs {
    pub height: u64,
    pub timestamp: String,
    pub proposer: String,
    pub block_time_seconds: f64,
    pub transactions: TxAnalysis,
    pub deltas: Option<ModuleDeltaSet>,
    pub consensus: Option<PhaseRecord>,
    pub abci: Option<AbciTiming>,
}

impl BlockTimingRecord {
    /// Merge the per-source contributions for one height
    pub fn assemble(inputs: BlockInputs) -> Self {
        let block_time = round_to(inputs.block_time_seconds, 3);
        let tip_count = inputs.transactions.tips.len();

        Self {
            height: inputs.height,
            timestamp: inputs.timestamp,
            proposer: inputs.proposer,
            total_block_time_seconds: block_time,
            execution: inputs
                .deltas
                .as_ref()
                .map(|d| ExecutionSection::from_deltas(d, block_time)),
            transactions: inputs.transactions,
            consensus: inputs
                .consensus
                .map(|p| ConsensusSection::from_phases(p, block_time)),
            abci: inputs.abci.map(AbciSection::from),
            analysis: BlockAnalysis {
                has_tips: tip_count > 0,
                tip_count,
            },
        }
    }
}
