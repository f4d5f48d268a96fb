//! Scripted in-memory node for collector tests.

use super::source::NodeSource;
use crate::rpc::types::{BlockResult, BlockResultsResult, ChainStatus, ConsensusStateResult};
use crate::utils::error::RpcError;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// How long a gated block fetch waits for the consensus script to drain
const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves queued statuses, consensus snapshots and metrics in order, and
/// blocks by height. Anything not scripted fails like an unreachable node.
#[derive(Default)]
pub struct ScriptedNode {
    statuses: Mutex<VecDeque<u64>>,
    round_steps: Mutex<VecDeque<String>>,
    metrics: Mutex<VecDeque<String>>,
    blocks: HashMap<u64, String>,
    results: HashMap<u64, serde_json::Value>,
    gate_blocks: bool,
    /// Set once a consensus fetch finds the script empty
    round_steps_drained: AtomicBool,
}

impl ScriptedNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, heights: &[u64]) -> Self {
        self.statuses.lock().extend(heights.iter().copied());
        self
    }

    pub fn with_round_steps(self, steps: &[&str]) -> Self {
        self.round_steps
            .lock()
            .extend(steps.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_metrics(self, bodies: &[&str]) -> Self {
        self.metrics.lock().extend(bodies.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_block(mut self, height: u64, time: &str) -> Self {
        self.blocks.insert(height, time.to_string());
        self
    }

    pub fn with_results(mut self, height: u64, results: serde_json::Value) -> Self {
        self.results.insert(height, results);
        self
    }

    /// Hold block fetches until the consensus poller has consumed every
    /// scripted snapshot and come back for more
    ///
    /// The poller handles one snapshot fully before it fetches the next, so
    /// by then every finalized height is already in the buffer.
    pub fn with_block_gate(mut self) -> Self {
        self.gate_blocks = true;
        self
    }

    fn wait_for_gate(&self) {
        let started = Instant::now();
        while !self.round_steps_drained.load(Ordering::Acquire) && started.elapsed() < GATE_TIMEOUT {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn unreachable(what: &str) -> RpcError {
    RpcError::InvalidResponse(format!("{} not scripted", what))
}

impl NodeSource for ScriptedNode {
    fn status(&self) -> Result<ChainStatus, RpcError> {
        let height = self.statuses.lock().pop_front().ok_or_else(|| unreachable("status"))?;
        Ok(ChainStatus {
            height,
            time: String::new(),
        })
    }

    fn consensus_state(&self) -> Result<ConsensusStateResult, RpcError> {
        let Some(step) = self.round_steps.lock().pop_front() else {
            self.round_steps_drained.store(true, Ordering::Release);
            return Err(unreachable("consensus_state"));
        };
        serde_json::from_value(json!({"round_state": {"height/round/step": step}}))
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    fn block(&self, height: u64) -> Result<BlockResult, RpcError> {
        if self.gate_blocks {
            self.wait_for_gate();
        }
        let time = self.blocks.get(&height).ok_or_else(|| unreachable("block"))?;
        serde_json::from_value(json!({
            "block": {
                "header": {
                    "height": height.to_string(),
                    "time": time,
                    "proposer_address": "PROPOSER"
                },
                "data": {"txs": []}
            }
        }))
        .map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    fn block_results(&self, height: u64) -> Result<BlockResultsResult, RpcError> {
        let results = self
            .results
            .get(&height)
            .ok_or_else(|| unreachable("block_results"))?;
        serde_json::from_value(results.clone()).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    fn metrics_text(&self) -> Result<String, RpcError> {
        self.metrics.lock().pop_front().ok_or_else(|| unreachable("metrics"))
    }
}
