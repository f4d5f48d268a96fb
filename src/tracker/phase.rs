//! Consensus phase state machine.
//!
//! Fed one consensus-state snapshot at a time, the tracker measures how long
//! each height spends in propose, prevote, precommit and commit. A height's
//! record is only known once the *next* height is first observed, so every
//! [`PhaseRecord`] is emitted one height late.

use crate::parser::consensus::{parse_round_step, Phase, RoundStep};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Finalized consensus timing for one height
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub height: u64,
    /// Last round observed for this height
    pub rounds: u32,
    #[serde(rename = "propose_duration_ms")]
    pub propose_ms: f64,
    #[serde(rename = "prevote_duration_ms")]
    pub prevote_ms: f64,
    #[serde(rename = "precommit_duration_ms")]
    pub precommit_ms: f64,
    #[serde(rename = "commit_duration_ms")]
    pub commit_ms: f64,
    pub total_consensus_ms: f64,
}

/// Tracks phase transitions for the height currently in progress
#[derive(Debug, Default)]
pub struct PhaseTracker {
    current_height: Option<u64>,
    current_round: u32,
    last_phase: Option<Phase>,
    phase_start_times: HashMap<Phase, Instant>,
    phase_durations: HashMap<Phase, f64>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_height(&self) -> Option<u64> {
        self.current_height
    }

    /// Feed a raw `"H/R/S"` snapshot taken at `now`
    ///
    /// Unparsable input is ignored. Returns the finalized record for the
    /// previous height when `now`'s snapshot is the first one at a new height.
    pub fn observe(&mut self, raw: &str, now: Instant) -> Option<PhaseRecord> {
        match parse_round_step(raw) {
            Ok(step) => self.observe_step(step, now),
            Err(e) => {
                debug!("Ignoring consensus snapshot: {}", e);
                None
            }
        }
    }

    /// Feed an already decoded snapshot taken at `now`
    pub fn observe_step(&mut self, step: RoundStep, now: Instant) -> Option<PhaseRecord> {
        let RoundStep {
            height,
            round,
            phase,
        } = step;

        match self.current_height {
            None => {
                self.start_height(height, round, phase, now);
                None
            }
            Some(current) if current != height => {
                let record = self.finalize(now);
                self.start_height(height, round, phase, now);
                Some(record)
            }
            Some(_) => {
                if self.last_phase != Some(phase) {
                    self.close_last_phase(now);
                    trace!("Height {} entered {}", height, phase);
                    self.phase_start_times.insert(phase, now);
                    self.last_phase = Some(phase);
                }
                self.current_round = round;
                None
            }
        }
    }

    fn start_height(&mut self, height: u64, round: u32, phase: Phase, now: Instant) {
        self.current_height = Some(height);
        self.current_round = round;
        self.last_phase = Some(phase);
        self.phase_start_times.clear();
        self.phase_start_times.insert(phase, now);
        self.phase_durations.clear();
    }

    /// Add the elapsed time of the open phase to its accumulated duration
    fn close_last_phase(&mut self, now: Instant) {
        let Some(last) = self.last_phase else {
            return;
        };
        if let Some(started) = self.phase_start_times.remove(&last) {
            let ms = now.saturating_duration_since(started).as_secs_f64() * 1000.0;
            *self.phase_durations.entry(last).or_insert(0.0) += ms;
        }
    }

    fn finalize(&mut self, now: Instant) -> PhaseRecord {
        self.close_last_phase(now);

        let get = |phase: Phase| self.phase_durations.get(&phase).copied().unwrap_or(0.0);
        let propose_ms = get(Phase::Propose);
        let prevote_ms = get(Phase::Prevote);
        let precommit_ms = get(Phase::Precommit);
        let commit_ms = get(Phase::Commit);

        let record = PhaseRecord {
            height: self.current_height.unwrap_or_default(),
            rounds: self.current_round,
            propose_ms,
            prevote_ms,
            precommit_ms,
            commit_ms,
            total_consensus_ms: propose_ms + prevote_ms + precommit_ms + commit_ms,
        };

        debug!(
            "Finalized consensus timing for height {}: {:.1}ms over {} round(s)",
            record.height,
            record.total_consensus_ms,
            record.rounds + 1
        );

        record
    }
}
