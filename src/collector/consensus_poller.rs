//! Fast loop: consensus-state sampling into the correlation buffer.

use super::buffer::{CorrelationBuffer, InsertOutcome};
use super::source::NodeSource;
use super::sleep_until_next_tick;
use crate::tracker::phase::PhaseTracker;
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Owns the [`PhaseTracker`]; the only writer into the buffer
#[derive(Debug, Default)]
pub struct ConsensusPoller {
    tracker: PhaseTracker,
    finalized: usize,
}

impl ConsensusPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heights finalized so far
    pub fn finalized(&self) -> usize {
        self.finalized
    }

    /// Take one snapshot at `now` and hand any finalized record to the buffer
    ///
    /// Fetch failures and malformed snapshots are skipped silently apart from
    /// debug logging; the next tick simply tries again.
    pub fn poll_once<S: NodeSource + ?Sized>(
        &mut self,
        source: &S,
        buffer: &CorrelationBuffer,
        now: Instant,
    ) -> Option<InsertOutcome> {
        let state = match source.consensus_state() {
            Ok(state) => state,
            Err(e) => {
                debug!("Consensus state fetch failed: {}", e);
                return None;
            }
        };

        let Some(raw) = state.round_step() else {
            trace!("Consensus state without height/round/step");
            return None;
        };

        let record = self.tracker.observe(raw, now)?;
        self.finalized += 1;
        Some(buffer.insert(record))
    }

    /// Poll every `interval` until `stop` is set
    pub fn run<S: NodeSource + ?Sized>(
        &mut self,
        source: &S,
        buffer: &CorrelationBuffer,
        interval: Duration,
        stop: &AtomicBool,
    ) {
        debug!("Consensus poller started ({}ms interval)", interval.as_millis());

        while !stop.load(Ordering::Relaxed) {
            let tick = Instant::now();
            self.poll_once(source, buffer, tick);
            sleep_until_next_tick(tick, interval, stop);
        }

        debug!("Consensus poller stopped after {} heights", self.finalized);
    }
}
