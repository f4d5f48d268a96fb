//! Height-keyed handoff from the consensus poller to the block poller.

use crate::tracker::phase::PhaseRecord;
use log::warn;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Finalized [`PhaseRecord`]s waiting to be claimed by height.
///
/// Each insert and each claim is atomic with respect to the other loop. Once
/// a height has been claimed (found or not), later inserts at or below it are
/// dropped, so an emitted record is never revisited.
#[derive(Debug)]
pub struct CorrelationBuffer {
    inner: Mutex<BufferState>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct BufferState {
    pending: BTreeMap<u64, PhaseRecord>,
    highest_claimed: Option<u64>,
}

/// What happened to an inserted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored,
    /// The height was already claimed by the block poller
    AlreadyClaimed,
    /// A record for the height is already waiting; the existing one is kept
    Duplicate,
}

impl CorrelationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BufferState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, record: PhaseRecord) -> InsertOutcome {
        let height = record.height;
        let mut state = self.inner.lock();

        if state.highest_claimed.is_some_and(|claimed| height <= claimed) {
            warn!(
                "Consensus timing for height {} arrived after the block was emitted, dropping",
                height
            );
            return InsertOutcome::AlreadyClaimed;
        }

        if state.pending.contains_key(&height) {
            warn!("Duplicate consensus timing for height {}, keeping the first", height);
            return InsertOutcome::Duplicate;
        }

        state.pending.insert(height, record);

        while state.pending.len() > self.capacity {
            if let Some((evicted, _)) = state.pending.pop_first() {
                warn!("Correlation buffer full, evicting height {}", evicted);
            }
        }

        InsertOutcome::Stored
    }

    /// Remove and return the record for `height`, if the poller has one
    ///
    /// Records below `height` can no longer be claimed and are dropped.
    pub fn claim(&self, height: u64) -> Option<PhaseRecord> {
        let mut state = self.inner.lock();
        state.highest_claimed = Some(state.highest_claimed.map_or(height, |h| h.max(height)));
        let claimed = state.pending.remove(&height);
        state.pending = state.pending.split_off(&height.saturating_add(1));
        claimed
    }

    pub fn contains(&self, height: u64) -> bool {
        self.inner.lock().pending.contains_key(&height)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CorrelationBuffer {
    fn default() -> Self {
        Self::new(crate::utils::config::DEFAULT_BUFFER_CAPACITY)
    }
}
