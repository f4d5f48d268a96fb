//! Slow loop: height advancement, per-block collection and record assembly.
//!
//! Every height between the last processed one and the node's latest height
//! is collected individually, in order. For each height the poller fetches
//! the block and its results, derives the block time from header
//! timestamps, scrapes the module counters, claims whatever consensus timing
//! the fast loop has finalized, and emits one merged record.

use super::buffer::CorrelationBuffer;
use super::source::{NodeSource, RecordSink};
use crate::aggregator::block_inspector::inspect_block;
use crate::output::schema::{BlockInputs, BlockTimingRecord};
use crate::parser::abci_log::{AbciLogTailer, AbciTiming};
use crate::parser::metrics::CounterScraper;
use crate::parser::timestamp::{parse_block_time, seconds_between};
use crate::rpc::types::{value_as_u64, ChainStatus};
use crate::tracker::counters::{CounterDeltaCalculator, ModuleDeltaSet};
use crate::utils::error::CollectorError;
use chrono::{DateTime, FixedOffset};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Owns the height baseline and the [`CounterDeltaCalculator`]
pub struct BlockPoller {
    last_height: Option<u64>,
    last_block_time: Option<DateTime<FixedOffset>>,
    counters: CounterDeltaCalculator,
    scraper: CounterScraper,
    abci_log: Option<AbciLogTailer>,
    pending_abci: BTreeMap<u64, AbciTiming>,
    /// Height whose block fetch keeps failing, and how many times it has
    failing: Option<(u64, u32)>,
    max_block_attempts: u32,
    emitted: usize,
    warned_empty_metrics: bool,
}

impl BlockPoller {
    pub fn new(scraper: CounterScraper, max_block_attempts: u32) -> Self {
        Self {
            last_height: None,
            last_block_time: None,
            counters: CounterDeltaCalculator::new(),
            scraper,
            abci_log: None,
            pending_abci: BTreeMap::new(),
            failing: None,
            max_block_attempts: max_block_attempts.max(1),
            emitted: 0,
            warned_empty_metrics: false,
        }
    }

    /// Also merge ABCI timing lines tailed from the node log
    pub fn with_abci_log(mut self, tailer: AbciLogTailer) -> Self {
        self.abci_log = Some(tailer);
        self
    }

    /// Last height processed (or the baseline)
    pub fn last_height(&self) -> Option<u64> {
        self.last_height
    }

    /// Records emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Fetch the node status and process whatever heights it reveals
    ///
    /// A failed status fetch is logged and skipped. Returns the number of
    /// records emitted on this tick.
    pub fn poll_once<S, K>(
        &mut self,
        source: &S,
        buffer: &CorrelationBuffer,
        sink: &mut K,
        stop: &AtomicBool,
    ) -> Result<usize, CollectorError>
    where
        S: NodeSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        match source.status() {
            Ok(status) => self.observe_status(source, buffer, sink, &status, stop),
            Err(e) => {
                warn!("Status fetch failed: {}", e);
                Ok(0)
            }
        }
    }

    /// Process a status snapshot
    ///
    /// The first snapshot only sets the baseline. Later snapshots at a higher
    /// height collect every height after the baseline, up to and including
    /// the new one. `stop` is honored between heights, never within one.
    pub fn observe_status<S, K>(
        &mut self,
        source: &S,
        buffer: &CorrelationBuffer,
        sink: &mut K,
        status: &ChainStatus,
        stop: &AtomicBool,
    ) -> Result<usize, CollectorError>
    where
        S: NodeSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        let Some(last) = self.last_height else {
            info!("Starting from block {}", status.height);
            self.last_height = Some(status.height);
            self.seed_counters(source);
            return Ok(0);
        };

        if status.height < last {
            warn!(
                "Node reports height {} below last processed height {}, waiting",
                status.height, last
            );
            return Ok(0);
        }

        let mut emitted = 0;
        for height in (last + 1)..=status.height {
            if stop.load(Ordering::Relaxed) {
                break;
            }

            match self.collect_height(source, buffer, height) {
                Some(record) => {
                    sink.emit(&record)?;
                    self.emitted += 1;
                    emitted += 1;
                    self.failing = None;
                    self.last_height = Some(height);
                }
                None => {
                    if !self.record_block_failure(buffer, height) {
                        break;
                    }
                }
            }
        }

        Ok(emitted)
    }

    /// Count a failed block fetch; returns true if the height was given up on
    fn record_block_failure(&mut self, buffer: &CorrelationBuffer, height: u64) -> bool {
        let attempts = match self.failing {
            Some((h, n)) if h == height => n + 1,
            _ => 1,
        };

        if attempts < self.max_block_attempts {
            debug!(
                "Block {} unavailable (attempt {}/{}), retrying next tick",
                height, attempts, self.max_block_attempts
            );
            self.failing = Some((height, attempts));
            return false;
        }

        warn!("Skipping block {} after {} failed fetches", height, attempts);
        buffer.claim(height);
        self.failing = None;
        self.last_height = Some(height);
        self.last_block_time = None;
        true
    }

    /// Gather every source for one height; `None` only if the block itself
    /// could not be fetched
    fn collect_height<S: NodeSource + ?Sized>(
        &mut self,
        source: &S,
        buffer: &CorrelationBuffer,
        height: u64,
    ) -> Option<BlockTimingRecord> {
        debug!("Collecting data for block {}", height);

        let block = match source.block(height) {
            Ok(block) => block,
            Err(e) => {
                warn!("Block {} fetch failed: {}", height, e);
                return None;
            }
        };

        let results = match source.block_results(height) {
            Ok(results) => Some(results),
            Err(e) => {
                warn!("Block results {} fetch failed: {}", height, e);
                None
            }
        };

        let header = &block.block.header;
        let block_time_seconds = self.block_time(source, height, &header.time);
        let transactions = inspect_block(&block, results.as_ref());
        let deltas = self.scrape_deltas(source);
        let consensus = buffer.claim(height);
        if consensus.is_none() {
            debug!("No consensus timing for block {} yet", height);
        }
        let abci = self.take_abci(height);

        Some(BlockTimingRecord::assemble(BlockInputs {
            height: value_as_u64(&header.height).unwrap_or(height),
            timestamp: header.time.clone(),
            proposer: header.proposer_address.clone(),
            block_time_seconds,
            transactions,
            deltas,
            consensus,
            abci,
        }))
    }

    /// Seconds since the previous block's header time
    ///
    /// When the previous time is unknown, block `height - 1` is fetched to
    /// seed it. Any failure yields 0.
    fn block_time<S: NodeSource + ?Sized>(&mut self, source: &S, height: u64, raw_time: &str) -> f64 {
        let current = match parse_block_time(raw_time) {
            Ok(t) => t,
            Err(e) => {
                warn!("Block {}: {}", height, e);
                self.last_block_time = None;
                return 0.0;
            }
        };

        let previous = self
            .last_block_time
            .take()
            .or_else(|| self.previous_block_time(source, height));
        self.last_block_time = Some(current);

        let Some(previous) = previous else {
            return 0.0;
        };

        let seconds = seconds_between(&previous, &current);
        if seconds < 0.0 {
            warn!("Block {} time precedes its parent by {:.3}s", height, -seconds);
            return 0.0;
        }
        seconds
    }

    fn previous_block_time<S: NodeSource + ?Sized>(
        &self,
        source: &S,
        height: u64,
    ) -> Option<DateTime<FixedOffset>> {
        let parent = height.checked_sub(1).filter(|h| *h > 0)?;
        match source.block(parent) {
            Ok(block) => parse_block_time(&block.block.header.time)
                .map_err(|e| warn!("Block {}: {}", parent, e))
                .ok(),
            Err(e) => {
                warn!("Could not fetch parent block {} for block time: {}", parent, e);
                None
            }
        }
    }

    fn seed_counters<S: NodeSource + ?Sized>(&mut self, source: &S) {
        // The first scrape never yields a delta, it only sets the baseline
        let _ = self.scrape_deltas(source);
        if self.counters.has_baseline() {
            debug!("Counter baseline seeded");
        }
    }

    /// Scrape the counters and difference them against the last scrape
    fn scrape_deltas<S: NodeSource + ?Sized>(&mut self, source: &S) -> Option<ModuleDeltaSet> {
        let text = match source.metrics_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Metrics fetch failed: {}", e);
                return None;
            }
        };

        let snapshot = self.scraper.scrape(&text);
        if snapshot.is_empty() {
            if self.warned_empty_metrics {
                debug!("Metrics exposition carried no module counters");
            } else {
                warn!("Metrics exposition carried no module counters, execution section will be empty");
                self.warned_empty_metrics = true;
            }
            return None;
        }

        self.counters.compute(snapshot)
    }

    fn take_abci(&mut self, height: u64) -> Option<AbciTiming> {
        let tailer = self.abci_log.as_mut()?;
        for timing in tailer.read_new() {
            self.pending_abci.insert(timing.height, timing);
        }

        // Entries below this height belong to blocks already emitted
        self.pending_abci = self.pending_abci.split_off(&height);
        self.pending_abci.remove(&height)
    }
}
