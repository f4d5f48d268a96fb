//! Collection run: two concurrent polling loops joined by height.
//!
//! - The fast loop ([`ConsensusPoller`]) samples consensus state every
//!   ~50 ms and drops finalized phase timing into the [`CorrelationBuffer`].
//! - The slow loop ([`BlockPoller`]) watches the committed height every
//!   ~500 ms, collects each new block and claims the matching phase timing.
//!
//! Neither loop waits for the other. A height the fast loop has not
//! finalized by the time its block is collected is emitted without a
//! consensus section.

pub mod block_poller;
pub mod buffer;
pub mod consensus_poller;
pub mod source;

#[cfg(test)]
mod testing;

pub use block_poller::BlockPoller;
pub use buffer::{CorrelationBuffer, InsertOutcome};
pub use consensus_poller::ConsensusPoller;
pub use source::{NodeSource, RecordSink};

use crate::parser::abci_log::AbciLogTailer;
use crate::parser::metrics::CounterScraper;
use crate::rpc::types::ChainStatus;
use crate::utils::config::{expand_home, CollectorConfig};
use crate::utils::error::CollectorError;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep, so a stop request is noticed promptly
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Everything a run needs besides the node and the sink
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub consensus_interval: Duration,
    pub status_interval: Duration,
    pub startup_attempts: u32,
    pub max_block_attempts: u32,
    pub buffer_capacity: usize,
    pub begin_prefix: String,
    pub end_prefix: String,
    pub log_file: Option<PathBuf>,
    /// Stop after this long; `None` runs until interrupted
    pub duration: Option<Duration>,
}

impl CollectorSettings {
    pub fn from_config(config: &CollectorConfig, duration: Option<Duration>) -> Self {
        let m = &config.monitoring;
        Self {
            consensus_interval: m.consensus_interval(),
            status_interval: m.status_interval(),
            startup_attempts: m.startup_attempts,
            max_block_attempts: m.max_block_attempts,
            buffer_capacity: m.buffer_capacity,
            begin_prefix: config.metrics.begin_prefix.clone(),
            end_prefix: config.metrics.end_prefix.clone(),
            log_file: m.log_file_path.as_deref().map(expand_home),
            duration,
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from_config(&CollectorConfig::default(), None)
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub records_emitted: usize,
    pub heights_finalized: usize,
    pub last_height: Option<u64>,
}

/// Run both loops until `stop` is set or the duration bound elapses
///
/// # Errors
/// * `CollectorError::StatusUnreachable` - no status response during startup
/// * `CollectorError::Sink` - a record could not be written
pub fn run_collection<S, K>(
    source: &S,
    settings: &CollectorSettings,
    sink: &mut K,
    stop: &AtomicBool,
) -> Result<CollectionSummary, CollectorError>
where
    S: NodeSource,
    K: RecordSink + ?Sized,
{
    let scraper = CounterScraper::new(&settings.begin_prefix, &settings.end_prefix)?;
    let initial = wait_for_status(source, settings.startup_attempts, settings.status_interval)?;

    let started = Instant::now();
    let deadline = settings.duration.map(|d| started + d);
    let buffer = CorrelationBuffer::new(settings.buffer_capacity);

    let mut block_poller = BlockPoller::new(scraper, settings.max_block_attempts);
    if let Some(path) = &settings.log_file {
        info!("Tailing ABCI timing from {}", path.display());
        block_poller = block_poller.with_abci_log(AbciLogTailer::new(path));
    }

    let buffer = &buffer;
    let (result, heights_finalized) = thread::scope(|scope| {
        let fast = scope.spawn(move || {
            let mut poller = ConsensusPoller::new();
            poller.run(source, buffer, settings.consensus_interval, stop);
            poller.finalized()
        });

        let result = run_block_loop(
            &mut block_poller,
            source,
            buffer,
            sink,
            &initial,
            settings.status_interval,
            deadline,
            stop,
        );

        stop.store(true, Ordering::Relaxed);
        let finalized = fast.join().unwrap_or_else(|_| {
            error!("Consensus poller panicked");
            0
        });

        (result, finalized)
    });

    result?;

    let summary = CollectionSummary {
        records_emitted: block_poller.emitted(),
        heights_finalized,
        last_height: block_poller.last_height(),
    };
    info!(
        "Collection finished after {:.1}s: {} records, {} heights with consensus timing",
        started.elapsed().as_secs_f64(),
        summary.records_emitted,
        summary.heights_finalized
    );
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn run_block_loop<S, K>(
    poller: &mut BlockPoller,
    source: &S,
    buffer: &CorrelationBuffer,
    sink: &mut K,
    initial: &ChainStatus,
    interval: Duration,
    deadline: Option<Instant>,
    stop: &AtomicBool,
) -> Result<(), CollectorError>
where
    S: NodeSource,
    K: RecordSink + ?Sized,
{
    poller.observe_status(source, buffer, sink, initial, stop)?;

    while !stop.load(Ordering::Relaxed) {
        let tick = Instant::now();
        if deadline.is_some_and(|d| tick >= d) {
            info!("Duration limit reached");
            break;
        }

        poller.poll_once(source, buffer, sink, stop)?;
        sleep_until_next_tick(tick, interval, stop);
    }

    Ok(())
}

/// Poll the status source until it answers, up to `attempts` times
pub fn wait_for_status<S: NodeSource + ?Sized>(
    source: &S,
    attempts: u32,
    interval: Duration,
) -> Result<ChainStatus, CollectorError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match source.status() {
            Ok(status) => return Ok(status),
            Err(e) if attempt >= attempts => {
                return Err(CollectorError::StatusUnreachable {
                    attempts: attempt,
                    source: e,
                })
            }
            Err(e) => {
                warn!("Status source not reachable (attempt {}/{}): {}", attempt, attempts, e);
                attempt += 1;
                thread::sleep(interval);
            }
        }
    }
}

/// Sleep out the rest of the interval that began at `tick`
fn sleep_until_next_tick(tick: Instant, interval: Duration, stop: &AtomicBool) {
    let next = tick + interval;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= next {
            return;
        }
        thread::sleep((next - now).min(MAX_SLEEP_SLICE));
    }
}
