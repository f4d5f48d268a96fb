//! Baseline vs. test comparison of two collected runs.

use super::statistics::{ModuleStats, RunStatistics};
use crate::output::schema::round_to;
use serde::Serialize;
use std::collections::BTreeMap;

/// One figure from each run and how it moved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanDelta {
    pub baseline: f64,
    pub test: f64,
    pub difference: f64,
    /// Relative to the baseline; `None` when the baseline is 0
    pub percent_change: Option<f64>,
}

impl MeanDelta {
    fn new(baseline: f64, test: f64, places: i32) -> Self {
        Self {
            baseline,
            test,
            difference: round_to(test - baseline, places),
            percent_change: percent_change(baseline, test),
        }
    }
}

/// Mean time of one module in both runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDelta {
    pub module: String,
    #[serde(flatten)]
    pub mean_ms: MeanDelta,
}

/// What `analyze --compare` reports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunComparison {
    pub baseline_blocks: usize,
    pub test_blocks: usize,
    /// Mean block time in seconds; both runs need timed blocks
    pub block_time: Option<MeanDelta>,
    /// Mean total consensus time in ms; both runs need consensus timing
    pub consensus_total: Option<MeanDelta>,
    /// Largest absolute change first
    pub begin_block_modules: Vec<ModuleDelta>,
    /// Largest absolute change first
    pub end_block_modules: Vec<ModuleDelta>,
}

/// Compare a test run against a baseline
///
/// A module seen in only one run counts as 0 ms in the other.
pub fn compare_runs(baseline: &RunStatistics, test: &RunStatistics) -> RunComparison {
    let block_time = match (&baseline.block_time, &test.block_time) {
        (Some(b), Some(t)) => Some(MeanDelta::new(b.mean, t.mean, 3)),
        _ => None,
    };
    let consensus_total = match (&baseline.consensus, &test.consensus) {
        (Some(b), Some(t)) => Some(MeanDelta::new(b.mean_total_ms, t.mean_total_ms, 1)),
        _ => None,
    };

    RunComparison {
        baseline_blocks: baseline.total_blocks,
        test_blocks: test.total_blocks,
        block_time,
        consensus_total,
        begin_block_modules: module_deltas(&baseline.begin_block_modules, &test.begin_block_modules),
        end_block_modules: module_deltas(&baseline.end_block_modules, &test.end_block_modules),
    }
}

fn module_deltas(baseline: &[ModuleStats], test: &[ModuleStats]) -> Vec<ModuleDelta> {
    let mut means: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for stats in baseline {
        means.entry(stats.module.as_str()).or_default().0 = stats.time_ms.mean;
    }
    for stats in test {
        means.entry(stats.module.as_str()).or_default().1 = stats.time_ms.mean;
    }

    let mut deltas: Vec<ModuleDelta> = means
        .into_iter()
        .map(|(module, (b, t))| ModuleDelta {
            module: module.to_string(),
            mean_ms: MeanDelta::new(b, t, 1),
        })
        .collect();
    // Stable sort keeps equal changes in module-name order
    deltas.sort_by(|a, b| b.mean_ms.difference.abs().total_cmp(&a.mean_ms.difference.abs()));
    deltas
}

fn percent_change(baseline: f64, test: f64) -> Option<f64> {
    (baseline > 0.0).then(|| round_to((test - baseline) / baseline * 100.0, 1))
}
