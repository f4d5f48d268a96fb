//! Summary statistics over a collected run.
//!
//! Slow blocks are the ones worth a closer look: block time well above the
//! run's mean, usually with a module or a consensus phase to blame.

use crate::output::schema::{round_to, BlockTimingRecord, ExecutionSection, ModuleTimes};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// Mean/median/min/max/std-dev of a sample
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; 0 for fewer than two values
    pub std_dev: f64,
}

impl Distribution {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };
        let std_dev = if count > 1 {
            let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        Some(Self {
            count,
            mean,
            median,
            min: sorted[0],
            max: sorted[count - 1],
            std_dev,
        })
    }

    /// Get human-readable summary
    pub fn summary(&self, unit: &str) -> String {
        format!(
            "mean {:.3}{u} | median {:.3}{u} | min {:.3}{u} | max {:.3}{u} | std-dev {:.3}{u} (n={})",
            self.mean,
            self.median,
            self.min,
            self.max,
            self.std_dev,
            self.count,
            u = unit
        )
    }

    /// Every figure rounded to `places` decimals
    pub fn rounded(&self, places: i32) -> Self {
        Self {
            count: self.count,
            mean: round_to(self.mean, places),
            median: round_to(self.median, places),
            min: round_to(self.min, places),
            max: round_to(self.max, places),
            std_dev: round_to(self.std_dev, places),
        }
    }
}

/// Mean phase durations over the heights that carried consensus timing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsensusStats {
    pub blocks: usize,
    pub mean_propose_ms: f64,
    pub mean_prevote_ms: f64,
    pub mean_precommit_ms: f64,
    pub mean_commit_ms: f64,
    pub mean_total_ms: f64,
    /// Heights that needed more than one round
    pub multi_round_count: usize,
}

/// Time spent by one module in one blocker phase across the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleStats {
    pub module: String,
    /// Milliseconds, rounded to 0.1
    #[serde(flatten)]
    pub time_ms: Distribution,
}

/// Block time with tips vs. without
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TipCorrelation {
    pub blocks_with_tips: usize,
    pub blocks_without_tips: usize,
    pub avg_block_time_with_tips: f64,
    pub avg_block_time_without_tips: f64,
    /// Set only when both groups have timed blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_increase: Option<f64>,
}

/// A block more than `k` standard deviations slower than the mean
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowBlock {
    pub height: u64,
    pub block_time: f64,
    pub std_devs_above_mean: f64,
    pub tip_count: usize,
    pub tx_count: u64,
    pub slowest_module: Option<String>,
}

/// Everything `analyze` reports, and the document `--output` exports
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    pub total_blocks: usize,
    pub start_height: Option<u64>,
    pub end_height: Option<u64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Seconds, rounded to 0.001
    pub block_time: Option<Distribution>,
    pub consensus: Option<ConsensusStats>,
    /// Sorted by mean, slowest first
    pub begin_block_modules: Vec<ModuleStats>,
    /// Sorted by mean, slowest first
    pub end_block_modules: Vec<ModuleStats>,
    pub tips: TipCorrelation,
    pub slow_blocks: Vec<SlowBlock>,
}

/// Compute run statistics; blocks with zero block time are left out of
/// timing figures
pub fn calculate_run_statistics(records: &[BlockTimingRecord], slow_threshold: f64) -> RunStatistics {
    debug!("Calculating statistics over {} records", records.len());

    let block_times: Vec<f64> = records
        .iter()
        .map(|r| r.total_block_time_seconds)
        .filter(|t| *t > 0.0)
        .collect();
    let block_time = Distribution::from_values(&block_times);

    RunStatistics {
        total_blocks: records.len(),
        start_height: records.first().map(|r| r.height),
        end_height: records.last().map(|r| r.height),
        start_time: records.first().map(|r| r.timestamp.clone()),
        end_time: records.last().map(|r| r.timestamp.clone()),
        slow_blocks: block_time
            .as_ref()
            .map(|dist| find_slow_blocks(records, dist, slow_threshold))
            .unwrap_or_default(),
        block_time: block_time.map(|dist| dist.rounded(3)),
        consensus: consensus_stats(records),
        begin_block_modules: module_stats(records, |e| &e.begin_block_modules),
        end_block_modules: module_stats(records, |e| &e.end_block_modules),
        tips: tip_correlation(records),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn consensus_stats(records: &[BlockTimingRecord]) -> Option<ConsensusStats> {
    let phases: Vec<_> = records
        .iter()
        .filter_map(|r| r.consensus.as_ref())
        .map(|c| &c.phases)
        .collect();
    if phases.is_empty() {
        return None;
    }

    Some(ConsensusStats {
        blocks: phases.len(),
        mean_propose_ms: round_to(mean(phases.iter().map(|p| p.propose_ms)), 1),
        mean_prevote_ms: round_to(mean(phases.iter().map(|p| p.prevote_ms)), 1),
        mean_precommit_ms: round_to(mean(phases.iter().map(|p| p.precommit_ms)), 1),
        mean_commit_ms: round_to(mean(phases.iter().map(|p| p.commit_ms)), 1),
        mean_total_ms: round_to(mean(phases.iter().map(|p| p.total_consensus_ms)), 1),
        multi_round_count: phases.iter().filter(|p| p.rounds > 0).count(),
    })
}

fn module_stats<F>(records: &[BlockTimingRecord], phase: F) -> Vec<ModuleStats>
where
    F: Fn(&ExecutionSection) -> &ModuleTimes,
{
    let mut samples: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for execution in records.iter().filter_map(|r| r.execution.as_ref()) {
        for (module, ms) in &phase(execution).modules {
            samples.entry(module.as_str()).or_default().push(*ms);
        }
    }

    let mut stats: Vec<ModuleStats> = samples
        .into_iter()
        .filter_map(|(module, values)| {
            Some(ModuleStats {
                module: module.to_string(),
                time_ms: Distribution::from_values(&values)?.rounded(1),
            })
        })
        .collect();
    stats.sort_by(|a, b| b.time_ms.mean.total_cmp(&a.time_ms.mean));
    stats
}

fn tip_correlation(records: &[BlockTimingRecord]) -> TipCorrelation {
    let (with, without): (Vec<&BlockTimingRecord>, Vec<&BlockTimingRecord>) =
        records.iter().partition(|r| r.analysis.has_tips);

    let timed = |group: &[&BlockTimingRecord]| -> Vec<f64> {
        group
            .iter()
            .map(|r| r.total_block_time_seconds)
            .filter(|t| *t > 0.0)
            .collect()
    };
    let with_times = timed(&with);
    let without_times = timed(&without);

    let avg_with = round_to(mean(with_times.iter().copied()), 3);
    let avg_without = round_to(mean(without_times.iter().copied()), 3);
    let both_timed = !with_times.is_empty() && !without_times.is_empty();
    let difference_seconds = both_timed.then(|| round_to(avg_with - avg_without, 3));
    let percent_increase = (both_timed && avg_without > 0.0)
        .then(|| round_to((avg_with - avg_without) / avg_without * 100.0, 1));

    TipCorrelation {
        blocks_with_tips: with.len(),
        blocks_without_tips: without.len(),
        avg_block_time_with_tips: avg_with,
        avg_block_time_without_tips: avg_without,
        difference_seconds,
        percent_increase,
    }
}

fn find_slow_blocks(
    records: &[BlockTimingRecord],
    dist: &Distribution,
    threshold_std_devs: f64,
) -> Vec<SlowBlock> {
    if dist.count < 2 || dist.std_dev == 0.0 {
        return Vec::new();
    }

    let limit = dist.mean + threshold_std_devs * dist.std_dev;
    let mut slow: Vec<SlowBlock> = records
        .iter()
        .filter(|r| r.total_block_time_seconds > limit)
        .map(|r| SlowBlock {
            height: r.height,
            block_time: r.total_block_time_seconds,
            std_devs_above_mean: round_to((r.total_block_time_seconds - dist.mean) / dist.std_dev, 2),
            tip_count: r.analysis.tip_count,
            tx_count: r.transactions.count,
            slowest_module: r
                .execution
                .as_ref()
                .and_then(|e| e.slowest_end_module())
                .map(|(name, _)| name.to_string()),
        })
        .collect();
    slow.sort_by(|a, b| b.block_time.total_cmp(&a.block_time));
    slow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::block_inspector::{Tip, TxAnalysis};
    use crate::output::schema::BlockInputs;
    use crate::tracker::{ModuleDeltaSet, PhaseRecord};

    fn record(height: u64, block_time: f64, tips: usize) -> BlockTimingRecord {
        BlockTimingRecord::assemble(BlockInputs {
            height,
            block_time_seconds: block_time,
            transactions: TxAnalysis {
                tips: vec![Tip::default(); tips],
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_distribution() {
        let d = Distribution::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(d.count, 4);
        assert_eq!(d.mean, 2.5);
        assert_eq!(d.median, 2.5);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 4.0);
        assert!((d.std_dev - 1.290_994).abs() < 1e-5);

        assert!(Distribution::from_values(&[]).is_none());
        assert_eq!(Distribution::from_values(&[5.0]).unwrap().std_dev, 0.0);
    }

    #[test]
    fn test_zero_block_times_excluded() {
        let records = vec![record(1, 0.0, 0), record(2, 2.0, 0), record(3, 4.0, 0)];
        let stats = calculate_run_statistics(&records, 2.0);

        assert_eq!(stats.total_blocks, 3);
        assert_eq!(stats.start_height, Some(1));
        assert_eq!(stats.end_height, Some(3));
        assert_eq!(stats.block_time.unwrap().mean, 3.0);
    }

    #[test]
    fn test_tip_correlation() {
        let records = vec![
            record(1, 2.0, 0),
            record(2, 2.0, 0),
            record(3, 3.0, 1),
        ];
        let tips = calculate_run_statistics(&records, 2.0).tips;

        assert_eq!(tips.blocks_with_tips, 1);
        assert_eq!(tips.blocks_without_tips, 2);
        assert_eq!(tips.avg_block_time_with_tips, 3.0);
        assert_eq!(tips.avg_block_time_without_tips, 2.0);
        assert_eq!(tips.difference_seconds, Some(1.0));
        assert_eq!(tips.percent_increase, Some(50.0));
    }

    #[test]
    fn test_slow_blocks() {
        let mut records: Vec<BlockTimingRecord> = (1..=9).map(|h| record(h, 2.0, 0)).collect();
        records.push(record(10, 10.0, 2));

        let stats = calculate_run_statistics(&records, 2.0);

        assert_eq!(stats.slow_blocks.len(), 1);
        assert_eq!(stats.slow_blocks[0].height, 10);
        assert_eq!(stats.slow_blocks[0].tip_count, 2);
    }

    #[test]
    fn test_consensus_and_module_stats() {
        let mut a = BlockInputs {
            height: 1,
            block_time_seconds: 2.0,
            consensus: Some(PhaseRecord {
                height: 1,
                rounds: 1,
                propose_ms: 100.0,
                prevote_ms: 50.0,
                precommit_ms: 50.0,
                commit_ms: 0.0,
                total_consensus_ms: 200.0,
            }),
            deltas: Some(ModuleDeltaSet {
                begin: Default::default(),
                end: [("oracle".to_string(), 10.0), ("bank".to_string(), 1.0)]
                    .into_iter()
                    .collect(),
            }),
            ..Default::default()
        };
        let first = BlockTimingRecord::assemble(a.clone());
        a.height = 2;
        a.consensus = None;
        a.deltas = Some(ModuleDeltaSet {
            begin: Default::default(),
            end: [("oracle".to_string(), 20.0)].into_iter().collect(),
        });
        let second = BlockTimingRecord::assemble(a);

        let stats = calculate_run_statistics(&[first, second], 2.0);

        let consensus = stats.consensus.unwrap();
        assert_eq!(consensus.blocks, 1);
        assert_eq!(consensus.mean_propose_ms, 100.0);
        assert_eq!(consensus.multi_round_count, 1);

        assert_eq!(stats.end_block_modules[0].module, "oracle");
        assert_eq!(stats.end_block_modules[0].time_ms.mean, 15.0);
        assert_eq!(stats.end_block_modules[0].time_ms.max, 20.0);
        assert_eq!(stats.end_block_modules[1].module, "bank");
        assert!(stats.begin_block_modules.is_empty());
    }

    #[test]
    fn test_begin_and_end_module_distributions() {
        let records: Vec<BlockTimingRecord> = [(4.0, 30.0), (6.0, 10.0), (11.0, 20.0)]
            .into_iter()
            .enumerate()
            .map(|(i, (begin_ms, end_ms))| {
                BlockTimingRecord::assemble(BlockInputs {
                    height: i as u64 + 1,
                    block_time_seconds: 2.0,
                    deltas: Some(ModuleDeltaSet {
                        begin: [("mint".to_string(), begin_ms)].into_iter().collect(),
                        end: [("oracle".to_string(), end_ms)].into_iter().collect(),
                    }),
                    ..Default::default()
                })
            })
            .collect();

        let stats = calculate_run_statistics(&records, 2.0);

        let mint = &stats.begin_block_modules[0];
        assert_eq!(mint.module, "mint");
        assert_eq!(mint.time_ms.count, 3);
        assert_eq!(mint.time_ms.mean, 7.0);
        assert_eq!(mint.time_ms.median, 6.0);
        assert_eq!(mint.time_ms.min, 4.0);
        assert_eq!(mint.time_ms.max, 11.0);
        assert_eq!(mint.time_ms.std_dev, 3.6);

        let oracle = &stats.end_block_modules[0];
        assert_eq!(oracle.time_ms.median, 20.0);
        assert_eq!(oracle.time_ms.std_dev, 10.0);
    }
}
