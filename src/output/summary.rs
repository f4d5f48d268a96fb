//! One-line human-readable block summaries.

use super::schema::BlockTimingRecord;
use colored::Colorize;

/// Format a record as a single status line
///
/// ```text
/// Block 101: 2.000s | Txs: 3 | Exec: 12.5ms | Consensus: 1840.2ms | Slowest: oracle(9.1ms) | Tips: YES
/// ```
pub fn format_block_summary(record: &BlockTimingRecord) -> String {
    let exec_ms = record
        .execution
        .as_ref()
        .map_or(0.0, |e| e.total_execution_ms);
    let consensus = match &record.consensus {
        Some(c) => format!("{:.1}ms", c.phases.total_consensus_ms),
        None => "n/a".to_string(),
    };
    let slowest = record
        .execution
        .as_ref()
        .and_then(|e| e.slowest_end_module())
        .map(|(name, ms)| format!(" | Slowest: {}({:.1}ms)", name, ms))
        .unwrap_or_default();
    let tips = if record.analysis.has_tips {
        "YES".yellow().bold().to_string()
    } else {
        "no".to_string()
    };

    format!(
        "Block {}: {:.3}s | Txs: {} | Exec: {:.1}ms | Consensus: {}{} | Tips: {}",
        record.height.to_string().bold(),
        record.total_block_time_seconds,
        record.transactions.count,
        exec_ms,
        consensus,
        slowest,
        tips
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::schema::BlockInputs;
    use crate::tracker::ModuleDeltaSet;

    #[test]
    fn test_summary_line() {
        colored::control::set_override(false);

        let record = BlockTimingRecord::assemble(BlockInputs {
            height: 101,
            block_time_seconds: 2.0,
            deltas: Some(ModuleDeltaSet {
                begin: Default::default(),
                end: [("oracle".to_string(), 9.1), ("bank".to_string(), 1.0)]
                    .into_iter()
                    .collect(),
            }),
            ..Default::default()
        });

        assert_eq!(
            format_block_summary(&record),
            "Block 101: 2.000s | Txs: 0 | Exec: 10.1ms | Consensus: n/a | Slowest: oracle(9.1ms) | Tips: no"
        );
    }
}
