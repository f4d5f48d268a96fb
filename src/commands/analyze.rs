//! Analyze command implementation.
//!
//! Loads a collected JSON-Lines file and prints run statistics, or compares
//! two runs against each other.

use crate::aggregator::comparison::{compare_runs, ModuleDelta, RunComparison};
use crate::aggregator::statistics::{calculate_run_statistics, ModuleStats, RunStatistics};
use crate::output::schema::BlockTimingRecord;
use crate::output::{read_records_lenient, write_summary};
use anyhow::{Context, Result};
use colored::Colorize;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Default slow-block threshold in standard deviations above the mean
pub const DEFAULT_SLOW_THRESHOLD: f64 = 2.0;

/// Slow blocks listed in the report
const MAX_SLOW_BLOCKS_SHOWN: usize = 10;

/// Modules listed per blocker phase
const MAX_MODULES_SHOWN: usize = 10;

/// Arguments for the analyze command
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    pub file: PathBuf,
    pub slow_threshold: f64,
    /// Also export the statistics as JSON here
    pub output: Option<PathBuf>,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            file: PathBuf::new(),
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
            output: None,
        }
    }
}

/// Arguments for `analyze --compare`
#[derive(Debug, Clone, Default)]
pub struct CompareArgs {
    pub baseline: PathBuf,
    pub test: PathBuf,
    /// Also export the comparison as JSON here
    pub output: Option<PathBuf>,
}

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// Malformed lines are skipped with a warning rather than failing the run.
///
/// # Errors
/// * File cannot be read
/// * File contains no valid records
pub fn execute_analyze(args: AnalyzeArgs) -> Result<RunStatistics> {
    if !args.slow_threshold.is_finite() || args.slow_threshold < 0.0 {
        anyhow::bail!("slow threshold must be a non-negative number");
    }

    info!("Analyzing: {}", args.file.display());

    let records = load_records(&args.file)?;
    let stats = calculate_run_statistics(&records, args.slow_threshold);
    print_report(&stats, args.slow_threshold);

    if let Some(output) = &args.output {
        write_summary(&stats, output)
            .with_context(|| format!("Failed to export summary to {}", output.display()))?;
        println!("Summary exported to: {}", output.display());
    }

    Ok(stats)
}

/// Execute `analyze --compare`
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Either file cannot be read or contains no valid records
/// * The comparison cannot be exported
pub fn execute_compare(args: CompareArgs) -> Result<RunComparison> {
    info!(
        "Comparing {} (test) against {} (baseline)",
        args.test.display(),
        args.baseline.display()
    );

    let baseline = calculate_run_statistics(&load_records(&args.baseline)?, DEFAULT_SLOW_THRESHOLD);
    let test = calculate_run_statistics(&load_records(&args.test)?, DEFAULT_SLOW_THRESHOLD);

    let comparison = compare_runs(&baseline, &test);
    print_comparison(&comparison);

    if let Some(output) = &args.output {
        write_summary(&comparison, output)
            .with_context(|| format!("Failed to export comparison to {}", output.display()))?;
        println!("Comparison exported to: {}", output.display());
    }

    Ok(comparison)
}

/// Read a records file, skipping malformed lines; empty is an error
fn load_records(path: &Path) -> Result<Vec<BlockTimingRecord>> {
    let (records, skipped) = read_records_lenient(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if skipped > 0 {
        warn!("Skipped {} malformed lines in {}", skipped, path.display());
    }
    if records.is_empty() {
        anyhow::bail!("No records found in {}", path.display());
    }
    Ok(records)
}

/// Print the report to stdout
///
/// **Private** - internal helper for execute_analyze
fn print_report(stats: &RunStatistics, slow_threshold: f64) {
    println!("\n{}", "=".repeat(80));
    println!("{}", "BLOCK TIMING ANALYSIS".bold());
    println!("{}", "=".repeat(80));

    match (stats.start_height, stats.end_height) {
        (Some(start), Some(end)) => {
            println!("Blocks:      {} (heights {} - {})", stats.total_blocks, start, end)
        }
        _ => println!("Blocks:      {}", stats.total_blocks),
    }

    if let Some(dist) = &stats.block_time {
        println!("Block time:  {}", dist.summary("s"));
    }

    println!("\n{}", "Consensus phases (mean)".bold());
    match &stats.consensus {
        Some(c) => {
            println!("  Propose:     {:>8.1}ms", c.mean_propose_ms);
            println!("  Prevote:     {:>8.1}ms", c.mean_prevote_ms);
            println!("  Precommit:   {:>8.1}ms", c.mean_precommit_ms);
            println!("  Commit:      {:>8.1}ms", c.mean_commit_ms);
            println!("  Total:       {:>8.1}ms", c.mean_total_ms);
            println!(
                "  Multi-round: {} of {} blocks",
                c.multi_round_count, c.blocks
            );
        }
        None => println!("  no consensus timing recorded"),
    }

    print_modules("Begin-block modules", &stats.begin_block_modules);
    print_modules("End-block modules", &stats.end_block_modules);

    let tips = &stats.tips;
    println!("\n{}", "Tips".bold());
    println!(
        "  With tips:    {} blocks, avg {:.3}s",
        tips.blocks_with_tips, tips.avg_block_time_with_tips
    );
    println!(
        "  Without tips: {} blocks, avg {:.3}s",
        tips.blocks_without_tips, tips.avg_block_time_without_tips
    );
    if let Some(diff) = tips.difference_seconds {
        let pct = tips
            .percent_increase
            .map(|p| format!(" ({:+.1}%)", p))
            .unwrap_or_default();
        println!("  Difference:   {:+.3}s{}", diff, pct);
    }

    println!(
        "\n{}",
        format!("Slow blocks (> mean + {:.1} std-dev)", slow_threshold).bold()
    );
    if stats.slow_blocks.is_empty() {
        println!("  none");
    }
    for block in stats.slow_blocks.iter().take(MAX_SLOW_BLOCKS_SHOWN) {
        let slowest = block
            .slowest_module
            .as_deref()
            .map(|m| format!(" | slowest: {}", m))
            .unwrap_or_default();
        println!(
            "  Block {}: {:.3}s ({:.1}σ) | txs: {} | tips: {}{}",
            block.height.to_string().red(),
            block.block_time,
            block.std_devs_above_mean,
            block.tx_count,
            block.tip_count,
            slowest
        );
    }
    println!("{}", "=".repeat(80));
}

fn print_modules(title: &str, modules: &[ModuleStats]) {
    println!("\n{}", title.bold());
    if modules.is_empty() {
        println!("  no execution timing recorded");
    }
    for module in modules.iter().take(MAX_MODULES_SHOWN) {
        let t = &module.time_ms;
        println!(
            "  {:<24} mean {:>8.1}ms | median {:>8.1}ms | min {:>8.1}ms | max {:>8.1}ms | std-dev {:>7.1}ms",
            module.module, t.mean, t.median, t.min, t.max, t.std_dev
        );
    }
}

/// Print the comparison to stdout
///
/// **Private** - internal helper for execute_compare
fn print_comparison(cmp: &RunComparison) {
    println!("\n{}", "=".repeat(80));
    println!("{}", "COMPARATIVE ANALYSIS".bold());
    println!("{}", "=".repeat(80));
    println!("Blocks:      baseline {} | test {}", cmp.baseline_blocks, cmp.test_blocks);

    println!("\n{}", "Block time (mean)".bold());
    match &cmp.block_time {
        Some(d) => {
            println!("  Baseline:   {:.3}s", d.baseline);
            println!("  Test:       {:.3}s", d.test);
            println!("  Difference: {:+.3}s{}", d.difference, percent_suffix(d.percent_change));
        }
        None => println!("  not available in both runs"),
    }

    println!("\n{}", "Consensus total (mean)".bold());
    match &cmp.consensus_total {
        Some(d) => {
            println!("  Baseline:   {:.1}ms", d.baseline);
            println!("  Test:       {:.1}ms", d.test);
            println!("  Difference: {:+.1}ms{}", d.difference, percent_suffix(d.percent_change));
        }
        None => println!("  not available in both runs"),
    }

    print_module_changes("Begin-block module changes", &cmp.begin_block_modules);
    print_module_changes("End-block module changes", &cmp.end_block_modules);
    println!("{}", "=".repeat(80));
}

fn print_module_changes(title: &str, changes: &[ModuleDelta]) {
    println!("\n{}", title.bold());
    if changes.is_empty() {
        println!("  no execution timing recorded");
    }
    for change in changes.iter().take(MAX_MODULES_SHOWN) {
        let d = &change.mean_ms;
        let line = format!(
            "  {:<24} {:>8.1}ms -> {:>8.1}ms ({:+.1}ms{})",
            change.module,
            d.baseline,
            d.test,
            d.difference,
            d.percent_change
                .map(|p| format!(", {:+.1}%", p))
                .unwrap_or_default()
        );
        if d.difference > 0.0 {
            println!("{}", line.red());
        } else {
            println!("{}", line);
        }
    }
}

fn percent_suffix(percent: Option<f64>) -> String {
    percent.map(|p| format!(" ({:+.1}%)", p)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::schema::BlockInputs;
    use crate::output::{BlockTimingRecord, JsonlWriter};
    use tempfile::TempDir;

    #[test]
    fn test_analyze_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let mut writer = JsonlWriter::open(&path).unwrap();
        for (height, time) in [(1, 2.0), (2, 3.0)] {
            writer
                .append(&BlockTimingRecord::assemble(BlockInputs {
                    height,
                    block_time_seconds: time,
                    ..Default::default()
                }))
                .unwrap();
        }
        drop(writer);
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| std::io::Write::write_all(&mut f, b"{not json}\n"))
            .unwrap();

        let stats = execute_analyze(AnalyzeArgs {
            file: path,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.block_time.unwrap().mean, 2.5);
    }

    #[test]
    fn test_analyze_empty_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.jsonl");
        std::fs::write(&path, "").unwrap();

        let result = execute_analyze(AnalyzeArgs {
            file: path,
            ..Default::default()
        });

        assert!(result.is_err());
    }

    #[test]
    fn test_analyze_negative_threshold() {
        let result = execute_analyze(AnalyzeArgs {
            file: PathBuf::from("unused.jsonl"),
            slow_threshold: -1.0,
            output: None,
        });

        assert!(result.is_err());
    }

    fn write_run(dir: &TempDir, name: &str, times: &[f64]) -> PathBuf {
        let path = dir.path().join(name);
        let mut writer = JsonlWriter::open(&path).unwrap();
        for (i, &time) in times.iter().enumerate() {
            writer
                .append(&BlockTimingRecord::assemble(BlockInputs {
                    height: i as u64 + 1,
                    block_time_seconds: time,
                    ..Default::default()
                }))
                .unwrap();
        }
        path
    }

    #[test]
    fn test_analyze_exports_summary() {
        let dir = TempDir::new().unwrap();
        let file = write_run(&dir, "run.jsonl", &[2.0, 4.0]);
        let output = dir.path().join("summary.json");

        execute_analyze(AnalyzeArgs {
            file,
            output: Some(output.clone()),
            ..Default::default()
        })
        .unwrap();

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(summary["total_blocks"], 2);
        assert_eq!(summary["block_time"]["mean"], 3.0);
        assert!(summary["end_block_modules"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_compare_runs_from_files() {
        let dir = TempDir::new().unwrap();
        let baseline = write_run(&dir, "baseline.jsonl", &[2.0, 2.0]);
        let test = write_run(&dir, "test.jsonl", &[3.0, 3.0]);
        let output = dir.path().join("comparison.json");

        let cmp = execute_compare(CompareArgs {
            baseline,
            test,
            output: Some(output.clone()),
        })
        .unwrap();

        let block_time = cmp.block_time.unwrap();
        assert_eq!(block_time.difference, 1.0);
        assert_eq!(block_time.percent_change, Some(50.0));
        assert!(cmp.consensus_total.is_none());
        assert!(output.exists());
    }

    #[test]
    fn test_compare_missing_baseline_fails() {
        let dir = TempDir::new().unwrap();
        let test = write_run(&dir, "test.jsonl", &[3.0]);

        let result = execute_compare(CompareArgs {
            baseline: dir.path().join("missing.jsonl"),
            test,
            output: None,
        });

        assert!(result.is_err());
    }
}
