//! Block Timing CLI
//!
//! Passive collector of per-block consensus, execution and content timing
//! for CometBFT-style nodes.

use anyhow::{Context, Result};
use block_timing::commands::analyze::DEFAULT_SLOW_THRESHOLD;
use block_timing::commands::{
    display_schema, display_version, execute_analyze, execute_collect, execute_compare,
    validate_args, validate_records_file, AnalyzeArgs, CollectArgs, CompareArgs,
};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

/// Block Timing - per-block timing collector for CometBFT nodes
#[derive(Parser, Debug)]
#[command(name = "block-timing")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect per-block timing records from a running node
    Collect {
        /// Config file (TOML, or YAML for .yaml/.yml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// RPC endpoint URL (default http://localhost:26657)
        #[arg(short, long)]
        rpc: Option<String>,

        /// Prometheus metrics URL (default http://localhost:26660/metrics)
        #[arg(short, long)]
        metrics: Option<String>,

        /// Directory for the JSON-Lines output
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Node log file to tail for [ABCI_TIMING] lines
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Do not print a summary line per block
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print statistics for a collected records file, or compare two runs
    Analyze {
        /// Path to JSON-Lines records file
        #[arg(short, long, required_unless_present = "compare")]
        file: Option<PathBuf>,

        /// Standard deviations above the mean for a block to count as slow
        #[arg(long, default_value_t = DEFAULT_SLOW_THRESHOLD)]
        slow_threshold: f64,

        /// Export the summary (or comparison) as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compare a test run against a baseline run
        #[arg(long, requires_all = ["baseline", "test"], conflicts_with = "file")]
        compare: bool,

        /// Baseline records file for --compare
        #[arg(long, requires = "compare")]
        baseline: Option<PathBuf>,

        /// Test records file for --compare
        #[arg(long, requires = "compare")]
        test: Option<PathBuf>,
    },

    /// Validate a records file
    Validate {
        /// Path to JSON-Lines records file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Collect {
            config,
            rpc,
            metrics,
            output_dir,
            log_file,
            duration,
            quiet,
        } => {
            let args = CollectArgs {
                config,
                rpc_url: rpc,
                metrics_url: metrics,
                output_dir,
                log_file,
                duration_secs: duration,
                quiet,
            };

            // Validate args first
            validate_args(&args)?;

            execute_collect(args)?;
        }

        Commands::Analyze {
            file,
            slow_threshold,
            output,
            compare,
            baseline,
            test,
        } => {
            if compare {
                let (Some(baseline), Some(test)) = (baseline, test) else {
                    anyhow::bail!("--compare requires both --baseline and --test");
                };
                execute_compare(CompareArgs {
                    baseline,
                    test,
                    output,
                })?;
            } else {
                let file = file.context("--file is required unless --compare is given")?;
                execute_analyze(AnalyzeArgs {
                    file,
                    slow_threshold,
                    output,
                })?;
            }
        }

        Commands::Validate { file } => {
            validate_records_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
