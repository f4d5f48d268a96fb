//! Collect command implementation.
//!
//! The collect command:
//! 1. Resolves configuration (file, then CLI overrides)
//! 2. Connects to the node and waits for a status response
//! 3. Runs the consensus and block loops until stopped
//! 4. Writes one JSON line per committed height

use crate::collector::{run_collection, CollectionSummary, CollectorSettings, RecordSink};
use crate::output::{format_block_summary, BlockTimingRecord, JsonlWriter};
use crate::rpc::RpcClient;
use crate::utils::config::{expand_home, load_config, CollectorConfig};
use crate::utils::error::OutputError;
use anyhow::{Context, Result};
use log::{debug, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Arguments for the collect command
///
/// **Public** - used by main.rs to construct from CLI args.
/// `None` fields fall back to the config file, then to built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct CollectArgs {
    /// Optional TOML or YAML config file
    pub config: Option<PathBuf>,

    /// CometBFT RPC endpoint
    pub rpc_url: Option<String>,

    /// Prometheus metrics endpoint
    pub metrics_url: Option<String>,

    /// Directory for the JSON-Lines output
    pub output_dir: Option<PathBuf>,

    /// Node log file to tail for ABCI timing lines
    pub log_file: Option<PathBuf>,

    /// Stop after this many seconds
    pub duration_secs: Option<u64>,

    /// Suppress per-block summary lines
    pub quiet: bool,
}

/// Writes each record to the JSONL file and echoes a summary line
struct ConsoleSink {
    writer: JsonlWriter,
    quiet: bool,
}

impl RecordSink for ConsoleSink {
    fn emit(&mut self, record: &BlockTimingRecord) -> Result<(), OutputError> {
        self.writer.append(record)?;
        if !self.quiet {
            println!("{}", format_block_summary(record));
        }
        Ok(())
    }
}

/// Execute the collect command
///
/// **Public** - main entry point called from main.rs
///
/// Runs until `--duration` elapses or SIGINT/SIGTERM is received.
///
/// # Errors
/// * Config file unreadable or invalid
/// * Output directory not writable
/// * Status endpoint unreachable at startup
/// * Record write failures
pub fn execute_collect(args: CollectArgs) -> Result<CollectionSummary> {
    let start_time = Instant::now();
    let config = resolve_config(&args)?;

    info!("RPC endpoint: {}", config.endpoints.rpc);
    info!("Metrics endpoint: {}", config.endpoints.metrics);

    let client = RpcClient::new(
        config.endpoints.rpc.clone(),
        config.endpoints.metrics.clone(),
        config.monitoring.request_timeout(),
        config.monitoring.consensus_timeout(),
    )
    .context("Failed to create RPC client")?;

    let output_dir = expand_home(&config.monitoring.output_dir);
    let writer = JsonlWriter::open_in_dir(&output_dir)
        .with_context(|| format!("Failed to open output in {}", output_dir.display()))?;
    let output_path = writer.path().to_path_buf();
    let mut sink = ConsoleSink {
        writer,
        quiet: args.quiet,
    };

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop))
            .context("Failed to register signal handler")?;
    }
    debug!("Stop flag registered for SIGINT/SIGTERM");

    let duration = args.duration_secs.map(Duration::from_secs);
    match duration {
        Some(d) => info!("Collecting for {}s (Ctrl+C to stop early)", d.as_secs()),
        None => info!("Collecting until interrupted (Ctrl+C to stop)"),
    }

    let settings = CollectorSettings::from_config(&config, duration);
    let summary = run_collection(&client, &settings, &mut sink, &stop)
        .context("Collection failed")?;

    info!(
        "✓ {} records written to: {}",
        summary.records_emitted,
        output_path.display()
    );
    info!("Run completed in {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(summary)
}

/// Build the effective configuration for a run
///
/// **Public** - exposed for testing override precedence
///
/// Order: built-in defaults, then the config file, then CLI flags.
pub fn resolve_config(args: &CollectArgs) -> Result<CollectorConfig> {
    validate_args(args)?;

    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CollectorConfig::default(),
    };

    if let Some(rpc) = &args.rpc_url {
        config.endpoints.rpc = rpc.clone();
    }
    if let Some(metrics) = &args.metrics_url {
        config.endpoints.metrics = metrics.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.monitoring.output_dir = dir.clone();
    }
    if let Some(log_file) = &args.log_file {
        config.monitoring.log_file_path = Some(log_file.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Validate collect arguments
///
/// **Public** - can be called before execute_collect for early validation
pub fn validate_args(args: &CollectArgs) -> Result<()> {
    if args.duration_secs == Some(0) {
        anyhow::bail!("duration must be greater than 0");
    }

    if let Some(path) = &args.config {
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
    }

    if let Some(path) = &args.output_dir {
        if path.as_os_str().is_empty() {
            anyhow::bail!("Output directory cannot be empty");
        }
        if path.is_file() {
            anyhow::bail!("Output directory is a file: {}", path.display());
        }
    }

    Ok(())
}
