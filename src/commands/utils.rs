use crate::output::read_records;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::path::Path;

/// Result of validating a records file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub records: usize,
    pub first_height: Option<u64>,
    pub last_height: Option<u64>,
    /// Heights strictly increasing from line to line
    pub ordered: bool,
}

/// Validate a JSON-Lines records file
///
/// Fails on the first malformed line.
pub fn validate_records_file(file_path: impl AsRef<Path>) -> Result<ValidationReport> {
    let file_path = file_path.as_ref();
    println!("Validating records: {}", file_path.display());

    let records = read_records(file_path)
        .with_context(|| format!("Invalid records file {}", file_path.display()))?;

    let report = ValidationReport {
        records: records.len(),
        first_height: records.first().map(|r| r.height),
        last_height: records.last().map(|r| r.height),
        ordered: records.windows(2).all(|w| w[0].height < w[1].height),
    };

    println!("✓ Valid records file");
    println!("  Records: {}", report.records);
    if let (Some(first), Some(last)) = (report.first_height, report.last_height) {
        println!("  Heights: {} - {}", first, last);
    }
    if report.ordered {
        println!("  Order: strictly increasing");
    } else {
        println!("  Order: NOT strictly increasing");
    }

    Ok(report)
}

/// Field reference printed by `schema --show`
const RECORD_FIELDS: &str = concat!(
    "  height: number                    - Committed block height\n",
    "  timestamp: string                 - Block header time (RFC 3339)\n",
    "  proposer: string                  - Proposer address\n",
    "  total_block_time_seconds: number  - Time since previous block (0 if unknown)\n",
    "  execution: object?                - Begin/end-block module timing\n",
    "    begin_block_modules: object     - <module>: ms, plus total\n",
    "    end_block_modules: object       - <module>: ms, plus total\n",
    "    total_execution_ms: number      - Begin + end total\n",
    "    percent_of_block_time: number?  - Share of block time\n",
    "  transactions: object              - Block contents\n",
    "    count: number                   - Transactions in the block\n",
    "    gas_used: number                - Total gas used\n",
    "    gas_wanted: number              - Total gas wanted\n",
    "    message_types: object           - Event type histogram\n",
    "    tips: array                     - Tip events (query_id, amount, tipper)\n",
    "  consensus: object?                - Phase timing (absent if not observed)\n",
    "    rounds: number                  - Last round observed\n",
    "    propose_duration_ms: number\n",
    "    prevote_duration_ms: number\n",
    "    precommit_duration_ms: number\n",
    "    commit_duration_ms: number\n",
    "    total_consensus_ms: number      - Sum of the four phases\n",
    "    percent_of_block_time: number?  - Share of block time\n",
    "  abci: object?                     - ABCI timing from the node log\n",
    "    finalize_block_ms: number\n",
    "    num_txs: number?\n",
    "  analysis: object                  - has_tips, tip_count\n",
);

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("Block Timing Record Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Record Structure (one JSON object per line):");
        print!("{}", RECORD_FIELDS);
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("Block Timing v{}", env!("CARGO_PKG_VERSION"));
    println!("Record Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Per-block consensus, execution and content timing for CometBFT nodes.");
}
