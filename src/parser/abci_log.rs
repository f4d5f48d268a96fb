//! ABCI timing lines from the node log.
//!
//! The node writes lines such as
//!
//! ```text
//! 12:00:01 INF [ABCI_TIMING] height=12345 finalize_block_ms=250 num_txs=5
//! ```
//!
//! [`AbciLogTailer`] reads whatever was appended since the previous call.

use crate::utils::config::ABCI_TIMING_MARKER;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;

/// One parsed ABCI timing line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciTiming {
    pub height: u64,
    pub finalize_block_ms: Option<u64>,
    pub num_txs: Option<u64>,
}

/// Parse a log line; `None` unless it carries the marker and a height
pub fn parse_abci_line(line: &str) -> Option<AbciTiming> {
    if !line.contains(ABCI_TIMING_MARKER) {
        return None;
    }

    Some(AbciTiming {
        height: field(line, "height")?,
        finalize_block_ms: field(line, "finalize_block_ms"),
        num_txs: field(line, "num_txs"),
    })
}

fn field(line: &str, key: &str) -> Option<u64> {
    line.split_whitespace()
        .filter_map(|token| token.split_once('='))
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.parse().ok())
}

/// Incremental reader over an append-only log file
#[derive(Debug)]
pub struct AbciLogTailer {
    path: PathBuf,
    offset: u64,
}

impl AbciLogTailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    /// Timing entries appended since the last call
    ///
    /// A missing file yields nothing. A file shorter than the saved offset
    /// was rotated or truncated and is read again from the start. Bytes that
    /// are not UTF-8 are replaced rather than rejected.
    pub fn read_new(&mut self) -> Vec<AbciTiming> {
        match self.try_read_new() {
            Ok(timings) => timings,
            Err(e) => {
                warn!("Could not read log {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn try_read_new(&mut self) -> std::io::Result<Vec<AbciTiming>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.offset {
            debug!("Log {} shrank, reading from start", self.path.display());
            self.offset = 0;
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(file);
        let mut timings = Vec::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) => {
                    warn!("Stopped reading log {}: {}", self.path.display(), e);
                    break;
                }
            };
            // Leave a partially written final line for the next call
            if line.last() != Some(&b'\n') {
                break;
            }
            self.offset += read as u64;
            if let Some(timing) = parse_abci_line(&String::from_utf8_lossy(&line)) {
                timings.push(timing);
            }
        }

        Ok(timings)
    }
}
