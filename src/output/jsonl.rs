//! JSON-Lines record output.
//!
//! Each emitted record is appended as one compact JSON object per line and
//! flushed immediately, so a crash loses at most the record being written.

use super::schema::BlockTimingRecord;
use crate::utils::error::OutputError;
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only writer for timing records
pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlWriter {
    /// Open `output_path` for appending, creating parent directories
    ///
    /// # Errors
    /// * `OutputError::InvalidPath` - Path is empty, a directory, or its parent cannot be created
    /// * `OutputError::WriteFailed` - File cannot be opened
    pub fn open(output_path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let output_path = output_path.as_ref();

        prepare_output_path(output_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_path)
            .map_err(OutputError::WriteFailed)?;

        info!("Writing records to: {}", output_path.display());

        Ok(Self {
            path: output_path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Open a timestamped file `block_timing_<YYYYmmdd_HHMMSS>.jsonl` in `dir`
    pub fn open_in_dir(dir: impl AsRef<Path>) -> Result<Self, OutputError> {
        let name = format!(
            "block_timing_{}.jsonl",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        Self::open(dir.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written by this writer
    pub fn written(&self) -> usize {
        self.written
    }

    /// Append one record and flush
    pub fn append(&mut self, record: &BlockTimingRecord) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(OutputError::SerializationFailed)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}

/// Validate the path and create its parent directories
pub(crate) fn prepare_output_path(output_path: &Path) -> Result<(), OutputError> {
    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

/// Validate that output path is writable
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    // Check if we're trying to write over a directory
    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Read every record from a JSON-Lines file, failing on the first bad line
///
/// Blank lines are skipped.
pub fn read_records(input_path: impl AsRef<Path>) -> Result<Vec<BlockTimingRecord>, OutputError> {
    let mut records = Vec::new();
    for (index, line) in open_lines(input_path.as_ref())?.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| OutputError::MalformedRecord {
            line: index + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Read records, skipping lines that do not parse
///
/// Returns the records and the number of skipped lines.
pub fn read_records_lenient(
    input_path: impl AsRef<Path>,
) -> Result<(Vec<BlockTimingRecord>, usize), OutputError> {
    let mut records = Vec::new();
    let mut skipped = 0;
    for (index, line) in open_lines(input_path.as_ref())?.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Skipping line {}: {}", index + 1, e);
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

fn open_lines(path: &Path) -> Result<std::io::Lines<BufReader<File>>, OutputError> {
    debug!("Reading records from: {}", path.display());
    let file = File::open(path).map_err(OutputError::WriteFailed)?;
    Ok(BufReader::new(file).lines())
}
