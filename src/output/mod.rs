//! Output of collected records.
//!
//! This module handles:
//! - The per-block record schema
//! - JSON-Lines files (append and read back)
//! - Pretty-printed JSON summaries
//! - One-line text summaries

pub mod json;
pub mod jsonl;
pub mod schema;
pub mod summary;

// Re-export main functions
pub use json::write_summary;
pub use jsonl::{read_records, read_records_lenient, JsonlWriter};
pub use schema::{BlockInputs, BlockTimingRecord};
pub use summary::format_block_summary;
