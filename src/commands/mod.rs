//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod analyze;
pub mod collect;
pub mod utils;

// Re-export main command functions
pub use analyze::{execute_analyze, execute_compare, AnalyzeArgs, CompareArgs};
pub use collect::{execute_collect, resolve_config, validate_args, CollectArgs};
pub use utils::{display_schema, display_version, validate_records_file};
