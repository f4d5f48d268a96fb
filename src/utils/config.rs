//! Configuration and constants for the collector.
//!
//! The collector reads an optional TOML file laid out as:
//!
//! ```toml
//! [endpoints]
//! rpc = "http://localhost:26657"
//! metrics = "http://localhost:26660/metrics"
//!
//! [monitoring]
//! output_dir = "block_timing"
//! log_file_path = "~/.layer/layer.log"
//! consensus_poll_ms = 50
//! status_poll_ms = 500
//!
//! [metrics]
//! begin_prefix = "begin_blocker"
//! end_prefix = "end_blocker"
//! ```
//!
//! A file ending in `.yaml` or `.yml` is read as YAML with the same keys.
//! Every key is optional; CLI flags override file values.

use crate::utils::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Record layout version, bumped on incompatible field changes
pub const SCHEMA_VERSION: &str = "1.0.0";

pub const DEFAULT_RPC_URL: &str = "http://localhost:26657";
pub const DEFAULT_METRICS_URL: &str = "http://localhost:26660/metrics";
pub const DEFAULT_OUTPUT_DIR: &str = "block_timing";

/// Fast loop target interval
pub const DEFAULT_CONSENSUS_POLL_MS: u64 = 50;
/// Slow loop target interval
pub const DEFAULT_STATUS_POLL_MS: u64 = 500;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CONSENSUS_TIMEOUT_MS: u64 = 2_000;

pub const DEFAULT_STARTUP_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_BLOCK_ATTEMPTS: u32 = 3;

/// Pending PhaseRecords held before the lowest is evicted
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

pub const DEFAULT_BEGIN_PREFIX: &str = "begin_blocker";
pub const DEFAULT_END_PREFIX: &str = "end_blocker";

/// Marker identifying ABCI timing lines in the node log
pub const ABCI_TIMING_MARKER: &str = "[ABCI_TIMING]";

/// Complete collector configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CollectorConfig {
    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Node endpoints
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    /// CometBFT RPC base URL
    pub rpc: String,

    /// Prometheus exposition URL
    pub metrics: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            rpc: DEFAULT_RPC_URL.to_string(),
            metrics: DEFAULT_METRICS_URL.to_string(),
        }
    }
}

/// Polling, timeouts and output placement
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    pub output_dir: PathBuf,

    /// Node log to tail for ABCI timing lines
    pub log_file_path: Option<PathBuf>,

    pub consensus_poll_ms: u64,
    pub status_poll_ms: u64,
    pub request_timeout_ms: u64,
    pub consensus_timeout_ms: u64,
    pub startup_attempts: u32,
    pub max_block_attempts: u32,
    pub buffer_capacity: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_file_path: None,
            consensus_poll_ms: DEFAULT_CONSENSUS_POLL_MS,
            status_poll_ms: DEFAULT_STATUS_POLL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            consensus_timeout_ms: DEFAULT_CONSENSUS_TIMEOUT_MS,
            startup_attempts: DEFAULT_STARTUP_ATTEMPTS,
            max_block_attempts: DEFAULT_MAX_BLOCK_ATTEMPTS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Counter metric names, without the `_sum` suffix
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub begin_prefix: String,
    pub end_prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            begin_prefix: DEFAULT_BEGIN_PREFIX.to_string(),
            end_prefix: DEFAULT_END_PREFIX.to_string(),
        }
    }
}

impl MonitoringConfig {
    pub fn consensus_interval(&self) -> Duration {
        Duration::from_millis(self.consensus_poll_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn consensus_timeout(&self) -> Duration {
        Duration::from_millis(self.consensus_timeout_ms)
    }
}

/// Load configuration from a TOML or YAML file, chosen by extension
///
/// # Errors
/// * `ConfigError::Io` - If file cannot be read
/// * `ConfigError::Toml` - If TOML is invalid
/// * `ConfigError::Yaml` - If YAML is invalid
pub fn load_config(path: impl AsRef<Path>) -> Result<CollectorConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let config: CollectorConfig = if is_yaml {
        serde_yaml::from_str(&contents)?
    } else {
        toml::from_str(&contents)?
    };
    Ok(config)
}

impl CollectorConfig {
    /// Check values that would make a run meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("endpoints.rpc", &self.endpoints.rpc)?;
        validate_url("endpoints.metrics", &self.endpoints.metrics)?;

        let m = &self.monitoring;
        if m.consensus_poll_ms == 0 || m.status_poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll intervals must be greater than 0".to_string(),
            ));
        }
        if m.consensus_poll_ms > m.status_poll_ms {
            return Err(ConfigError::Invalid(format!(
                "consensus_poll_ms ({}) must not exceed status_poll_ms ({})",
                m.consensus_poll_ms, m.status_poll_ms
            )));
        }
        if m.request_timeout_ms == 0 || m.consensus_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request timeouts must be greater than 0".to_string(),
            ));
        }
        if m.startup_attempts == 0 || m.max_block_attempts == 0 {
            return Err(ConfigError::Invalid(
                "startup_attempts and max_block_attempts must be at least 1".to_string(),
            ));
        }
        if m.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "buffer_capacity must be greater than 0".to_string(),
            ));
        }
        if self.metrics.begin_prefix.is_empty() || self.metrics.end_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "metric prefixes cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::Invalid(format!("{} cannot be empty", field)));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Invalid(format!(
            "{} must start with http:// or https://",
            field
        )));
    }
    Ok(())
}

/// Expand a leading `~/` against `$HOME`
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CollectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[endpoints]\nrpc = \"http://node:26657\"\n\n[monitoring]\nstatus_poll_ms = 1000"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.endpoints.rpc, "http://node:26657");
        assert_eq!(config.endpoints.metrics, DEFAULT_METRICS_URL);
        assert_eq!(config.monitoring.status_poll_ms, 1000);
        assert_eq!(config.monitoring.consensus_poll_ms, DEFAULT_CONSENSUS_POLL_MS);
        assert_eq!(config.metrics.begin_prefix, DEFAULT_BEGIN_PREFIX);
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[endpoints\nrpc = ").unwrap();

        assert!(matches!(load_config(file.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_load_yaml_config() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "endpoints:\n  rpc: http://node:26657\n  metrics: http://node:26660/metrics\n\
             monitoring:\n  output_dir: timing_runs\n  log_file_path: ~/.layer/layer.log"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.endpoints.rpc, "http://node:26657");
        assert_eq!(config.endpoints.metrics, "http://node:26660/metrics");
        assert_eq!(config.monitoring.output_dir, PathBuf::from("timing_runs"));
        assert_eq!(
            config.monitoring.log_file_path,
            Some(PathBuf::from("~/.layer/layer.log"))
        );
        assert_eq!(config.monitoring.status_poll_ms, DEFAULT_STATUS_POLL_MS);
    }

    #[test]
    fn test_load_invalid_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "endpoints: [unclosed").unwrap();

        assert!(matches!(load_config(file.path()), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_invalid_rpc_scheme() {
        let mut config = CollectorConfig::default();
        config.endpoints.rpc = "ftp://localhost:26657".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fast_interval_slower_than_slow_interval() {
        let mut config = CollectorConfig::default();
        config.monitoring.consensus_poll_ms = 1000;
        config.monitoring.status_poll_ms = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(
            expand_home(Path::new("/var/log/node.log")),
            PathBuf::from("/var/log/node.log")
        );
    }
}
