//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while talking to the node
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur while decoding raw node data
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid height/round/step: {0:?}")]
    InvalidRoundStep(String),

    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
}

/// Errors that can occur while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse YAML config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that end a collection run
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Status source unreachable after {attempts} attempts: {source}")]
    StatusUnreachable {
        attempts: u32,
        #[source]
        source: RpcError,
    },

    #[error("Failed to emit record: {0}")]
    Sink(#[from] OutputError),

    #[error("Invalid metric prefix: {0}")]
    InvalidPrefix(#[from] regex::Error),
}
