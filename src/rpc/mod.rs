//! RPC client for polling a CometBFT node.

pub mod client;
pub mod types;

// Re-export main types
pub use client::RpcClient;
pub use types::{BlockResult, BlockResultsResult, ChainStatus, ConsensusStateResult};
