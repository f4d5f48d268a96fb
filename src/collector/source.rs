//! Seams between the collector and the outside world.

use crate::output::jsonl::JsonlWriter;
use crate::output::schema::BlockTimingRecord;
use crate::rpc::client::RpcClient;
use crate::rpc::types::{BlockResult, BlockResultsResult, ChainStatus, ConsensusStateResult};
use crate::utils::error::{OutputError, RpcError};

/// Everything the collector reads from the node.
///
/// Shared by both polling loops, hence `Sync`.
pub trait NodeSource: Sync {
    fn status(&self) -> Result<ChainStatus, RpcError>;
    fn consensus_state(&self) -> Result<ConsensusStateResult, RpcError>;
    fn block(&self, height: u64) -> Result<BlockResult, RpcError>;
    fn block_results(&self, height: u64) -> Result<BlockResultsResult, RpcError>;
    fn metrics_text(&self) -> Result<String, RpcError>;
}

impl NodeSource for RpcClient {
    fn status(&self) -> Result<ChainStatus, RpcError> {
        RpcClient::status(self)
    }

    fn consensus_state(&self) -> Result<ConsensusStateResult, RpcError> {
        RpcClient::consensus_state(self)
    }

    fn block(&self, height: u64) -> Result<BlockResult, RpcError> {
        RpcClient::block(self, height)
    }

    fn block_results(&self, height: u64) -> Result<BlockResultsResult, RpcError> {
        RpcClient::block_results(self, height)
    }

    fn metrics_text(&self) -> Result<String, RpcError> {
        RpcClient::metrics_text(self)
    }
}

/// Destination for finished records, called in height order
pub trait RecordSink {
    fn emit(&mut self, record: &BlockTimingRecord) -> Result<(), OutputError>;
}

impl RecordSink for JsonlWriter {
    fn emit(&mut self, record: &BlockTimingRecord) -> Result<(), OutputError> {
        self.append(record)
    }
}

impl RecordSink for Vec<BlockTimingRecord> {
    fn emit(&mut self, record: &BlockTimingRecord) -> Result<(), OutputError> {
        self.push(record.clone());
        Ok(())
    }
}
