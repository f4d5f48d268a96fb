//! HTTP client for the node's CometBFT RPC and Prometheus endpoints.

use super::types::{
    value_as_u64, BlockResult, BlockResultsResult, ChainStatus, ConsensusStateResult,
    JsonRpcResponse, StatusResult,
};
use crate::utils::error::RpcError;
use log::debug;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// RPC client for polling a running node
pub struct RpcClient {
    client: Client,
    rpc_url: String,
    metrics_url: String,
    request_timeout: Duration,
    consensus_timeout: Duration,
}

impl RpcClient {
    /// Create a new RPC client
    ///
    /// `request_timeout` bounds every fetch except `/consensus_state`, which
    /// uses the shorter `consensus_timeout` so the fast loop keeps its cadence.
    pub fn new(
        rpc_url: impl Into<String>,
        metrics_url: impl Into<String>,
        request_timeout: Duration,
        consensus_timeout: Duration,
    ) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(RpcError::RequestFailed)?;

        Ok(Self {
            client,
            rpc_url: normalize_base_url(&rpc_url.into()),
            metrics_url: metrics_url.into(),
            request_timeout,
            consensus_timeout,
        })
    }

    /// Latest committed height and its block time
    pub fn status(&self) -> Result<ChainStatus, RpcError> {
        let status: StatusResult = self.get_result("status", self.request_timeout)?;
        let height = value_as_u64(&status.sync_info.latest_block_height).ok_or_else(|| {
            RpcError::InvalidResponse(format!(
                "latest_block_height is not an integer: {}",
                status.sync_info.latest_block_height
            ))
        })?;

        Ok(ChainStatus {
            height,
            time: status.sync_info.latest_block_time,
        })
    }

    pub fn consensus_state(&self) -> Result<ConsensusStateResult, RpcError> {
        self.get_result("consensus_state", self.consensus_timeout)
    }

    pub fn block(&self, height: u64) -> Result<BlockResult, RpcError> {
        self.get_result(&format!("block?height={}", height), self.request_timeout)
    }

    pub fn block_results(&self, height: u64) -> Result<BlockResultsResult, RpcError> {
        self.get_result(&format!("block_results?height={}", height), self.request_timeout)
    }

    /// Raw Prometheus text exposition
    pub fn metrics_text(&self) -> Result<String, RpcError> {
        debug!("GET {}", self.metrics_url);

        let response = self
            .client
            .get(&self.metrics_url)
            .timeout(self.request_timeout)
            .send()
            .map_err(RpcError::RequestFailed)?;

        check_status(&response, &self.metrics_url)?;

        response.text().map_err(RpcError::RequestFailed)
    }

    /// GET `{rpc}/{path}` and unwrap the JSON-RPC envelope
    fn get_result<T: DeserializeOwned>(&self, path: &str, timeout: Duration) -> Result<T, RpcError> {
        let url = format!("{}/{}", self.rpc_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .map_err(RpcError::RequestFailed)?;

        check_status(&response, &url)?;

        let rpc_response: JsonRpcResponse<T> =
            response.json().map_err(RpcError::RequestFailed)?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::InvalidResponse(format!(
                "{}: {}",
                error.code, error.message
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("Missing result field from {}", url)))
    }
}

fn check_status(response: &reqwest::blocking::Response, url: &str) -> Result<(), RpcError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(RpcError::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        })
    }
}

/// Strip trailing slashes so paths can be joined with a single `/`
pub fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
