//! Types for JSON-RPC communication with a CometBFT node.
//!
//! CometBFT encodes most integers as JSON strings, and field presence varies
//! between versions, so numeric fields are kept as `serde_json::Value` and
//! read through [`value_as_u64`].

use serde::Deserialize;

/// JSON-RPC 2.0 response structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: serde_json::Value,
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Read an integer that may be a JSON number or a decimal string
pub fn value_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// /status

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResult {
    pub sync_info: SyncInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
    pub latest_block_height: serde_json::Value,
    #[serde(default)]
    pub latest_block_time: String,
}

/// Latest committed height as reported by `/status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStatus {
    pub height: u64,
    pub time: String,
}

// ---------------------------------------------------------------------------
// /consensus_state

/// Consensus state snapshot.
///
/// Some node versions nest the round-step string under `round_state`,
/// others expose it at the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsensusStateResult {
    #[serde(default)]
    pub round_state: Option<RoundState>,
    #[serde(default, rename = "height/round/step")]
    pub height_round_step: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundState {
    #[serde(default, rename = "height/round/step")]
    pub height_round_step: Option<String>,
}

impl ConsensusStateResult {
    /// The raw `"H/R/S"` string, if the snapshot carries one
    pub fn round_step(&self) -> Option<&str> {
        self.round_state
            .as_ref()
            .and_then(|rs| rs.height_round_step.as_deref())
            .or(self.height_round_step.as_deref())
    }
}

// ---------------------------------------------------------------------------
// /block

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockResult {
    #[serde(default)]
    pub block: Block,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub header: BlockHeader,
    #[serde(default)]
    pub data: BlockData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockHeader {
    #[serde(default)]
    pub height: serde_json::Value,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub proposer_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockData {
    /// Base64 transaction payloads; `null` on empty blocks for some versions
    #[serde(default)]
    pub txs: Option<Vec<String>>,
}

impl BlockResult {
    pub fn tx_count(&self) -> u64 {
        self.block.data.txs.as_ref().map_or(0, |txs| txs.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// /block_results

/// Block results payload.
///
/// `txs_results` stays untyped so that one malformed entry cannot fail the
/// whole block; entries are read individually through [`TxResult::from_value`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockResultsResult {
    #[serde(default)]
    pub gas_used: Option<serde_json::Value>,
    #[serde(default)]
    pub gas_wanted: Option<serde_json::Value>,
    #[serde(default)]
    pub txs_results: Option<Vec<serde_json::Value>>,
}

/// One `txs_results` entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxResult {
    pub gas_used: u64,
    pub gas_wanted: u64,
    pub events: Vec<TxEvent>,
}

impl TxResult {
    /// Read gas and events independently of each other.
    ///
    /// Gas that is missing or not an integer reads as 0. Events and
    /// attributes that are not objects are skipped one by one, so a bad
    /// event never hides the transaction's gas.
    pub fn from_value(raw: &serde_json::Value) -> Self {
        let gas = |key: &str| raw.get(key).and_then(value_as_u64).unwrap_or(0);

        Self {
            gas_used: gas("gas_used"),
            gas_wanted: gas("gas_wanted"),
            events: raw
                .get("events")
                .and_then(serde_json::Value::as_array)
                .map(|events| events.iter().filter_map(TxEvent::from_value).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxEvent {
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl TxEvent {
    pub fn from_value(raw: &serde_json::Value) -> Option<Self> {
        raw.as_object()?;
        Some(Self {
            kind: raw
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            attributes: raw
                .get("attributes")
                .and_then(serde_json::Value::as_array)
                .map(|attrs| attrs.iter().filter_map(EventAttribute::from_value).collect())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventAttribute {
    pub key: Option<String>,
    pub value: Option<String>,
}

impl EventAttribute {
    /// Non-string values (numbers, booleans) keep their JSON text
    pub fn from_value(raw: &serde_json::Value) -> Option<Self> {
        raw.as_object()?;
        let value = match raw.get("value") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        Some(Self {
            key: raw
                .get("key")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_u64() {
        assert_eq!(value_as_u64(&json!("350")), Some(350));
        assert_eq!(value_as_u64(&json!(42)), Some(42));
        assert_eq!(value_as_u64(&json!("abc")), None);
        assert_eq!(value_as_u64(&json!(-1)), None);
        assert_eq!(value_as_u64(&json!(null)), None);
    }

    #[test]
    fn test_round_step_nested_and_flat() {
        let nested: ConsensusStateResult =
            serde_json::from_value(json!({"round_state": {"height/round/step": "10/0/2"}}))
                .unwrap();
        assert_eq!(nested.round_step(), Some("10/0/2"));

        let flat: ConsensusStateResult =
            serde_json::from_value(json!({"height/round/step": "11/1/3"})).unwrap();
        assert_eq!(flat.round_step(), Some("11/1/3"));

        let empty: ConsensusStateResult = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.round_step(), None);
    }

    #[test]
    fn test_block_with_null_txs() {
        let block: BlockResult = serde_json::from_value(json!({
            "block": {
                "header": {"height": "5", "time": "2024-01-01T00:00:00Z", "proposer_address": "AB"},
                "data": {"txs": null}
            }
        }))
        .unwrap();

        assert_eq!(block.tx_count(), 0);
        assert_eq!(value_as_u64(&block.block.header.height), Some(5));
    }

    #[test]
    fn test_envelope_without_result() {
        let response: JsonRpcResponse<StatusResult> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": -1,
            "error": {"code": -32603, "message": "internal"}
        }))
        .unwrap();

        assert!(response.result.is_none());
        assert_eq!(response.error.map(|e| e.code), Some(-32603));
    }

    #[test]
    fn test_tx_result_null_events_keep_gas() {
        let tx = TxResult::from_value(&json!({"gas_used": "100", "gas_wanted": 7, "events": null}));

        assert_eq!(tx.gas_used, 100);
        assert_eq!(tx.gas_wanted, 7);
        assert!(tx.events.is_empty());
    }

    #[test]
    fn test_event_attribute_non_string_value() {
        let event = TxEvent::from_value(&json!({
            "type": "message",
            "attributes": [
                {"key": "n", "value": 5},
                {"key": "flag", "value": true},
                {"key": "empty", "value": null},
                "junk"
            ]
        }))
        .unwrap();

        assert_eq!(event.kind, "message");
        let values: Vec<Option<&str>> = event.attributes.iter().map(|a| a.value.as_deref()).collect();
        assert_eq!(values, vec![Some("5"), Some("true"), None]);
        assert!(TxEvent::from_value(&json!("not an event")).is_none());
    }
}
