//! Transaction, gas and event analysis for one committed block.

use crate::rpc::types::{value_as_u64, BlockResult, BlockResultsResult, TxEvent, TxResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MESSAGE_EVENT: &str = "message";
const ACTION_KEY: &str = "action";
const TIP_EVENT: &str = "tip";

/// Transaction summary for one block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxAnalysis {
    pub count: u64,
    pub gas_used: u64,
    pub gas_wanted: u64,
    /// `message.action` value → occurrences
    #[serde(rename = "message_types")]
    pub message_type_histogram: BTreeMap<String, u64>,
    pub tips: Vec<Tip>,
}

/// A `tip` event; attributes the event did not carry are left out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipper: Option<String>,
}

impl Tip {
    fn is_empty(&self) -> bool {
        self.query_id.is_none() && self.amount.is_none() && self.tipper.is_none()
    }
}

/// Analyze a block and, when available, its results
///
/// Never fails: a result entry that does not decode contributes nothing to
/// gas or events, and the rest of the block is still analyzed.
pub fn inspect_block(block: &BlockResult, results: Option<&BlockResultsResult>) -> TxAnalysis {
    let mut analysis = TxAnalysis {
        count: block.tx_count(),
        ..Default::default()
    };

    let Some(results) = results else {
        return analysis;
    };

    let tx_results = decode_tx_results(results);
    let (gas_used, gas_wanted) = resolve_gas(results, &tx_results);
    analysis.gas_used = gas_used;
    analysis.gas_wanted = gas_wanted;

    for event in tx_results.iter().flat_map(|tx| tx.events.iter()) {
        match event.kind.as_str() {
            MESSAGE_EVENT => {
                if let Some(action) = attribute(event, ACTION_KEY) {
                    *analysis
                        .message_type_histogram
                        .entry(action.to_string())
                        .or_insert(0) += 1;
                }
            }
            TIP_EVENT => {
                let tip = Tip {
                    query_id: attribute(event, "query_id").map(str::to_string),
                    amount: attribute(event, "amount").map(str::to_string),
                    tipper: attribute(event, "tipper").map(str::to_string),
                };
                if !tip.is_empty() {
                    analysis.tips.push(tip);
                }
            }
            _ => {}
        }
    }

    analysis
}

fn decode_tx_results(results: &BlockResultsResult) -> Vec<TxResult> {
    results
        .txs_results
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, raw)| {
            if !raw.is_object() {
                debug!("Treating tx result {} as empty: not an object", i);
            }
            TxResult::from_value(raw)
        })
        .collect()
}

/// Top-level totals when present and non-zero, else the per-tx sums
///
/// Per-tx values that are missing or not integers already read as 0.
pub fn resolve_gas(results: &BlockResultsResult, tx_results: &[TxResult]) -> (u64, u64) {
    let top_used = lenient(&results.gas_used);
    let top_wanted = lenient(&results.gas_wanted);

    if top_used > 0 {
        return (top_used, top_wanted);
    }

    let mut summed_used = 0u64;
    let mut summed_wanted = 0u64;
    for tx in tx_results {
        summed_used = summed_used.saturating_add(tx.gas_used);
        summed_wanted = summed_wanted.saturating_add(tx.gas_wanted);
    }

    if summed_used > 0 {
        (summed_used, summed_wanted)
    } else {
        (top_used, top_wanted)
    }
}

fn lenient(value: &Option<serde_json::Value>) -> u64 {
    value.as_ref().and_then(value_as_u64).unwrap_or(0)
}

/// First value for `key`, in attribute order
fn attribute<'a>(event: &'a TxEvent, key: &str) -> Option<&'a str> {
    event
        .attributes
        .iter()
        .find(|attr| attr.key.as_deref() == Some(key))
        .map(|attr| attr.value.as_deref().unwrap_or(""))
}
