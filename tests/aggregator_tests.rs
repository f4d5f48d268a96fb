use block_timing::aggregator::statistics::{calculate_run_statistics, Distribution};
use block_timing::aggregator::{inspect_block, resolve_gas};
use block_timing::output::schema::BlockInputs;
use block_timing::output::BlockTimingRecord;
use block_timing::rpc::types::{BlockResult, BlockResultsResult, TxResult};
use serde_json::json;

fn block(txs: usize) -> BlockResult {
    serde_json::from_value(json!({
        "block": {
            "header": {"height": "9", "time": "2024-01-01T00:00:00Z", "proposer_address": "P"},
            "data": {"txs": vec!["dHg="; txs]}
        }
    }))
    .unwrap()
}

#[test]
fn test_gas_fallback_to_per_tx_sum() {
    let results: BlockResultsResult = serde_json::from_value(json!({
        "gas_used": "0",
        "gas_wanted": "0",
        "txs_results": [{"gas_used": "100"}, {"gas_used": "250"}, {"gas_used": "0"}]
    }))
    .unwrap();

    let analysis = inspect_block(&block(3), Some(&results));

    assert_eq!(analysis.count, 3);
    assert_eq!(analysis.gas_used, 350);
}

#[test]
fn test_resolve_gas_keeps_top_level_when_per_tx_empty() {
    let results: BlockResultsResult =
        serde_json::from_value(json!({"gas_used": "0", "gas_wanted": "500"})).unwrap();
    let txs = vec![TxResult::default()];

    assert_eq!(resolve_gas(&results, &txs), (0, 500));
}

#[test]
fn test_missing_results_keep_tx_count() {
    let analysis = inspect_block(&block(4), None);

    assert_eq!(analysis.count, 4);
    assert_eq!(analysis.gas_used, 0);
    assert!(analysis.tips.is_empty());
}

#[test]
fn test_null_txs_is_empty_block() {
    let empty: BlockResult = serde_json::from_value(json!({
        "block": {"header": {"height": "9", "time": ""}, "data": {"txs": null}}
    }))
    .unwrap();

    assert_eq!(inspect_block(&empty, None).count, 0);
}

#[test]
fn test_distribution_odd_median() {
    let dist = Distribution::from_values(&[3.0, 1.0, 2.0]).unwrap();

    assert_eq!(dist.median, 2.0);
    assert_eq!(dist.min, 1.0);
    assert_eq!(dist.max, 3.0);
}

#[test]
fn test_run_statistics_empty() {
    let stats = calculate_run_statistics(&[], 2.0);

    assert_eq!(stats.total_blocks, 0);
    assert!(stats.block_time.is_none());
    assert!(stats.slow_blocks.is_empty());
    assert_eq!(stats.tips.percent_increase, None);
}

#[test]
fn test_uniform_run_has_no_slow_blocks() {
    let records: Vec<BlockTimingRecord> = (1..=5)
        .map(|height| {
            BlockTimingRecord::assemble(BlockInputs {
                height,
                block_time_seconds: 2.0,
                ..Default::default()
            })
        })
        .collect();

    let stats = calculate_run_statistics(&records, 0.0);

    assert_eq!(stats.block_time.unwrap().std_dev, 0.0);
    assert!(stats.slow_blocks.is_empty());
}
