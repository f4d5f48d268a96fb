//! Block Timing
//!
//! Passive per-block timing collector for CometBFT-style nodes.
//! Correlates consensus phase durations, per-module begin/end-block
//! execution time and block contents, and writes one JSON record per
//! committed height.
//!
//! This crate provides the core implementation for the
//! `block-timing` CLI tool.
//!
//! ## Getting Started
//!
//! ```bash
//! block-timing collect --rpc http://localhost:26657 --duration 600
//! block-timing analyze --file block_timing/block_timing_20240101_120000.jsonl
//! ```

pub mod aggregator;
pub mod collector;
pub mod commands;
pub mod output;
pub mod parser;
pub mod rpc;
pub mod tracker;
pub mod utils;
