//! pedlar-agent: runs the pedlar rebalancing loop as a trading agent.
//!
//! Reads a TOML config, builds the quote feeds for the configured universe,
//! picks a built-in allocation policy and drives the loop live or over a
//! recorded price CSV, with an optional bookkeeping server and a JSONL audit
//! trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod policy;
pub mod runner;
pub mod server;
pub mod universe;
