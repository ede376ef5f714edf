//! CARD-ORACLE — multi-source consensus pricing for trading cards
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod providers;
pub mod engine;
pub mod strategy;
pub mod cache;
pub mod storage;
pub mod format;
pub mod oracle;
pub mod api;
