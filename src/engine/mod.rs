//! Core quantitative engine.
//!
//! - `consensus`: weighted aggregation of quotes and confidence rating
//! - `trend`: momentum and support/resistance over a price series

pub mod consensus;
pub mod trend;
