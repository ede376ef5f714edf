//! Decision rules layered on top of the engine.
//!
//! - `alerts`: independent alert rules, including user thresholds
//! - `recommendation`: ordered, first-match-wins action policy

pub mod alerts;
pub mod recommendation;
