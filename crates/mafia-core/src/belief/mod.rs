//! Private per-player knowledge about the rest of the roster.
//!
//! This module is composed of:
//! - `store`: the `BeliefStore` owned by each player and its `BeliefRecord` entries.
//! - `summary`: coarse counters derived from a store for logging.

mod store;
pub mod summary;

pub use store::{BeliefRecord, BeliefStore};
pub use summary::BeliefSummary;
