//! Mafia game simulation: configuration, agent wiring, the phase controller
//! and multi-game evaluation.

pub mod agents;
pub mod config;
pub mod controller;
pub mod evaluation;
pub mod logging;
