#![deny(warnings)]
//! Game model for the Mafia simulator: roles and roster, per-player beliefs,
//! and the day/night rules.

pub mod belief;
pub mod game;
pub mod model;
