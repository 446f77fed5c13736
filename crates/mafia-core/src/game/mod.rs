//! Day/night state machine, vote and night resolution, win evaluation and the
//! narrative log.

pub mod narrative;
pub mod night;
pub mod snapshot;
pub mod state;
pub mod tally;
pub mod win;

pub use narrative::Narrative;
pub use night::{NightActionSet, NightOutcome, resolve_night};
pub use snapshot::GameSnapshot;
pub use state::{GameState, OrderSalt, PhaseError, PhaseState};
pub use tally::{Ballot, Vote, VoteTally, tally};
pub use win::WinCheck;
