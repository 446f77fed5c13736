use crate::model::role::Team;
use crate::model::roster::Roster;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WinCheck {
    Continue,
    GameOver(Team),
}

impl WinCheck {
    pub const fn winner(self) -> Option<Team> {
        match self {
            WinCheck::Continue => None,
            WinCheck::GameOver(team) => Some(team),
        }
    }

    pub const fn is_over(self) -> bool {
        matches!(self, WinCheck::GameOver(_))
    }
}

/// Town wins once no Mafia remain; Mafia wins once they match or outnumber
/// everyone else.
pub const fn evaluate_counts(alive_mafia: usize, alive_non_mafia: usize) -> WinCheck {
    if alive_mafia == 0 {
        WinCheck::GameOver(Team::Town)
    } else if alive_mafia >= alive_non_mafia {
        WinCheck::GameOver(Team::Mafia)
    } else {
        WinCheck::Continue
    }
}

pub fn evaluate(roster: &Roster) -> WinCheck {
    let (mafia, town) = roster.alive_counts();
    evaluate_counts(mafia, town)
}
