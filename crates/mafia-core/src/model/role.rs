use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Role {
    Mafia = 0,
    Doctor = 1,
    Detective = 2,
    Townsperson = 3,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Mafia,
        Role::Doctor,
        Role::Detective,
        Role::Townsperson,
    ];

    pub const fn is_mafia(self) -> bool {
        matches!(self, Role::Mafia)
    }

    pub const fn team(self) -> Team {
        match self {
            Role::Mafia => Team::Mafia,
            Role::Doctor | Role::Detective | Role::Townsperson => Team::Town,
        }
    }

    /// Roles that submit something other than `no_action` at night.
    pub const fn acts_at_night(self) -> bool {
        !matches!(self, Role::Townsperson)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Mafia => "mafia",
            Role::Doctor => "doctor",
            Role::Detective => "detective",
            Role::Townsperson => "townsperson",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mafia" => Ok(Role::Mafia),
            "doctor" => Ok(Role::Doctor),
            "detective" => Ok(Role::Detective),
            "townsperson" | "town" | "villager" => Ok(Role::Townsperson),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Town,
    Mafia,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Team::Town => "Town",
            Team::Mafia => "Mafia",
        };
        f.write_str(label)
    }
}

/// Result of a detective check. Only distinguishes Mafia from everyone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Mafia,
    NotMafia,
}

impl Alignment {
    pub const fn of(role: Role) -> Self {
        if role.is_mafia() {
            Alignment::Mafia
        } else {
            Alignment::NotMafia
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Alignment::Mafia => "mafia",
            Alignment::NotMafia => "not mafia",
        };
        f.write_str(label)
    }
}
