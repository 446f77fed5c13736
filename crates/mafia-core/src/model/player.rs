use super::role::Role;
use crate::belief::BeliefStore;
use core::fmt;

#[derive(Debug, Clone)]
pub struct Player {
    name: String,
    role: Role,
    alive: bool,
    beliefs: BeliefStore,
}

impl Player {
    pub fn new(name: impl Into<String>, role: Role, beliefs: BeliefStore) -> Self {
        Self {
            name: name.into(),
            role,
            alive: true,
            beliefs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn role(&self) -> Role {
        self.role
    }

    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn beliefs(&self) -> &BeliefStore {
        &self.beliefs
    }

    pub fn beliefs_mut(&mut self) -> &mut BeliefStore {
        &mut self.beliefs
    }

    /// Kills the player. Returns `false` if they were already dead; there is no
    /// way back to alive.
    pub fn eliminate(&mut self) -> bool {
        let was_alive = self.alive;
        self.alive = false;
        was_alive
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)?;
        if !self.alive {
            f.write_str(" [dead]")?;
        }
        Ok(())
    }
}
