use super::BeliefStore;
use crate::model::role::Role;
use serde::Serialize;

/// Coarse counters over a [`BeliefStore`], cheap enough to attach to log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeliefSummary {
    pub believed_alive: usize,
    pub mafia_suspects: usize,
    pub confirmed_mafia: usize,
    pub cleared: usize,
}

impl BeliefSummary {
    pub fn from_store(store: &BeliefStore) -> Self {
        let mut summary = Self {
            believed_alive: 0,
            mafia_suspects: 0,
            confirmed_mafia: 0,
            cleared: 0,
        };
        for (name, record) in store.records() {
            if record.believed_alive {
                summary.believed_alive += 1;
            }
            if name == store.owner() || !record.believed_alive {
                continue;
            }
            if record.suspects(Role::Mafia) {
                summary.mafia_suspects += 1;
            }
            match record.confirmed_role {
                Some(Role::Mafia) => summary.confirmed_mafia += 1,
                _ if record.alignment.is_some() => summary.cleared += 1,
                _ => {}
            }
        }
        summary
    }
}
