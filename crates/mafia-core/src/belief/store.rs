use crate::model::role::{Alignment, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What one player believes about one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeliefRecord {
    pub believed_alive: bool,
    pub confirmed_role: Option<Role>,
    pub alignment: Option<Alignment>,
    pub suspected_roles: BTreeSet<Role>,
}

impl BeliefRecord {
    pub fn unknown() -> Self {
        Self {
            believed_alive: true,
            confirmed_role: None,
            alignment: None,
            suspected_roles: BTreeSet::new(),
        }
    }

    pub fn suspects(&self, role: Role) -> bool {
        self.suspected_roles.contains(&role)
    }
}

impl Default for BeliefRecord {
    fn default() -> Self {
        Self::unknown()
    }
}

/// One player's view of the roster, keyed by subject name.
///
/// The set of subjects is fixed at construction. Every mutator ignores names
/// outside that set and reports `false`, so a store never grows or shrinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeliefStore {
    owner: String,
    records: BTreeMap<String, BeliefRecord>,
}

impl BeliefStore {
    pub fn new<I, S>(owner: impl Into<String>, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = subjects
            .into_iter()
            .map(|name| (name.into(), BeliefRecord::unknown()))
            .collect();
        Self {
            owner: owner.into(),
            records,
        }
    }

    /// Builds the starting knowledge for `owner` given the full role assignment.
    ///
    /// Town players suspect every other player of being Mafia. Mafia players
    /// carry no suspicion and know every Mafia member, themselves included.
    pub fn initial(owner: &str, owner_role: Role, assignment: &[(String, Role)]) -> Self {
        let mut store = Self::new(owner, assignment.iter().map(|(name, _)| name.clone()));
        for (name, role) in assignment {
            let Some(record) = store.records.get_mut(name) else {
                continue;
            };
            if owner_role.is_mafia() {
                if role.is_mafia() {
                    record.confirmed_role = Some(Role::Mafia);
                    record.alignment = Some(Alignment::Mafia);
                }
            } else if name != owner {
                record.suspected_roles.insert(Role::Mafia);
            }
        }
        store
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, subject: &str) -> Option<&BeliefRecord> {
        self.records.get(subject)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &BeliefRecord)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn believes_alive(&self, subject: &str) -> bool {
        self.records
            .get(subject)
            .is_some_and(|record| record.believed_alive)
    }

    /// Marks `subject` as dead. Returns `true` only when the record changed.
    pub fn mark_dead(&mut self, subject: &str) -> bool {
        match self.records.get_mut(subject) {
            Some(record) if record.believed_alive => {
                record.believed_alive = false;
                true
            }
            _ => false,
        }
    }

    pub fn confirm_role(&mut self, subject: &str, role: Role) -> bool {
        let Some(record) = self.records.get_mut(subject) else {
            return false;
        };
        record.confirmed_role = Some(role);
        record.alignment = Some(Alignment::of(role));
        record.suspected_roles.clear();
        true
    }

    /// Records a detective finding. A Mafia finding also confirms the role;
    /// either way the subject's suspicions are cleared.
    pub fn confirm_alignment(&mut self, subject: &str, alignment: Alignment) -> bool {
        let Some(record) = self.records.get_mut(subject) else {
            return false;
        };
        record.alignment = Some(alignment);
        if alignment == Alignment::Mafia {
            record.confirmed_role = Some(Role::Mafia);
        }
        record.suspected_roles.clear();
        true
    }

    pub fn suspect(&mut self, subject: &str, role: Role) -> bool {
        self.records
            .get_mut(subject)
            .is_some_and(|record| record.suspected_roles.insert(role))
    }

    pub fn clear_suspicion(&mut self, subject: &str, role: Role) -> bool {
        self.records
            .get_mut(subject)
            .is_some_and(|record| record.suspected_roles.remove(&role))
    }

    pub fn clear_suspicions(&mut self, subject: &str) -> bool {
        match self.records.get_mut(subject) {
            Some(record) if !record.suspected_roles.is_empty() => {
                record.suspected_roles.clear();
                true
            }
            _ => false,
        }
    }

    /// Names this player still believes alive, in name order.
    pub fn believed_alive(&self) -> Vec<&str> {
        self.records()
            .filter(|(_, record)| record.believed_alive)
            .map(|(name, _)| name)
            .collect()
    }

    /// Living subjects (other than the owner) suspected of `role`.
    pub fn suspects(&self, role: Role) -> Vec<&str> {
        self.records()
            .filter(|(name, record)| {
                *name != self.owner && record.believed_alive && record.suspects(role)
            })
            .map(|(name, _)| name)
            .collect()
    }

    /// Living subjects (other than the owner) confirmed to hold `role`.
    pub fn confirmed(&self, role: Role) -> Vec<&str> {
        self.records()
            .filter(|(name, record)| {
                *name != self.owner && record.believed_alive && record.confirmed_role == Some(role)
            })
            .map(|(name, _)| name)
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
