use super::{DecisionContext, DecisionProvider};
use crate::action::{Action, DecisionError, Phase};
use std::collections::{BTreeMap, VecDeque};

/// Replays canned raw replies, one queue per sub-phase.
///
/// Replies go through the same parser as any other provider, so a script can
/// exercise malformed or out-of-turn answers.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    queues: BTreeMap<&'static str, VecDeque<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, phase: Phase, raw: impl Into<String>) {
        self.queues
            .entry(phase.as_str())
            .or_default()
            .push_back(raw.into());
    }

    pub fn with(mut self, phase: Phase, raw: impl Into<String>) -> Self {
        self.push(phase, raw);
        self
    }

    pub fn with_action(self, phase: Phase, action: &Action) -> Self {
        self.with(phase, action.to_json().to_string())
    }

    pub fn remaining(&self, phase: Phase) -> usize {
        self.queues.get(phase.as_str()).map_or(0, VecDeque::len)
    }
}

impl DecisionProvider for ScriptedProvider {
    fn decide(&mut self, ctx: &DecisionContext) -> Result<Action, DecisionError> {
        let raw = self
            .queues
            .get_mut(ctx.phase.as_str())
            .and_then(VecDeque::pop_front)
            .ok_or(DecisionError::Exhausted { phase: ctx.phase })?;
        Action::parse(ctx.phase, ctx.role, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia_core::belief::BeliefStore;
    use mafia_core::model::role::Role;

    #[test]
    fn replays_per_phase_then_runs_dry() {
        let alive = vec!["Alice".to_string(), "Bob".to_string()];
        let beliefs = BeliefStore::new("Bob", ["Alice", "Bob"]);
        let mut script = ScriptedProvider::new()
            .with(Phase::DayVote, r#"{"target":"Alice"}"#)
            .with_action(Phase::Night, &Action::DoctorSave("Bob".into()));
        let mut ctx = DecisionContext {
            phase: Phase::DayVote,
            player: "Bob",
            role: Role::Doctor,
            alive: &alive,
            beliefs: &beliefs,
            messages: &[],
            day: 1,
            night: 0,
        };

        assert_eq!(script.decide(&ctx), Ok(Action::Vote("Alice".into())));
        assert_eq!(
            script.decide(&ctx),
            Err(DecisionError::Exhausted {
                phase: Phase::DayVote
            })
        );

        ctx.phase = Phase::Night;
        assert_eq!(script.remaining(Phase::Night), 1);
        assert_eq!(script.decide(&ctx), Ok(Action::DoctorSave("Bob".into())));
    }
}
