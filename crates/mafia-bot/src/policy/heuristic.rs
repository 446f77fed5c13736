use super::{DecisionContext, DecisionProvider};
use crate::action::{Action, DecisionError, Phase};
use mafia_core::model::role::{Alignment, Role};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicOptions {
    pub seed: u64,
    /// Probability of speaking up during the day when there is nothing certain to say.
    pub chattiness: f64,
}

impl Default for HeuristicOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            chattiness: 0.75,
        }
    }
}

/// Belief-driven bot. Acts on confirmed knowledge first, then on suspicion,
/// then at random among plausible targets.
pub struct HeuristicProvider {
    options: HeuristicOptions,
    rng: StdRng,
}

impl HeuristicProvider {
    pub fn new(options: HeuristicOptions) -> Self {
        Self {
            rng: StdRng::seed_from_u64(options.seed),
            options,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(HeuristicOptions {
            seed,
            ..HeuristicOptions::default()
        })
    }

    fn day_message(&mut self, ctx: &DecisionContext) -> (Action, &'static str) {
        if ctx.role == Role::Detective {
            if let Some(found) = ctx.beliefs.confirmed(Role::Mafia).first() {
                return (
                    Action::PostMessage(format!("I checked {found}. They are Mafia.")),
                    "reveal_check",
                );
            }
        }
        if !self.rng.gen_bool(self.options.chattiness.clamp(0.0, 1.0)) {
            return (Action::NoMessage, "quiet");
        }
        let pool = accusation_pool(ctx);
        match pool.choose(&mut self.rng) {
            Some(name) => (
                Action::PostMessage(format!("I have my doubts about {name}.")),
                "accuse",
            ),
            None => (Action::NoMessage, "nobody_to_accuse"),
        }
    }

    fn day_vote(&mut self, ctx: &DecisionContext) -> (Action, &'static str) {
        if !ctx.role.is_mafia() {
            if let Some(found) = ctx
                .beliefs
                .confirmed(Role::Mafia)
                .into_iter()
                .find(|name| ctx.alive.iter().any(|alive| alive == name))
            {
                return (Action::Vote(found.to_string()), "confirmed_mafia");
            }
        }

        let pool = accusation_pool(ctx);
        if pool.is_empty() {
            return (Action::NoVote, "nobody_to_vote");
        }

        // Follow the loudest accusation among plausible targets.
        let mut mentions: BTreeMap<&str, usize> = BTreeMap::new();
        for line in ctx.messages {
            let Some(text) = line.message.as_deref() else {
                continue;
            };
            for name in &pool {
                if line.speaker != *name && text.contains(name.as_str()) {
                    *mentions.entry(name.as_str()).or_default() += 1;
                }
            }
        }
        let top = mentions.values().copied().max().unwrap_or(0);
        if top > 0 {
            let leaders: Vec<&str> = mentions
                .iter()
                .filter(|(_, count)| **count == top)
                .map(|(name, _)| *name)
                .collect();
            if let Some(name) = leaders.choose(&mut self.rng) {
                return (Action::Vote((*name).to_string()), "bandwagon");
            }
        }

        match pool.choose(&mut self.rng) {
            Some(name) => (Action::Vote(name.clone()), "random_suspect"),
            None => (Action::NoVote, "nobody_to_vote"),
        }
    }

    fn night(&mut self, ctx: &DecisionContext) -> (Action, &'static str) {
        match ctx.role {
            Role::Mafia => {
                let pool = accusation_pool(ctx);
                match pool.choose(&mut self.rng) {
                    Some(name) => (Action::MafiaVote(name.clone()), "random_town"),
                    None => (Action::NoAction, "no_target"),
                }
            }
            Role::Doctor => {
                let mut pool: Vec<&str> = ctx.alive.iter().map(String::as_str).collect();
                pool.sort_unstable();
                match pool.choose(&mut self.rng) {
                    Some(name) => (Action::DoctorSave((*name).to_string()), "random_save"),
                    None => (Action::NoAction, "no_target"),
                }
            }
            Role::Detective => {
                let mut pool: Vec<&str> = ctx
                    .others_alive()
                    .filter(|name| {
                        ctx.beliefs
                            .record(name)
                            .is_none_or(|record| record.alignment.is_none())
                    })
                    .collect();
                pool.sort_unstable();
                match pool.choose(&mut self.rng) {
                    Some(name) => (Action::CheckAlignment((*name).to_string()), "unchecked"),
                    None => (Action::NoAction, "all_checked"),
                }
            }
            Role::Townsperson => (Action::NoAction, "no_night_role"),
        }
    }
}

impl DecisionProvider for HeuristicProvider {
    fn decide(&mut self, ctx: &DecisionContext) -> Result<Action, DecisionError> {
        let (action, reason) = match ctx.phase {
            Phase::DayMessage => self.day_message(ctx),
            Phase::DayVote => self.day_vote(ctx),
            Phase::Night => self.night(ctx),
        };
        log_decision(ctx, &action, reason);
        Ok(action)
    }
}

/// Living players this player would act against, in name order.
///
/// Mafia skip their known partners. Town players skip anyone the detective
/// result cleared and prefer open suspects when they have any.
fn accusation_pool(ctx: &DecisionContext) -> Vec<String> {
    let mut others: Vec<&str> = ctx.others_alive().collect();
    others.sort_unstable();

    if ctx.role.is_mafia() {
        let partners = ctx.beliefs.confirmed(Role::Mafia);
        return others
            .into_iter()
            .filter(|name| !partners.contains(name))
            .map(str::to_string)
            .collect();
    }

    let cleared = |name: &str| {
        ctx.beliefs
            .record(name)
            .is_some_and(|record| record.alignment == Some(Alignment::NotMafia))
    };
    let suspects = ctx.beliefs.suspects(Role::Mafia);
    let preferred: Vec<String> = others
        .iter()
        .copied()
        .filter(|name| suspects.contains(name) && !cleared(*name))
        .map(str::to_string)
        .collect();
    if !preferred.is_empty() {
        return preferred;
    }
    others
        .into_iter()
        .filter(|name| !cleared(*name))
        .map(str::to_string)
        .collect()
}

fn log_decision(ctx: &DecisionContext, action: &Action, reason: &str) {
    if !tracing::enabled!(Level::DEBUG) {
        return;
    }
    event!(
        target: "mafia_bot::heuristic",
        Level::DEBUG,
        player = ctx.player,
        role = %ctx.role,
        phase = %ctx.phase,
        day = ctx.day,
        night = ctx.night,
        alive = ctx.alive.len(),
        chosen = %action.to_json(),
        reason,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ChatLine;
    use mafia_core::belief::BeliefStore;

    fn assignment() -> Vec<(String, Role)> {
        vec![
            ("Alice".to_string(), Role::Mafia),
            ("Bob".to_string(), Role::Doctor),
            ("Carol".to_string(), Role::Detective),
            ("Dana".to_string(), Role::Townsperson),
        ]
    }

    fn alive() -> Vec<String> {
        assignment().into_iter().map(|(name, _)| name).collect()
    }

    fn ctx<'a>(
        phase: Phase,
        player: &'a str,
        role: Role,
        alive: &'a [String],
        beliefs: &'a BeliefStore,
        messages: &'a [ChatLine],
    ) -> DecisionContext<'a> {
        DecisionContext {
            phase,
            player,
            role,
            alive,
            beliefs,
            messages,
            day: 1,
            night: 1,
        }
    }

    #[test]
    fn mafia_never_targets_itself_or_partners() {
        let alive = alive();
        let beliefs = BeliefStore::initial("Alice", Role::Mafia, &assignment());
        for seed in 0..32 {
            let mut bot = HeuristicProvider::seeded(seed);
            let action = bot
                .decide(&ctx(Phase::Night, "Alice", Role::Mafia, &alive, &beliefs, &[]))
                .unwrap();
            match &action {
                Action::MafiaVote(target) => assert_ne!(target, "Alice"),
                other => panic!("expected a mafia vote, got {other:?}"),
            }
        }
    }

    #[test]
    fn detective_votes_confirmed_mafia() {
        let alive = alive();
        let mut beliefs = BeliefStore::initial("Carol", Role::Detective, &assignment());
        beliefs.confirm_alignment("Alice", Alignment::Mafia);
        let mut bot = HeuristicProvider::seeded(1);

        let vote = bot
            .decide(&ctx(Phase::DayVote, "Carol", Role::Detective, &alive, &beliefs, &[]))
            .unwrap();
        assert_eq!(vote, Action::Vote("Alice".into()));

        let speech = bot
            .decide(&ctx(Phase::DayMessage, "Carol", Role::Detective, &alive, &beliefs, &[]))
            .unwrap();
        assert_eq!(speech, Action::PostMessage("I checked Alice. They are Mafia.".into()));
    }

    #[test]
    fn detective_does_not_recheck_cleared_players() {
        let alive = alive();
        let mut beliefs = BeliefStore::initial("Carol", Role::Detective, &assignment());
        beliefs.confirm_alignment("Bob", Alignment::NotMafia);
        beliefs.confirm_alignment("Dana", Alignment::NotMafia);
        let mut bot = HeuristicProvider::seeded(9);
        let action = bot
            .decide(&ctx(Phase::Night, "Carol", Role::Detective, &alive, &beliefs, &[]))
            .unwrap();
        assert_eq!(action, Action::CheckAlignment("Alice".into()));
    }

    #[test]
    fn townsperson_rests_at_night() {
        let alive = alive();
        let beliefs = BeliefStore::initial("Dana", Role::Townsperson, &assignment());
        let mut bot = HeuristicProvider::seeded(4);
        let action = bot
            .decide(&ctx(Phase::Night, "Dana", Role::Townsperson, &alive, &beliefs, &[]))
            .unwrap();
        assert_eq!(action, Action::NoAction);
    }

    #[test]
    fn votes_follow_the_loudest_accusation() {
        let alive = alive();
        let beliefs = BeliefStore::initial("Dana", Role::Townsperson, &assignment());
        let messages = vec![
            ChatLine {
                speaker: "Bob".into(),
                message: Some("Carol is acting strange".into()),
            },
            ChatLine {
                speaker: "Alice".into(),
                message: Some("Agreed, Carol.".into()),
            },
            ChatLine {
                speaker: "Carol".into(),
                message: None,
            },
        ];
        let mut bot = HeuristicProvider::seeded(2);
        let vote = bot
            .decide(&ctx(Phase::DayVote, "Dana", Role::Townsperson, &alive, &beliefs, &messages))
            .unwrap();
        assert_eq!(vote, Action::Vote("Carol".into()));
    }

    #[test]
    fn same_seed_same_decisions() {
        let alive = alive();
        let beliefs = BeliefStore::initial("Bob", Role::Doctor, &assignment());
        let run = |seed| {
            let mut bot = HeuristicProvider::seeded(seed);
            (0..5)
                .map(|_| {
                    bot.decide(&ctx(Phase::Night, "Bob", Role::Doctor, &alive, &beliefs, &[]))
                        .unwrap()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(17), run(17));
    }
}
