pub mod external;

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use mafia_bot::{Action, ChatLine, DecisionContext, DecisionError, DecisionProvider, Phase, SILENT_MARKER};
use mafia_core::game::night::RejectedKind;
use mafia_core::game::{
    Ballot, GameSnapshot, GameState, Narrative, NightActionSet, OrderSalt, PhaseError, PhaseState,
    Vote, WinCheck, resolve_night, tally,
};
use mafia_core::game::tally::{NO_VOTE, TallyOutcome};
use mafia_core::model::player::Player;
use mafia_core::model::role::{Role, Team};
use serde::Serialize;
use tracing::{Level, event};

use crate::config::DispatchMode;

const BANNER_WIDTH: usize = 40;

/// Where a game stands after one controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Running(PhaseState),
    /// The game ended; `None` means the round limit stopped it first.
    Finished(Option<Team>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Seat {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Elimination {
    pub name: String,
    pub role: Role,
    pub phase: Phase,
    pub round: u32,
}

/// Final record of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameResult {
    pub winner: Option<Team>,
    pub days: u32,
    pub nights: u32,
    pub assignment: Vec<Seat>,
    pub eliminations: Vec<Elimination>,
    /// Decisions replaced by the phase's safe default.
    pub fallbacks: usize,
}

/// Drives one game: asks each player's provider for decisions, resolves every
/// sub-phase on the owning thread and writes the narrative.
pub struct PhaseController {
    state: GameState,
    providers: BTreeMap<String, Box<dyn DecisionProvider>>,
    narrative: Arc<Narrative>,
    dispatch: DispatchMode,
    round_limit: u32,
    game_index: usize,
    messages: Vec<ChatLine>,
    eliminations: Vec<Elimination>,
    fallbacks: usize,
    finished: bool,
}

impl PhaseController {
    pub fn new(
        state: GameState,
        providers: BTreeMap<String, Box<dyn DecisionProvider>>,
        narrative: Arc<Narrative>,
    ) -> Self {
        Self {
            state,
            providers,
            narrative,
            dispatch: DispatchMode::Sequential,
            round_limit: u32::MAX,
            game_index: 0,
            messages: Vec::new(),
            eliminations: Vec::new(),
            fallbacks: 0,
            finished: false,
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Stops the game without a winner once this many days have been played.
    pub fn with_round_limit(mut self, round_limit: u32) -> Self {
        self.round_limit = round_limit.max(1);
        self
    }

    pub fn with_game_index(mut self, game_index: usize) -> Self {
        self.game_index = game_index;
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn narrative(&self) -> &Arc<Narrative> {
        &self.narrative
    }

    /// Messages posted so far during the current day.
    pub fn messages(&self) -> &[ChatLine] {
        &self.messages
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::capture(&self.state)
    }

    pub fn progress(&self) -> Progress {
        if self.finished {
            Progress::Finished(self.state.winner())
        } else {
            Progress::Running(self.state.phase())
        }
    }

    /// Runs exactly one sub-phase.
    pub fn step(&mut self) -> Result<Progress, PhaseError> {
        if self.finished {
            return Ok(self.progress());
        }
        match self.state.phase() {
            PhaseState::DayMessage if self.state.day() >= self.round_limit => self.stop_at_limit(),
            PhaseState::DayMessage => self.run_day_messages()?,
            PhaseState::DayVote => self.run_day_vote()?,
            PhaseState::NightActions => self.run_night()?,
            PhaseState::GameOver(team) => self.finish(Some(team)),
        }
        Ok(self.progress())
    }

    pub fn run(mut self) -> Result<GameResult, PhaseError> {
        while let Progress::Running(_) = self.step()? {}
        Ok(self.result())
    }

    pub fn result(&self) -> GameResult {
        GameResult {
            winner: self.state.winner(),
            days: self.state.day(),
            nights: self.state.night(),
            assignment: self
                .state
                .roster()
                .assignment()
                .into_iter()
                .map(|(name, role)| Seat { name, role })
                .collect(),
            eliminations: self.eliminations.clone(),
            fallbacks: self.fallbacks,
        }
    }

    fn run_day_messages(&mut self) -> Result<(), PhaseError> {
        let day = self.state.begin_day()?;
        let rule = "=".repeat(BANNER_WIDTH);
        self.narrative.announce(format!("\n{rule}\nDAY {day}\n{rule}"));
        event!(
            target: "mafia_sim::controller",
            Level::INFO,
            game = self.game_index,
            day,
            alive = self.state.roster().alive_names().len(),
            "day started"
        );

        self.messages.clear();
        let order = self.state.speaking_order(OrderSalt::Messages);
        for (name, action) in self.collect(Phase::DayMessage, &order, &order) {
            let message = posted_message(&action);
            let role = self.role_label(&name);
            self.narrative.announce(format!(
                ">>> {name} ({role}): {}",
                message.as_deref().unwrap_or(SILENT_MARKER)
            ));
            self.messages.push(ChatLine {
                speaker: name,
                message,
            });
        }

        self.state.open_vote()
    }

    fn run_day_vote(&mut self) -> Result<(), PhaseError> {
        let rule = "-".repeat(BANNER_WIDTH);
        self.narrative.announce(format!("\n{rule}\nVoting Phase\n{rule}"));

        let order = self.state.speaking_order(OrderSalt::Votes);
        let mut ballot = Ballot::new();
        for (name, action) in self.collect(Phase::DayVote, &order, &order) {
            let vote = match action {
                Action::Vote(target) => Vote::from_raw(&target),
                _ => Vote::Abstain,
            };
            self.narrative.announce(format!(
                "*** {name} votes: {}",
                vote.target().unwrap_or(NO_VOTE)
            ));
            ballot.insert(name, vote);
        }

        let result = tally(&ballot, &order);
        for rejected in &result.rejected {
            event!(
                target: "mafia_sim::controller",
                Level::WARN,
                game = self.game_index,
                voter = %rejected.voter,
                chosen = %rejected.target,
                "vote for an unknown or dead player ignored"
            );
        }

        match result.outcome {
            TallyOutcome::Tie => self.narrative.announce(format!(
                "\n>>> There is a tie among {} (each received {} votes). No one is eliminated today.",
                result.leaders.join(", "),
                result.top_count
            )),
            TallyOutcome::Eliminated => {
                if let Some(name) = &result.eliminated {
                    self.narrative.announce(format!(
                        "\n>>> Players voted to eliminate {name} (received {} vote{}).",
                        result.top_count,
                        if result.top_count == 1 { "" } else { "s" }
                    ));
                }
            }
            TallyOutcome::NoVotes => self
                .narrative
                .announce("\n>>> No votes were cast. No one is eliminated today."),
        }

        let day = self.state.day();
        let resolution = self.state.resolve_day_vote(&result)?;
        event!(
            target: "mafia_sim::controller",
            Level::INFO,
            game = self.game_index,
            day,
            outcome = ?result.outcome,
            eliminated = resolution.eliminated.as_deref().unwrap_or("-"),
            "day vote resolved"
        );
        if let Some(name) = resolution.eliminated {
            self.record_elimination(name, Phase::DayVote, day);
        }
        if let WinCheck::GameOver(team) = resolution.win {
            self.finish(Some(team));
        }
        Ok(())
    }

    fn run_night(&mut self) -> Result<(), PhaseError> {
        let night = self.state.begin_night()?;
        self.narrative.announce(format!("\n--- Night {night} ---"));

        let order = self.state.speaking_order(OrderSalt::Night);
        let actors: Vec<String> = order
            .iter()
            .filter(|name| {
                self.state
                    .roster()
                    .role_of(name)
                    .is_some_and(Role::acts_at_night)
            })
            .cloned()
            .collect();

        let mut actions = NightActionSet::new();
        for (name, action) in self.collect(Phase::Night, &actors, &order) {
            actions = match action {
                Action::MafiaVote(target) => actions.with_mafia_vote(name, target),
                Action::DoctorSave(target) => actions.with_doctor_save(target),
                Action::CheckAlignment(target) => actions.with_detective_check(name, target),
                _ => actions,
            };
        }

        let outcome = resolve_night(&actions, self.state.roster());
        for rejected in &outcome.rejected {
            event!(
                target: "mafia_sim::controller",
                Level::WARN,
                game = self.game_index,
                night,
                kind = ?rejected.kind,
                actor = rejected.actor.as_deref().unwrap_or("-"),
                chosen = %rejected.target,
                "night action ignored"
            );
        }

        match &outcome.attack_target {
            Some(target) => {
                self.narrative.announce(format!("Mafia targeted {target}."));
                if outcome.save_applied {
                    self.narrative
                        .announce(format!("Doctor saved {target} during the night!"));
                } else if let Some(killed) = &outcome.killed {
                    self.narrative
                        .announce(format!("{killed} was killed during the night!"));
                    self.narrative.announce(format!("{killed} has been eliminated."));
                }
            }
            None => self.narrative.announce("No mafia actions were taken tonight."),
        }

        match &outcome.detective_result {
            Some(found) => self.narrative.announce(format!(
                "Detective checked {} and found that they are {}.",
                found.target, found.alignment
            )),
            None if outcome
                .rejected
                .iter()
                .any(|rejected| rejected.kind == RejectedKind::DetectiveCheck) =>
            {
                self.narrative.announce("Detective's target was invalid.");
            }
            None => {}
        }

        let resolution = self.state.resolve_night(&outcome)?;
        event!(
            target: "mafia_sim::controller",
            Level::INFO,
            game = self.game_index,
            night,
            attacked = outcome.attack_target.as_deref().unwrap_or("-"),
            saved = outcome.save_applied,
            killed = resolution.killed.as_deref().unwrap_or("-"),
            "night resolved"
        );
        if let Some(name) = resolution.killed {
            self.record_elimination(name, Phase::Night, night);
        }
        if let WinCheck::GameOver(team) = resolution.win {
            self.finish(Some(team));
        }
        Ok(())
    }

    /// Asks every actor for a decision and returns them in `actors` order.
    ///
    /// Failures, panics and decisions that do not fit the phase all become the
    /// phase's safe default.
    fn collect(&mut self, phase: Phase, actors: &[String], alive: &[String]) -> Vec<(String, Action)> {
        let day = self.state.day();
        let night = self.state.night();
        let roster = self.state.roster();
        let heard: &[ChatLine] = match phase {
            Phase::DayVote => &self.messages,
            _ => &[],
        };

        let decisions: Vec<(String, Result<Action, DecisionError>)> = match self.dispatch {
            DispatchMode::Sequential => {
                let mut said: Vec<ChatLine> = Vec::new();
                let mut decisions = Vec::with_capacity(actors.len());
                for name in actors {
                    let result = match (roster.get(name), self.providers.get_mut(name)) {
                        (Some(player), Some(provider)) => {
                            let messages = if phase == Phase::DayMessage { &said[..] } else { heard };
                            let ctx = context(phase, player, alive, messages, day, night);
                            decide_guarded(provider.as_mut(), &ctx)
                        }
                        _ => Err(missing_provider()),
                    };
                    if phase == Phase::DayMessage {
                        said.push(ChatLine {
                            speaker: name.clone(),
                            message: result.as_ref().ok().and_then(posted_message),
                        });
                    }
                    decisions.push((name.clone(), result));
                }
                decisions
            }
            DispatchMode::Parallel => {
                let mut handles: BTreeMap<&str, &mut Box<dyn DecisionProvider>> = self
                    .providers
                    .iter_mut()
                    .filter(|(name, _)| actors.contains(*name))
                    .map(|(name, provider)| (name.as_str(), provider))
                    .collect();
                thread::scope(|scope| {
                    let pending: Vec<_> = actors
                        .iter()
                        .map(|name| {
                            let job = roster.get(name).zip(handles.remove(name.as_str()));
                            let handle = job.map(|(player, provider)| {
                                scope.spawn(move || {
                                    let ctx = context(phase, player, alive, heard, day, night);
                                    decide_guarded(provider.as_mut(), &ctx)
                                })
                            });
                            (name, handle)
                        })
                        .collect();
                    pending
                        .into_iter()
                        .map(|(name, handle)| {
                            let result = match handle {
                                Some(handle) => handle.join().unwrap_or_else(|_| {
                                    Err(DecisionError::Provider("decision thread panicked".into()))
                                }),
                                None => Err(missing_provider()),
                            };
                            (name.clone(), result)
                        })
                        .collect()
                })
            }
        };

        decisions
            .into_iter()
            .map(|(name, result)| {
                let action = match result {
                    Ok(action) => action,
                    Err(err) => {
                        self.fallbacks += 1;
                        event!(
                            target: "mafia_sim::controller",
                            Level::WARN,
                            game = self.game_index,
                            player = %name,
                            phase = %phase,
                            error = %err,
                            "decision replaced by safe default"
                        );
                        Action::safe_default(phase)
                    }
                };
                (name, action)
            })
            .collect()
    }

    fn record_elimination(&mut self, name: String, phase: Phase, round: u32) {
        let role = self.state.roster().role_of(&name).unwrap_or(Role::Townsperson);
        if phase == Phase::DayVote {
            self.narrative.announce(format!("{name} has been eliminated."));
        }
        self.eliminations.push(Elimination {
            name,
            role,
            phase,
            round,
        });
    }

    fn stop_at_limit(&mut self) {
        event!(
            target: "mafia_sim::controller",
            Level::WARN,
            game = self.game_index,
            round_limit = self.round_limit,
            "round limit reached without a winner"
        );
        self.narrative.announce(format!(
            "\nGame stopped after {} days without a winner.",
            self.state.day()
        ));
        self.finish(None);
    }

    fn finish(&mut self, winner: Option<Team>) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(team) = winner {
            self.narrative
                .announce(format!("\nGame Over! The {team} have won!"));
        }
        event!(
            target: "mafia_sim::controller",
            Level::INFO,
            game = self.game_index,
            winner = %winner.map_or_else(|| "none".to_string(), |team| team.to_string()),
            days = self.state.day(),
            nights = self.state.night(),
            fallbacks = self.fallbacks,
            "game finished"
        );
        for provider in self.providers.values_mut() {
            provider.observe_game_over(winner);
        }
    }

    fn role_label(&self, name: &str) -> &'static str {
        self.state
            .roster()
            .role_of(name)
            .map_or("unknown", Role::as_str)
    }
}

fn context<'a>(
    phase: Phase,
    player: &'a Player,
    alive: &'a [String],
    messages: &'a [ChatLine],
    day: u32,
    night: u32,
) -> DecisionContext<'a> {
    DecisionContext {
        phase,
        player: player.name(),
        role: player.role(),
        alive,
        beliefs: player.beliefs(),
        messages,
        day,
        night,
    }
}

fn decide_guarded(
    provider: &mut dyn DecisionProvider,
    ctx: &DecisionContext,
) -> Result<Action, DecisionError> {
    match panic::catch_unwind(AssertUnwindSafe(|| provider.decide(ctx))) {
        Ok(Ok(action)) if action.fits(ctx.phase, ctx.role) => Ok(action),
        Ok(Ok(action)) => Err(DecisionError::WrongShape {
            phase: ctx.phase,
            role: ctx.role,
            detail: format!("{} is not allowed here", action.to_json()),
        }),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(DecisionError::Provider("provider panicked".into())),
    }
}

/// The trimmed text of a day message; blank posts count as silence.
fn posted_message(action: &Action) -> Option<String> {
    match action {
        Action::PostMessage(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn missing_provider() -> DecisionError {
    DecisionError::Provider("no provider registered for player".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia_bot::ScriptedProvider;
    use mafia_core::model::roster::Roster;

    fn four_player_state() -> GameState {
        let roster = Roster::new(vec![
            ("Alice".to_string(), Role::Mafia),
            ("Bob".to_string(), Role::Doctor),
            ("Carol".to_string(), Role::Detective),
            ("Dana".to_string(), Role::Townsperson),
        ])
        .unwrap();
        GameState::new(roster, 11)
    }

    fn quiet_day(provider: ScriptedProvider) -> ScriptedProvider {
        provider.with_action(Phase::DayMessage, &Action::NoMessage)
    }

    /// Night 1: Alice attacks Dana, Bob saves himself, Carol checks Alice.
    /// Day 2: the town votes Alice out.
    fn scenario() -> BTreeMap<String, Box<dyn DecisionProvider>> {
        let alice = quiet_day(ScriptedProvider::new())
            .with_action(Phase::DayVote, &Action::NoVote)
            .with_action(Phase::Night, &Action::MafiaVote("Dana".into()))
            .with_action(Phase::DayMessage, &Action::PostMessage("Not me.".into()))
            .with_action(Phase::DayVote, &Action::Vote("Bob".into()));
        let bob = quiet_day(ScriptedProvider::new())
            .with_action(Phase::DayVote, &Action::NoVote)
            .with_action(Phase::Night, &Action::DoctorSave("Bob".into()))
            .with_action(Phase::DayMessage, &Action::NoMessage)
            .with_action(Phase::DayVote, &Action::Vote("Alice".into()));
        let carol = quiet_day(ScriptedProvider::new())
            .with_action(Phase::DayVote, &Action::NoVote)
            .with_action(Phase::Night, &Action::CheckAlignment("Alice".into()))
            .with_action(Phase::DayMessage, &Action::PostMessage("Alice is Mafia.".into()))
            .with_action(Phase::DayVote, &Action::Vote("Alice".into()));
        let dana = quiet_day(ScriptedProvider::new()).with_action(Phase::DayVote, &Action::NoVote);

        let mut providers: BTreeMap<String, Box<dyn DecisionProvider>> = BTreeMap::new();
        providers.insert("Alice".into(), Box::new(alice));
        providers.insert("Bob".into(), Box::new(bob));
        providers.insert("Carol".into(), Box::new(carol));
        providers.insert("Dana".into(), Box::new(dana));
        providers
    }

    struct Panicking;

    impl DecisionProvider for Panicking {
        fn decide(&mut self, _ctx: &DecisionContext) -> Result<Action, DecisionError> {
            panic!("bot crashed");
        }
    }

    struct Passive;

    impl DecisionProvider for Passive {
        fn decide(&mut self, ctx: &DecisionContext) -> Result<Action, DecisionError> {
            Ok(Action::safe_default(ctx.phase))
        }
    }

    /// Posts a fixed message and records what it heard before speaking.
    struct Listener {
        says: &'static str,
        heard: Arc<std::sync::Mutex<Vec<Vec<ChatLine>>>>,
    }

    impl DecisionProvider for Listener {
        fn decide(&mut self, ctx: &DecisionContext) -> Result<Action, DecisionError> {
            if ctx.phase == Phase::DayMessage {
                self.heard.lock().unwrap().push(ctx.messages.to_vec());
                return Ok(Action::PostMessage(self.says.to_string()));
            }
            Ok(Action::safe_default(ctx.phase))
        }
    }

    #[test]
    fn speakers_hear_the_same_text_voters_see() {
        let heard = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut providers: BTreeMap<String, Box<dyn DecisionProvider>> = BTreeMap::new();
        for (name, says) in [("Alice", "  Not me.  "), ("Bob", "   "), ("Carol", "Hi"), ("Dana", "Hello\n")] {
            let listener = Listener {
                says,
                heard: Arc::clone(&heard),
            };
            providers.insert(name.into(), Box::new(listener));
        }

        let narrative = Arc::new(Narrative::in_memory());
        let mut controller = PhaseController::new(four_player_state(), providers, narrative.clone());
        controller.step().unwrap();

        let day = controller.messages().to_vec();
        assert_eq!(day.len(), 4);
        let line = |speaker: &str| day.iter().find(|line| line.speaker == speaker).unwrap().clone();
        assert_eq!(line("Alice").message.as_deref(), Some("Not me."));
        assert_eq!(line("Bob").message, None);
        assert_eq!(line("Dana").message.as_deref(), Some("Hello"));
        assert!(narrative.contains(">>> Bob (doctor): [No message]"));

        let heard = heard.lock().unwrap();
        let mut lengths: Vec<usize> = heard.iter().map(Vec::len).collect();
        lengths.sort_unstable();
        assert_eq!(lengths, vec![0, 1, 2, 3]);
        for earlier in heard.iter() {
            assert_eq!(earlier[..], day[..earlier.len()]);
        }
    }

    #[test]
    fn scripted_game_reaches_town_win() {
        let narrative = Arc::new(Narrative::in_memory());
        let controller = PhaseController::new(four_player_state(), scenario(), narrative.clone());
        let result = controller.run().unwrap();

        assert_eq!(result.winner, Some(Team::Town));
        assert_eq!((result.days, result.nights), (2, 1));
        assert_eq!(result.fallbacks, 0);
        let eliminated: Vec<(&str, Phase)> = result
            .eliminations
            .iter()
            .map(|entry| (entry.name.as_str(), entry.phase))
            .collect();
        assert_eq!(eliminated, vec![("Dana", Phase::Night), ("Alice", Phase::DayVote)]);

        assert!(narrative.contains("DAY 1"));
        assert!(narrative.contains(">>> No votes were cast. No one is eliminated today."));
        assert!(narrative.contains("Mafia targeted Dana."));
        assert!(narrative.contains("Dana was killed during the night!"));
        assert!(narrative.contains("Detective checked Alice and found that they are mafia."));
        assert!(narrative.contains(">>> Carol (detective): Alice is Mafia."));
        assert!(narrative.contains(">>> Dana (townsperson): [No message]"));
        assert!(narrative.contains("Players voted to eliminate Alice (received 2 votes)."));
        assert!(narrative.contains("Game Over! The Town have won!"));
    }

    #[test]
    fn parallel_dispatch_matches_sequential() {
        let run = |dispatch| {
            let narrative = Arc::new(Narrative::in_memory());
            let result = PhaseController::new(four_player_state(), scenario(), narrative.clone())
                .with_dispatch(dispatch)
                .run()
                .unwrap();
            (result, narrative.entries())
        };
        assert_eq!(run(DispatchMode::Sequential), run(DispatchMode::Parallel));
    }

    #[test]
    fn unparseable_reply_becomes_no_vote() {
        let mut providers = scenario();
        let mut bob = ScriptedProvider::new().with_action(Phase::DayMessage, &Action::NoMessage);
        bob.push(Phase::DayVote, "hmm, maybe Alice?");
        providers.insert("Bob".into(), Box::new(bob));

        let narrative = Arc::new(Narrative::in_memory());
        let mut controller = PhaseController::new(four_player_state(), providers, narrative.clone());
        controller.step().unwrap();
        controller.step().unwrap();

        assert!(narrative.contains("*** Bob votes: no_vote"));
        assert_eq!(controller.result().fallbacks, 1);
        assert_eq!(controller.state().phase(), PhaseState::NightActions);
    }

    #[test]
    fn invalid_night_targets_are_announced_and_ignored() {
        let mut providers = scenario();
        providers.insert(
            "Alice".into(),
            Box::new(
                quiet_day(ScriptedProvider::new())
                    .with_action(Phase::DayVote, &Action::NoVote)
                    .with_action(Phase::Night, &Action::MafiaVote("Zed".into())),
            ),
        );
        providers.insert(
            "Carol".into(),
            Box::new(
                quiet_day(ScriptedProvider::new())
                    .with_action(Phase::DayVote, &Action::NoVote)
                    .with_action(Phase::Night, &Action::CheckAlignment("Zed".into())),
            ),
        );

        let narrative = Arc::new(Narrative::in_memory());
        let mut controller = PhaseController::new(four_player_state(), providers, narrative.clone());
        for _ in 0..3 {
            controller.step().unwrap();
        }

        assert!(narrative.contains("No mafia actions were taken tonight."));
        assert!(narrative.contains("Detective's target was invalid."));
        assert_eq!(controller.state().roster().alive_names().len(), 4);
        assert_eq!(controller.state().phase(), PhaseState::DayMessage);
    }

    #[test]
    fn panicking_provider_falls_back_in_both_modes() {
        for dispatch in [DispatchMode::Sequential, DispatchMode::Parallel] {
            let mut providers = scenario();
            providers.insert("Dana".into(), Box::new(Panicking));
            let narrative = Arc::new(Narrative::in_memory());
            let result = PhaseController::new(four_player_state(), providers, narrative.clone())
                .with_dispatch(dispatch)
                .run()
                .unwrap();

            assert_eq!(result.winner, Some(Team::Town));
            assert!(narrative.contains(">>> Dana (townsperson): [No message]"));
            assert!(narrative.contains("*** Dana votes: no_vote"));
            assert!(result.fallbacks >= 2);
        }
    }

    #[test]
    fn out_of_turn_action_is_rejected() {
        let mut providers = scenario();
        providers.insert(
            "Dana".into(),
            Box::new(ScriptedProvider::new().with_action(Phase::DayMessage, &Action::MafiaVote("Bob".into()))),
        );
        let narrative = Arc::new(Narrative::in_memory());
        let mut controller = PhaseController::new(four_player_state(), providers, narrative.clone());
        controller.step().unwrap();

        assert!(narrative.contains(">>> Dana (townsperson): [No message]"));
        assert_eq!(controller.result().fallbacks, 1);
    }

    #[test]
    fn round_limit_stops_without_winner() {
        let mut providers: BTreeMap<String, Box<dyn DecisionProvider>> = BTreeMap::new();
        for name in ["Alice", "Bob", "Carol", "Dana"] {
            providers.insert(name.into(), Box::new(Passive));
        }
        let narrative = Arc::new(Narrative::in_memory());
        let mut controller = PhaseController::new(four_player_state(), providers, narrative.clone())
            .with_round_limit(3);
        let mut progress = controller.step().unwrap();
        while let Progress::Running(_) = progress {
            progress = controller.step().unwrap();
        }

        assert_eq!(progress, Progress::Finished(None));
        let result = controller.result();
        assert_eq!(result.winner, None);
        assert_eq!((result.days, result.nights), (3, 3));
        assert!(narrative.contains("Game stopped after 3 days without a winner."));
        let snapshot = controller.snapshot();
        assert_eq!((snapshot.day, snapshot.night, snapshot.winner), (3, 3, None));
        assert!(snapshot.players.iter().all(|player| player.alive));
        assert_eq!(controller.step().unwrap(), Progress::Finished(None));
    }
}
