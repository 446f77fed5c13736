use mafia_core::game::tally::TallyOutcome;
use mafia_core::game::{
    Ballot, GameSnapshot, GameState, NightActionSet, PhaseState, Vote, WinCheck, resolve_night,
    tally,
};
use mafia_core::model::role::{Alignment, Role, Team};
use mafia_core::model::roster::Roster;

fn classic_four() -> GameState {
    let roster = Roster::new(vec![
        ("Alice".to_string(), Role::Mafia),
        ("Bob".to_string(), Role::Doctor),
        ("Carol".to_string(), Role::Detective),
        ("Dana".to_string(), Role::Townsperson),
    ])
    .expect("valid roster");
    GameState::new(roster, 42)
}

fn skip_day(state: &mut GameState, votes: &[(&str, &str)]) -> Option<String> {
    state.begin_day().unwrap();
    state.open_vote().unwrap();
    let ballot: Ballot = votes
        .iter()
        .map(|(voter, target)| (voter.to_string(), Vote::from_raw(target)))
        .collect();
    let alive = state.roster().alive_names();
    state
        .resolve_day_vote(&tally(&ballot, &alive))
        .unwrap()
        .eliminated
}

#[test]
fn first_night_kill_with_wrong_save() {
    let mut state = classic_four();

    let eliminated = skip_day(&mut state, &[("Alice", "Bob"), ("Dana", "Carol")]);
    assert_eq!(eliminated, None);
    assert_eq!(state.phase(), PhaseState::NightActions);

    assert_eq!(state.begin_night(), Ok(1));
    let actions = NightActionSet::new()
        .with_mafia_vote("Alice", "Dana")
        .with_doctor_save("Bob")
        .with_detective_check("Carol", "Alice");
    let outcome = resolve_night(&actions, state.roster());
    let resolution = state.resolve_night(&outcome).unwrap();

    assert_eq!(resolution.killed.as_deref(), Some("Dana"));
    assert_eq!(resolution.win, WinCheck::Continue);
    assert_eq!(state.roster().alive_counts(), (1, 2));
    assert_eq!(state.phase(), PhaseState::DayMessage);

    for player in state.roster().players() {
        assert!(!player.beliefs().believes_alive("Dana"));
    }
    let carol = state.roster().get("Carol").unwrap();
    let record = carol.beliefs().record("Alice").unwrap();
    assert_eq!(record.confirmed_role, Some(Role::Mafia));
    assert_eq!(record.alignment, Some(Alignment::Mafia));
}

#[test]
fn mafia_reaches_parity_after_day_mistake() {
    let mut state = classic_four();

    let eliminated = skip_day(&mut state, &[("Alice", "Dana"), ("Bob", "Dana"), ("Carol", "Alice")]);
    assert_eq!(eliminated.as_deref(), Some("Dana"));

    state.begin_night().unwrap();
    let outcome = resolve_night(
        &NightActionSet::new().with_mafia_vote("Alice", "Carol"),
        state.roster(),
    );
    let resolution = state.resolve_night(&outcome).unwrap();
    assert_eq!(resolution.win, WinCheck::GameOver(Team::Mafia));
    assert_eq!(state.winner(), Some(Team::Mafia));

    let snapshot = GameSnapshot::capture(&state);
    assert_eq!(snapshot.winner, Some(Team::Mafia));
    assert_eq!(snapshot.night, 1);
}

#[test]
fn tie_eliminates_nobody_and_dead_stay_dead() {
    let mut state = classic_four();
    state.begin_day().unwrap();
    state.open_vote().unwrap();

    let mut ballot = Ballot::new();
    ballot.insert("Alice".into(), Vote::from_raw("Bob"));
    ballot.insert("Bob".into(), Vote::from_raw("Alice"));
    let alive = state.roster().alive_names();
    let result = tally(&ballot, &alive);
    assert_eq!(result.outcome, TallyOutcome::Tie);
    state.resolve_day_vote(&result).unwrap();
    assert_eq!(state.roster().alive_names().len(), 4);

    state.begin_night().unwrap();
    let outcome = resolve_night(
        &NightActionSet::new().with_mafia_vote("Alice", "Dana"),
        state.roster(),
    );
    state.resolve_night(&outcome).unwrap();
    assert!(!state.roster().is_alive("Dana"));

    // Dana cannot come back, and later votes against her are rejected.
    state.begin_day().unwrap();
    state.open_vote().unwrap();
    let mut ballot = Ballot::new();
    ballot.insert("Bob".into(), Vote::from_raw("Dana"));
    let alive = state.roster().alive_names();
    let result = tally(&ballot, &alive);
    assert_eq!(result.rejected.len(), 1);
    assert_eq!(result.outcome, TallyOutcome::NoVotes);
    state.resolve_day_vote(&result).unwrap();
    assert!(!state.roster().is_alive("Dana"));
}
