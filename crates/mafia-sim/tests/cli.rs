use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn mafiasim() -> Command {
    Command::cargo_bin("mafiasim").expect("binary built")
}

#[test]
fn validate_only_skips_the_game() {
    mafiasim()
        .args(["--validate-only", "--players", "Ann,Ben,Cat,Dov,Eli"])
        .assert()
        .success()
        .stdout(predicate::str::contains("with 5 players"))
        .stdout(predicate::str::contains("Validation-only mode"))
        .stdout(predicate::str::contains("DAY 1").not());
}

#[test]
fn too_few_players_is_an_error() {
    mafiasim()
        .args(["--players", "Ann,Ben,Cat"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 4 and 8 players are required"));
}

#[test]
fn single_game_prints_roles_then_narrative() {
    mafiasim()
        .args(["--seed", "21"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting a single game..."))
        .stdout(predicate::str::contains("Role assignments:"))
        .stdout(predicate::str::contains("Alice:"))
        .stdout(predicate::str::contains("DAY 1"))
        .stdout(predicate::str::contains("Voting Phase"));
}

#[test]
fn evaluation_reports_mafia_win_rate() {
    let dir = tempdir().expect("temp dir");
    let results = dir.path().join("games.jsonl");
    mafiasim()
        .args(["--eval", "3", "--seed", "5", "--quiet", "--parallel"])
        .arg("--results")
        .arg(&results)
        .assert()
        .success()
        .stdout(predicate::str::contains("Running evaluation over 3 games..."))
        .stdout(predicate::str::contains("Game 3/3 complete. Winner:"))
        .stdout(predicate::str::contains("Evaluation complete. Mafia win rate:"))
        .stdout(predicate::str::contains("DAY 1").not());

    let written = std::fs::read_to_string(results).expect("results written");
    assert_eq!(written.lines().count(), 3);
}
