use core::fmt;
use mafia_core::game::tally::{Vote, normalize_target};
use mafia_core::model::role::Role;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Sub-phase a decision is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    DayMessage,
    DayVote,
    Night,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::DayMessage => "day_message",
            Phase::DayVote => "day_vote",
            Phase::Night => "night",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("no JSON decision object found in {raw:?}")]
    Unparseable { raw: String },
    #[error("decision does not fit {phase} for a {role}: {detail}")]
    WrongShape {
        phase: Phase,
        role: Role,
        detail: String,
    },
    #[error("provider failed: {0}")]
    Provider(String),
    #[error("provider has no decision left for {phase}")]
    Exhausted { phase: Phase },
}

/// A single decision returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PostMessage(String),
    NoMessage,
    Vote(String),
    NoVote,
    MafiaVote(String),
    DoctorSave(String),
    CheckAlignment(String),
    NoAction,
}

impl Action {
    /// What a player does when their provider fails or answers out of turn.
    pub const fn safe_default(phase: Phase) -> Self {
        match phase {
            Phase::DayMessage => Action::NoMessage,
            Phase::DayVote => Action::NoVote,
            Phase::Night => Action::NoAction,
        }
    }

    pub fn fits(&self, phase: Phase, role: Role) -> bool {
        match self {
            Action::PostMessage(_) | Action::NoMessage => phase == Phase::DayMessage,
            Action::Vote(_) | Action::NoVote => phase == Phase::DayVote,
            Action::MafiaVote(_) => phase == Phase::Night && role == Role::Mafia,
            Action::DoctorSave(_) => phase == Phase::Night && role == Role::Doctor,
            Action::CheckAlignment(_) => phase == Phase::Night && role == Role::Detective,
            Action::NoAction => phase == Phase::Night,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Action::Vote(target)
            | Action::MafiaVote(target)
            | Action::DoctorSave(target)
            | Action::CheckAlignment(target) => Some(target),
            _ => None,
        }
    }

    /// Wire form, matching what [`Action::parse`] accepts.
    pub fn to_json(&self) -> Value {
        match self {
            Action::PostMessage(message) => json!({"action": "post_message", "message": message}),
            Action::NoMessage => json!({"action": "no_message"}),
            Action::Vote(target) => json!({"target": target}),
            Action::NoVote => json!({"target": "no_vote"}),
            Action::MafiaVote(target) => json!({"action": "mafia_vote", "target": target}),
            Action::DoctorSave(target) => json!({"action": "doctor_save", "target": target}),
            Action::CheckAlignment(target) => {
                json!({"action": "check_alignment_detective", "target": target})
            }
            Action::NoAction => json!({"action": "no_action"}),
        }
    }

    /// Parses a raw provider reply. The JSON object may be wrapped in prose.
    pub fn parse(phase: Phase, role: Role, raw: &str) -> Result<Self, DecisionError> {
        let object = extract_object(raw).ok_or_else(|| DecisionError::Unparseable {
            raw: raw.to_string(),
        })?;
        Self::from_object(phase, role, &object)
    }

    pub fn from_value(phase: Phase, role: Role, value: &Value) -> Result<Self, DecisionError> {
        match value {
            Value::Object(object) => Self::from_object(phase, role, object),
            other => Err(DecisionError::Unparseable {
                raw: other.to_string(),
            }),
        }
    }

    fn from_object(phase: Phase, role: Role, object: &Map<String, Value>) -> Result<Self, DecisionError> {
        let wrong = |detail: &str| DecisionError::WrongShape {
            phase,
            role,
            detail: detail.to_string(),
        };
        let action = object.get("action").and_then(Value::as_str).map(str::trim);
        let target = object
            .get("target")
            .and_then(Value::as_str)
            .map(normalize_target)
            .filter(|target| !target.is_empty());

        let parsed = match phase {
            Phase::DayMessage => match action {
                Some("post_message") => {
                    let message = object
                        .get("message")
                        .and_then(Value::as_str)
                        .ok_or_else(|| wrong("post_message without a message"))?;
                    if message.trim().is_empty() {
                        Action::NoMessage
                    } else {
                        Action::PostMessage(message.to_string())
                    }
                }
                Some("no_message") => Action::NoMessage,
                _ => return Err(wrong("expected post_message or no_message")),
            },
            Phase::DayVote => match (action, object.get("target").and_then(Value::as_str)) {
                (Some("no_vote"), _) => Action::NoVote,
                (_, Some(raw)) => match Vote::from_raw(raw) {
                    Vote::Target(name) => Action::Vote(name),
                    Vote::Abstain => Action::NoVote,
                },
                _ => return Err(wrong("expected a target")),
            },
            Phase::Night => match action {
                Some("no_action") => Action::NoAction,
                Some("mafia_vote") => {
                    Action::MafiaVote(target.ok_or_else(|| wrong("mafia_vote without a target"))?.to_string())
                }
                Some("doctor_save") => {
                    Action::DoctorSave(target.ok_or_else(|| wrong("doctor_save without a target"))?.to_string())
                }
                Some("check_alignment_detective") => Action::CheckAlignment(
                    target
                        .ok_or_else(|| wrong("check_alignment_detective without a target"))?
                        .to_string(),
                ),
                _ => return Err(wrong("unknown night action")),
            },
        };

        if parsed.fits(phase, role) {
            Ok(parsed)
        } else {
            Err(wrong("action is not available to this role"))
        }
    }
}

fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(object);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_message_shapes() {
        let posted = Action::parse(
            Phase::DayMessage,
            Role::Townsperson,
            r#"{"action":"post_message","message":"Bob is quiet."}"#,
        )
        .unwrap();
        assert_eq!(posted, Action::PostMessage("Bob is quiet.".into()));

        let silent = Action::parse(Phase::DayMessage, Role::Mafia, r#"{"action":"no_message"}"#);
        assert_eq!(silent, Ok(Action::NoMessage));
    }

    #[test]
    fn json_embedded_in_prose_is_accepted() {
        let raw = "Sure, here is my json: {\"target\": \"Dana,\"} hope that helps";
        assert_eq!(
            Action::parse(Phase::DayVote, Role::Doctor, raw),
            Ok(Action::Vote("Dana".into()))
        );
    }

    #[test]
    fn no_vote_target_abstains() {
        assert_eq!(
            Action::parse(Phase::DayVote, Role::Doctor, r#"{"target":"no_vote"}"#),
            Ok(Action::NoVote)
        );
    }

    #[test]
    fn garbage_is_unparseable() {
        let err = Action::parse(Phase::Night, Role::Mafia, "I refuse to answer").unwrap_err();
        assert!(matches!(err, DecisionError::Unparseable { .. }));
        let err = Action::parse(Phase::Night, Role::Mafia, "[1, 2]").unwrap_err();
        assert!(matches!(err, DecisionError::Unparseable { .. }));
    }

    #[test]
    fn night_action_must_match_role() {
        let doctor_kill = Action::parse(
            Phase::Night,
            Role::Doctor,
            r#"{"action":"mafia_vote","target":"Alice"}"#,
        );
        assert!(matches!(doctor_kill, Err(DecisionError::WrongShape { .. })));

        let check = Action::parse(
            Phase::Night,
            Role::Detective,
            r#"{"action":"check_alignment_detective","target":" Alice "}"#,
        );
        assert_eq!(check, Ok(Action::CheckAlignment("Alice".into())));
    }

    #[test]
    fn day_action_at_night_is_wrong_shape() {
        let err = Action::parse(
            Phase::Night,
            Role::Townsperson,
            r#"{"action":"post_message","message":"hi"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DecisionError::WrongShape { phase: Phase::Night, .. }));
    }

    #[test]
    fn wire_form_parses_back() {
        let action = Action::DoctorSave("Bob".into());
        let raw = action.to_json().to_string();
        assert_eq!(Action::parse(Phase::Night, Role::Doctor, &raw), Ok(action));
    }

    #[test]
    fn safe_defaults_fit_every_role() {
        for phase in [Phase::DayMessage, Phase::DayVote, Phase::Night] {
            for role in Role::ALL {
                assert!(Action::safe_default(phase).fits(phase, role));
            }
        }
    }
}
