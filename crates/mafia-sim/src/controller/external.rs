use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use mafia_bot::{Action, DecisionContext, DecisionError, DecisionProvider, HeuristicProvider};
use thiserror::Error;
use tracing::{Level, event};

use crate::agents::{ExternalFallback, ExternalOptions};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs one subprocess per decision: the request JSON goes to stdin and the
/// reply is read from stdout with the same parser used for every provider.
pub struct ExternalProvider {
    name: String,
    options: ExternalOptions,
    fallback: HeuristicProvider,
}

impl ExternalProvider {
    pub fn new(name: String, options: ExternalOptions, seed: u64) -> Self {
        if options.command.is_none() {
            event!(
                target: "mafia_sim::external",
                Level::WARN,
                agent = %name,
                "no external command configured; every decision uses the fallback"
            );
        }
        Self {
            name,
            options,
            fallback: HeuristicProvider::seeded(seed),
        }
    }

    fn invoke(&self, ctx: &DecisionContext) -> Result<String, ExternalInvokeError> {
        let command = match &self.options.command {
            Some(cmd) if !cmd.is_empty() => cmd,
            _ => return Err(ExternalInvokeError::NoCommand),
        };

        let mut cmd = Command::new(command);
        if !self.options.args.is_empty() {
            cmd.args(&self.options.args);
        }
        if let Some(dir) = &self.options.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|err| ExternalInvokeError::Spawn(err.to_string()))?;
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| ExternalInvokeError::Io("stdin".into()))?;
            serde_json::to_writer(&mut stdin, &ctx.request())
                .map_err(|err| ExternalInvokeError::Protocol(err.to_string()))?;
            stdin
                .write_all(b"\n")
                .map_err(|err| ExternalInvokeError::Io(err.to_string()))?;
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExternalInvokeError::Io("stdout".into()))?;
        // Drained on a thread so a chatty child cannot stall on a full pipe.
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let deadline = self
            .options
            .timeout_ms
            .map(|ms| start + Duration::from_millis(ms));
        let status = loop {
            match child
                .try_wait()
                .map_err(|err| ExternalInvokeError::Io(err.to_string()))?
            {
                Some(status) => break status,
                None => {
                    if let Some(deadline) = deadline
                        && Instant::now() >= deadline
                    {
                        let _ = child.kill();
                        let _ = child.wait();
                        let timeout_ms = self.options.timeout_ms.unwrap_or_default();
                        event!(
                            target: "mafia_sim::external",
                            Level::WARN,
                            agent = %self.name,
                            player = ctx.player,
                            phase = %ctx.phase,
                            timeout_ms,
                            "external invocation timed out; process killed"
                        );
                        // The reader is left detached: grandchildren may still hold the pipe.
                        return Err(ExternalInvokeError::Timeout(timeout_ms));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = reader
            .join()
            .map_err(|_| ExternalInvokeError::Io("stdout reader panicked".into()))?
            .map_err(|err| ExternalInvokeError::Io(err.to_string()))?;

        if !status.success() {
            return Err(ExternalInvokeError::Status(format!("exit status {status}")));
        }

        event!(
            target: "mafia_sim::external",
            Level::DEBUG,
            agent = %self.name,
            player = ctx.player,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "external invocation finished"
        );

        String::from_utf8(stdout).map_err(|err| ExternalInvokeError::Protocol(err.to_string()))
    }

    fn fall_back(&mut self, ctx: &DecisionContext, cause: String) -> Result<Action, DecisionError> {
        match self.options.fallback {
            ExternalFallback::Heuristic => self.fallback.decide(ctx),
            ExternalFallback::SafeDefault => Err(DecisionError::Provider(cause)),
        }
    }
}

impl DecisionProvider for ExternalProvider {
    fn decide(&mut self, ctx: &DecisionContext) -> Result<Action, DecisionError> {
        let reply = match self.invoke(ctx) {
            Ok(reply) => reply,
            Err(err) => {
                event!(
                    target: "mafia_sim::external",
                    Level::WARN,
                    agent = %self.name,
                    player = ctx.player,
                    phase = %ctx.phase,
                    error = %err,
                    "external request failed; falling back"
                );
                return self.fall_back(ctx, err.to_string());
            }
        };

        match Action::parse(ctx.phase, ctx.role, &reply) {
            Ok(action) => Ok(action),
            Err(err) => {
                event!(
                    target: "mafia_sim::external",
                    Level::WARN,
                    agent = %self.name,
                    player = ctx.player,
                    phase = %ctx.phase,
                    error = %err,
                    "invalid external reply; falling back"
                );
                self.fall_back(ctx, err.to_string())
            }
        }
    }
}

#[derive(Debug, Error)]
enum ExternalInvokeError {
    #[error("no command configured")]
    NoCommand,
    #[error("failed to spawn process: {0}")]
    Spawn(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("non-zero exit status: {0}")]
    Status(String),
    #[error("no reply within {0} ms")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia_bot::Phase;
    use mafia_core::belief::BeliefStore;
    use mafia_core::model::role::Role;

    fn options(command: Option<&str>, args: &[&str], fallback: ExternalFallback) -> ExternalOptions {
        ExternalOptions {
            command: command.map(str::to_string),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            working_dir: None,
            timeout_ms: None,
            fallback,
        }
    }

    fn slow_script() -> &'static str {
        r#"cat > /dev/null; sleep 2; echo '{"action":"mafia_vote","target":"Bob"}'"#
    }

    fn decide(provider: &mut ExternalProvider, phase: Phase, role: Role) -> Result<Action, DecisionError> {
        let alive = vec!["Alice".to_string(), "Bob".to_string(), "Carol".to_string()];
        let beliefs = BeliefStore::new("Alice", ["Alice", "Bob", "Carol"]);
        let ctx = DecisionContext {
            phase,
            player: "Alice",
            role,
            alive: &alive,
            beliefs: &beliefs,
            messages: &[],
            day: 1,
            night: 1,
        };
        provider.decide(&ctx)
    }

    #[test]
    fn missing_command_uses_heuristic_fallback() {
        let mut provider = ExternalProvider::new(
            "oracle".into(),
            options(Some("__mafia_sim_missing__"), &[], ExternalFallback::Heuristic),
            3,
        );
        let action = decide(&mut provider, Phase::Night, Role::Mafia).unwrap();
        assert!(action.fits(Phase::Night, Role::Mafia));
    }

    #[test]
    fn safe_default_fallback_surfaces_error() {
        let mut provider = ExternalProvider::new(
            "oracle".into(),
            options(None, &[], ExternalFallback::SafeDefault),
            3,
        );
        let err = decide(&mut provider, Phase::DayVote, Role::Doctor).unwrap_err();
        assert!(matches!(err, DecisionError::Provider(message) if message.contains("no command")));
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_reply_is_parsed() {
        let script = r#"cat > /dev/null; echo 'thinking... {"action":"mafia_vote","target":"Bob"}'"#;
        let mut provider = ExternalProvider::new(
            "shell".into(),
            options(Some("sh"), &["-c", script], ExternalFallback::SafeDefault),
            0,
        );
        let action = decide(&mut provider, Phase::Night, Role::Mafia).unwrap();
        assert_eq!(action, Action::MafiaVote("Bob".into()));
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_sees_request_json() {
        let script = r#"input=$(cat); case "$input" in *'"player_name":"Alice"'*) echo '{"target":"Carol"}';; esac"#;
        let mut provider = ExternalProvider::new(
            "shell".into(),
            options(Some("sh"), &["-c", script], ExternalFallback::SafeDefault),
            0,
        );
        let action = decide(&mut provider, Phase::DayVote, Role::Townsperson).unwrap();
        assert_eq!(action, Action::Vote("Carol".into()));
    }

    #[cfg(unix)]
    #[test]
    fn slow_subprocess_times_out_to_safe_default() {
        let mut opts = options(Some("sh"), &["-c", slow_script()], ExternalFallback::SafeDefault);
        opts.timeout_ms = Some(100);
        let mut provider = ExternalProvider::new("slow".into(), opts, 0);

        let start = Instant::now();
        let err = decide(&mut provider, Phase::Night, Role::Mafia).unwrap_err();
        assert!(start.elapsed() < Duration::from_millis(1500));
        assert!(matches!(err, DecisionError::Provider(message) if message.contains("100 ms")));
    }

    #[cfg(unix)]
    #[test]
    fn slow_subprocess_times_out_to_heuristic() {
        let mut opts = options(Some("sh"), &["-c", slow_script()], ExternalFallback::Heuristic);
        opts.timeout_ms = Some(100);
        let mut provider = ExternalProvider::new("slow".into(), opts, 5);

        let action = decide(&mut provider, Phase::DayVote, Role::Townsperson).unwrap();
        assert!(action.fits(Phase::DayVote, Role::Townsperson));
    }

    #[cfg(unix)]
    #[test]
    fn reply_within_timeout_is_kept() {
        let script = r#"cat > /dev/null; echo '{"action":"mafia_vote","target":"Carol"}'"#;
        let mut opts = options(Some("sh"), &["-c", script], ExternalFallback::SafeDefault);
        opts.timeout_ms = Some(5_000);
        let mut provider = ExternalProvider::new("quick".into(), opts, 0);

        let action = decide(&mut provider, Phase::Night, Role::Mafia).unwrap();
        assert_eq!(action, Action::MafiaVote("Carol".into()));
    }
}
