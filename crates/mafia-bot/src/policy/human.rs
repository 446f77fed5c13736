use super::{DecisionContext, DecisionProvider};
use crate::action::{Action, DecisionError, Phase};
use mafia_core::belief::BeliefSummary;
use mafia_core::model::role::Role;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

/// Prompts a person on a line-oriented terminal.
///
/// A reply may be a JSON decision or a shorthand: free text for a day
/// message, a bare name for votes and night targets, an empty line to pass.
pub struct HumanProvider<R, W> {
    input: R,
    output: W,
}

impl HumanProvider<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> HumanProvider<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn prompt(&mut self, ctx: &DecisionContext) -> io::Result<()> {
        let summary = BeliefSummary::from_store(ctx.beliefs);
        writeln!(self.output)?;
        writeln!(
            self.output,
            "[{}] {} ({}), day {} night {}",
            ctx.phase, ctx.player, ctx.role, ctx.day, ctx.night
        )?;
        writeln!(self.output, "Alive: {}", ctx.alive.join(", "))?;
        writeln!(
            self.output,
            "You suspect {} and have confirmed {} Mafia.",
            summary.mafia_suspects, summary.confirmed_mafia
        )?;
        for line in ctx.messages {
            writeln!(self.output, "  {}: {}", line.speaker, line.text())?;
        }
        let hint = match (ctx.phase, ctx.role) {
            (Phase::DayMessage, _) => "Say something (empty to stay silent)",
            (Phase::DayVote, _) => "Vote to eliminate (empty for no vote)",
            (Phase::Night, Role::Mafia) => "Choose a target to kill",
            (Phase::Night, Role::Doctor) => "Choose a player to save",
            (Phase::Night, Role::Detective) => "Choose a player to investigate",
            (Phase::Night, Role::Townsperson) => "Nothing to do tonight, press enter",
        };
        write!(self.output, "{hint}> ")?;
        self.output.flush()
    }
}

impl<R, W> DecisionProvider for HumanProvider<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn decide(&mut self, ctx: &DecisionContext) -> Result<Action, DecisionError> {
        self.prompt(ctx)
            .map_err(|err| DecisionError::Provider(err.to_string()))?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|err| DecisionError::Provider(err.to_string()))?;
        if read == 0 {
            return Err(DecisionError::Provider("input closed".to_string()));
        }
        interpret(ctx, line.trim())
    }
}

fn interpret(ctx: &DecisionContext, reply: &str) -> Result<Action, DecisionError> {
    if reply.starts_with('{') {
        return Action::parse(ctx.phase, ctx.role, reply);
    }
    if reply.is_empty() {
        return Ok(Action::safe_default(ctx.phase));
    }
    let target = reply.to_string();
    let action = match (ctx.phase, ctx.role) {
        (Phase::DayMessage, _) => Action::PostMessage(target),
        (Phase::DayVote, _) => Action::Vote(target),
        (Phase::Night, Role::Mafia) => Action::MafiaVote(target),
        (Phase::Night, Role::Doctor) => Action::DoctorSave(target),
        (Phase::Night, Role::Detective) => Action::CheckAlignment(target),
        (Phase::Night, Role::Townsperson) => Action::NoAction,
    };
    Ok(action)
}
