//! The automated episode loop: reset, then observe, decide and act until the episode ends.
//!
//! The runner owns nothing: the [`Environment`] and the [`DecisionSource`] are borrowed, so a
//! caller can inspect both afterwards. The environment is always closed when [`EpisodeRunner::run`]
//! returns, whatever the exit path.

use std::fmt::Display;
use std::path::PathBuf;

use tracing::{info, instrument, warn};

use crate::configuration::Configuration;
use crate::decision::{DecisionSource, OperatorAbort};
use crate::engine::{Engine, Scenario};
use crate::environment::{EnvError, Environment, EpisodeEnd};
use crate::observation::ActionDescriptor;
use crate::state::RawState;
use crate::transcript::GameLog;

/// Summary of a finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeOutcome {
    pub final_state: RawState,
    pub steps: usize,
    pub total_reward: f64,
    pub end: EpisodeEnd,
    /// Where the game log was written, if it was.
    pub transcript: Option<PathBuf>,
}

#[derive(Debug)]
pub enum RunnerError {
    Env(EnvError),
    Aborted(OperatorAbort),
}

impl Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::Env(e) => write!(f, "{e}"),
            RunnerError::Aborted(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Env(e) => Some(e),
            RunnerError::Aborted(e) => Some(e),
        }
    }
}

impl From<EnvError> for RunnerError {
    fn from(e: EnvError) -> Self {
        RunnerError::Env(e)
    }
}

impl From<OperatorAbort> for RunnerError {
    fn from(e: OperatorAbort) -> Self {
        RunnerError::Aborted(e)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EpisodeRunner {
    verbose: bool,
    transcript_dir: Option<PathBuf>,
}

impl EpisodeRunner {
    /// Quiet runner without transcript.
    pub fn new() -> EpisodeRunner {
        EpisodeRunner::default()
    }

    pub fn with_config(config: &Configuration) -> EpisodeRunner {
        EpisodeRunner {
            verbose: config.verbose,
            transcript_dir: config.transcript.then(|| config.output_dir.clone()),
        }
    }

    /// Print turn banners, actions and the final summary to stdout.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Write a game log into `dir` after each episode (`None` disables it).
    pub fn with_transcript_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.transcript_dir = dir;
        self
    }

    /// Play one episode.
    ///
    /// # Errors
    /// - [`RunnerError::Env`] if the engine could not start a game
    /// - [`RunnerError::Aborted`] if the operator quit; the engine is released first
    #[instrument(skip_all)]
    pub fn run<E, D>(
        &self,
        env: &mut Environment<E>,
        source: &mut D,
        scenario: Option<&Scenario>,
    ) -> Result<EpisodeOutcome, RunnerError>
    where
        E: Engine,
        D: DecisionSource + ?Sized,
    {
        let mut log = GameLog::new();
        if let Some(path) = scenario.and_then(|s| s.puzzle_file.as_ref()) {
            log.header_line("Puzzle", path.display());
        }
        log.header_line("Seat", env.seat());

        let result = self.play(env, source, scenario, &mut log);
        env.close();

        let transcript = self.save(&log);
        match result {
            Ok(mut outcome) => {
                outcome.transcript = transcript;
                if self.verbose {
                    print_summary(&outcome);
                }
                info!(
                    steps = outcome.steps,
                    total_reward = outcome.total_reward,
                    "episode finished: {}",
                    outcome.end
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!("episode interrupted: {e}");
                Err(e)
            }
        }
    }

    fn play<E, D>(
        &self,
        env: &mut Environment<E>,
        source: &mut D,
        scenario: Option<&Scenario>,
        log: &mut GameLog,
    ) -> Result<EpisodeOutcome, RunnerError>
    where
        E: Engine,
        D: DecisionSource + ?Sized,
    {
        let (_, info) = env.reset(scenario)?;
        if let Some(end) = info.end {
            log.note(format!("Result: {}", describe_result(&info.state)));
            return Ok(EpisodeOutcome {
                final_state: info.state,
                steps: 0,
                total_reward: 0.0,
                end,
                transcript: None,
            });
        }
        let mut total_reward = 0.0;

        loop {
            let Some(ctx) = env.decision_context() else {
                // only reachable if the environment was closed under our feet
                return Err(EnvError::NotRunning.into());
            };

            let turn = ctx.state.turn();
            if log.turn(turn) && self.verbose {
                print_turn_banner(turn, &ctx.observation.to_string());
            }
            let phase = ctx.state.text("phase", "UNKNOWN").to_string();
            let offered: Vec<ActionDescriptor> = ctx.actions.to_vec();

            // nothing to choose from, the environment ends the episode itself
            let index = match offered.is_empty() {
                true => 0,
                false => source.choose(&ctx)?,
            };
            let result = env.step(index)?;

            if let Some(action) = result.info.submitted.and_then(|i| offered.get(i)) {
                log.action(&phase, action);
                if self.verbose {
                    print_action(&phase, action);
                }
            }
            total_reward += result.reward;

            if let Some(end) = result.info.end {
                if end.is_anomaly() {
                    log.note(format!("!! {end}"));
                }
                log.note(format!("Result: {}", describe_result(&result.info.state)));
                return Ok(EpisodeOutcome {
                    final_state: result.info.state,
                    steps: result.info.step,
                    total_reward,
                    end,
                    transcript: None,
                });
            }
        }
    }

    fn save(&self, log: &GameLog) -> Option<PathBuf> {
        let dir = self.transcript_dir.as_ref()?;
        match log.write_to(dir) {
            Ok(path) => {
                info!("game log written to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("could not write game log: {e:#}");
                None
            }
        }
    }
}

/// `winner X | life A (name) / B (name)`, or `no winner` when the engine did not say.
pub fn describe_result(state: &RawState) -> String {
    let [p0, p1] = state.players();
    let winner = match state.winner() {
        Some(name) => format!("winner {name}"),
        None => "no winner".to_string(),
    };
    format!(
        "{winner} | life {} ({}) / {} ({})",
        p0.life(),
        p0.name().unwrap_or("player 1"),
        p1.life(),
        p1.name().unwrap_or("player 2"),
    )
}

fn print_turn_banner(turn: i64, observation: &str) {
    // bold cyan banner, default
    println!("\n\x1b[1;36m=== Turn {turn} ===\x1b[0m {observation}");
}

fn print_action(phase: &str, action: &ActionDescriptor) {
    // green phase, default
    println!("\x1b[32m[{phase}]\x1b[39m {action}");
}

fn print_summary(outcome: &EpisodeOutcome) {
    let color = if outcome.end.is_anomaly() { 31 } else { 32 };
    println!(
        "\n\x1b[{color}m{}\x1b[39m after {} steps, total reward {:.2}\n{}",
        outcome.end,
        outcome.steps,
        outcome.total_reward,
        describe_result(&outcome.final_state)
    );
    if let Some(path) = &outcome.transcript {
        println!("Game log: {}", path.display());
    }
}
