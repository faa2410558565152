//! Reset/step interface over an [`Engine`].
//!
//! An [`Environment`] goes through three states:
//! - idle: created, or the last reset failed
//! - running: a game is in progress, [`Environment::step`] is allowed
//! - done: the episode ended (terminated or truncated), only a new reset is allowed
//!
//! Every transport failure during a step is absorbed: the step still returns, with an empty
//! state and the episode truncated as [`EpisodeEnd::EngineLost`].

use std::fmt::Display;

use tracing::{error, info, instrument, warn};

use crate::configuration::Configuration;
use crate::decision::DecisionContext;
use crate::engine::{Engine, EngineCommand, Scenario};
use crate::observation::{normalize, normalize_actions, ActionDescriptor, Observation};
use crate::reward::RewardMode;
use crate::state::RawState;
use crate::transport::{warn_fallback, TransportError};

/// Why an episode stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeEnd {
    /// The engine reported game over, or a life total reached zero.
    GameOver,
    /// The step ceiling was reached.
    StepLimit,
    /// The game reached the maximum turn.
    TurnLimit,
    /// The engine offered no action while the game was not over.
    NoActions,
    /// The engine stopped answering.
    EngineLost,
}

impl EpisodeEnd {
    /// True for ends that indicate something wrong with the engine rather than a game result.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, EpisodeEnd::NoActions | EpisodeEnd::EngineLost)
    }
}

impl Display for EpisodeEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpisodeEnd::GameOver => write!(f, "game over"),
            EpisodeEnd::StepLimit => write!(f, "step limit reached"),
            EpisodeEnd::TurnLimit => write!(f, "turn limit reached"),
            EpisodeEnd::NoActions => write!(f, "protocol anomaly: no actions available"),
            EpisodeEnd::EngineLost => write!(f, "engine lost"),
        }
    }
}

#[derive(Debug)]
pub enum EnvError {
    /// `step` called before a successful reset or after the episode ended.
    NotRunning,
    /// The engine could not start a game.
    Reset(TransportError),
}

impl Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvError::NotRunning => write!(f, "no episode running, call reset first"),
            EnvError::Reset(e) => write!(f, "engine failed to start a game: {e}"),
        }
    }
}

impl std::error::Error for EnvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnvError::NotRunning => None,
            EnvError::Reset(e) => Some(e),
        }
    }
}

/// Side information of a reset or a step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    pub state: RawState,
    /// Actions available now, for the next step.
    pub actions: Vec<ActionDescriptor>,
    /// Index actually sent to the engine.
    pub submitted: Option<usize>,
    /// Index the caller asked for.
    pub requested: Option<i64>,
    /// Steps taken so far in this episode.
    pub step: usize,
    pub end: Option<EpisodeEnd>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

impl StepResult {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Idle,
    Running,
    Done,
}

/// A game session seen as an RL environment.
///
/// Owns the engine: the engine is shut down on [`Environment::close`], before each reset, and
/// on drop.
#[derive(Debug)]
pub struct Environment<E: Engine> {
    engine: E,
    seat: usize,
    reward: RewardMode,
    max_steps: usize,
    max_turns: i64,
    status: Status,
    live: bool,
    state: RawState,
    actions: Vec<ActionDescriptor>,
    observation: Option<Observation>,
    steps: usize,
}

impl<E: Engine> Environment<E> {
    pub const DEFAULT_MAX_STEPS: usize = 500;
    pub const DEFAULT_MAX_TURNS: i64 = 100;

    pub fn new(engine: E) -> Environment<E> {
        Environment {
            engine,
            seat: 0,
            reward: RewardMode::Dense,
            max_steps: Self::DEFAULT_MAX_STEPS,
            max_turns: Self::DEFAULT_MAX_TURNS,
            status: Status::Idle,
            live: false,
            state: RawState::empty(),
            actions: vec![],
            observation: None,
            steps: 0,
        }
    }

    /// Seat, reward and budgets taken from `config`.
    pub fn with_config(engine: E, config: &Configuration) -> Environment<E> {
        Environment::new(engine)
            .with_seat(config.seat)
            .with_reward(config.reward.clone())
            .with_max_steps(config.max_steps)
            .with_max_turns(config.max_turns)
    }

    pub fn with_seat(mut self, seat: usize) -> Self {
        self.seat = seat.min(1);
        self
    }

    pub fn with_reward(mut self, reward: RewardMode) -> Self {
        self.reward = reward;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_turns(mut self, max_turns: i64) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn seat(&self) -> usize {
        self.seat
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn state(&self) -> &RawState {
        &self.state
    }

    pub fn actions(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    /// Latest observation, `None` before the first reset.
    pub fn observation(&self) -> Option<&Observation> {
        self.observation.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// What a decision source needs for the current step, `None` unless running.
    pub fn decision_context(&self) -> Option<DecisionContext<'_>> {
        if !self.is_running() {
            return None;
        }
        let observation = self.observation.as_ref()?;
        Some(DecisionContext {
            observation,
            actions: &self.actions,
            state: &self.state,
            seat: self.seat,
        })
    }

    /// Start a new episode, releasing the previous engine session first.
    ///
    /// If the first state is already over, the returned info carries
    /// [`EpisodeEnd::GameOver`] and no step is allowed.
    ///
    /// # Error
    /// [`EnvError::Reset`] if the engine does not produce a first state. The environment is
    /// then idle and the engine released.
    #[instrument(skip_all, fields(seat = self.seat))]
    pub fn reset(&mut self, scenario: Option<&Scenario>) -> Result<(Observation, StepInfo), EnvError> {
        self.close();

        self.live = true;
        let state = match self.engine.reset(scenario) {
            Ok(state) => state,
            Err(e) => {
                error!("reset failed: {e}");
                self.close();
                self.status = Status::Idle;
                return Err(EnvError::Reset(e));
            }
        };

        let observation = normalize(&state);
        self.actions = normalize_actions(&state);
        self.state = state;
        self.observation = Some(observation);
        self.steps = 0;

        // the first state may already be decided
        let end = (observation.game_over || observation.life_depleted()).then_some(EpisodeEnd::GameOver);
        if let Some(end) = end {
            self.status = Status::Done;
            info!("episode ended at reset: {end}");
        } else {
            self.status = Status::Running;
            info!(actions = self.actions.len(), "episode started: {observation}");
        }

        let info = StepInfo {
            state: self.state.clone(),
            actions: self.actions.clone(),
            submitted: None,
            requested: None,
            step: 0,
            end,
        };
        Ok((observation, info))
    }

    /// Play the action at `index` in the current action list.
    ///
    /// An index outside `0..N` is replaced by 0. An empty action list ends the episode with
    /// [`EpisodeEnd::NoActions`] without contacting the engine.
    pub fn step(&mut self, index: i64) -> Result<StepResult, EnvError> {
        if !self.is_running() {
            return Err(EnvError::NotRunning);
        }
        if self.actions.is_empty() {
            return Ok(self.end_without_actions(index));
        }
        let submitted = self.validate_index(index);
        self.advance(EngineCommand::PlayAction(submitted), Some(index))
    }

    /// Submit an engine command (e.g. [`EngineCommand::PassPriority`]) with the same
    /// bookkeeping as [`Environment::step`]. [`EngineCommand::PlayAction`] goes through
    /// [`Environment::step`], so its index is checked the same way.
    pub fn step_command(&mut self, command: EngineCommand) -> Result<StepResult, EnvError> {
        match command {
            EngineCommand::PlayAction(index) => self.step(i64::try_from(index).unwrap_or(-1)),
            _ if !self.is_running() => Err(EnvError::NotRunning),
            _ => self.advance(command, None),
        }
    }

    /// Release the engine session. Never fails, and the engine is only told once.
    pub fn close(&mut self) {
        if self.status == Status::Running {
            self.status = Status::Done;
        }
        if self.live {
            self.live = false;
            self.engine.shutdown();
            info!("engine released");
        }
    }

    fn validate_index(&self, index: i64) -> usize {
        match usize::try_from(index) {
            Ok(i) if i < self.actions.len() => i,
            _ => {
                warn!(
                    requested = index,
                    available = self.actions.len(),
                    "action index out of range, submitting 0 instead"
                );
                0
            }
        }
    }

    fn end_without_actions(&mut self, requested: i64) -> StepResult {
        let observation = normalize(&self.state);
        let terminated = observation.game_over || observation.life_depleted();
        let end = if terminated {
            EpisodeEnd::GameOver
        } else {
            warn!(turn = observation.turn, "protocol anomaly: no actions while the game is not over");
            EpisodeEnd::NoActions
        };
        self.status = Status::Done;

        StepResult {
            observation,
            reward: 0.0,
            terminated,
            truncated: !terminated,
            info: StepInfo {
                state: self.state.clone(),
                actions: vec![],
                submitted: None,
                requested: Some(requested),
                step: self.steps,
                end: Some(end),
            },
        }
    }

    fn advance(&mut self, command: EngineCommand, requested: Option<i64>) -> Result<StepResult, EnvError> {
        let (state, lost) = match self.engine.submit(command) {
            Ok(state) => (state, false),
            Err(e) => {
                warn_fallback(&format!("no answer to '{command}'"), &e, "an empty state");
                (RawState::empty(), true)
            }
        };
        self.steps += 1;

        let observation = normalize(&state);
        let reward = if lost {
            0.0
        } else {
            self.reward
                .compute(self.observation.as_ref(), &observation, self.seat)
        };
        let terminated = !lost && (observation.game_over || observation.life_depleted());
        let end = if terminated {
            Some(EpisodeEnd::GameOver)
        } else if lost {
            Some(EpisodeEnd::EngineLost)
        } else if self.steps >= self.max_steps {
            Some(EpisodeEnd::StepLimit)
        } else if observation.turn >= self.max_turns {
            Some(EpisodeEnd::TurnLimit)
        } else {
            None
        };
        let truncated = end.is_some() && !terminated;

        self.observation = Some(observation);
        self.actions = normalize_actions(&state);
        self.state = state;
        if let Some(end) = end {
            self.status = Status::Done;
            info!(steps = self.steps, "episode ended: {end}");
        }

        let submitted = match command {
            EngineCommand::PlayAction(index) => Some(index),
            _ => None,
        };
        Ok(StepResult {
            observation,
            reward,
            terminated,
            truncated,
            info: StepInfo {
                state: self.state.clone(),
                actions: self.actions.clone(),
                submitted,
                requested,
                step: self.steps,
                end,
            },
        })
    }
}

impl<E: Engine> Drop for Environment<E> {
    fn drop(&mut self) {
        self.close();
    }
}
