//! # Forge Gym
//!
//! A thin adapter exposing the Forge headless card game engine as a reset/step reinforcement
//! learning environment.
//!
//! The engine owns every rule of the game. This crate only:
//! - starts and stops the engine (a child process over stdin/stdout, or an HTTP server)
//! - turns its JSON snapshots into fixed-shape [`Observation`](crate::observation::Observation)s
//!   and indexed action lists
//! - computes a reward from consecutive observations (`Dense`, `Sparse` or custom)
//! - asks a [`DecisionSource`](crate::decision::DecisionSource) for an action index and relays
//!   it to the engine
//!
//! # Documentation Overview
//!
//! - For the reset/step interface, termination and truncation rules, see
//!   [`Environment`](crate::environment::Environment).
//! - For the ready-made episode loop and the game log, see
//!   [`EpisodeRunner`](crate::runner::EpisodeRunner) and [`transcript`].
//! - For talking to the engine, see the [`Engine`](crate::engine::Engine) trait and its two
//!   implementations, [`HttpEngine`](crate::engine::HttpEngine) and
//!   [`ProcessEngine`](crate::engine::ProcessEngine).
//! - For who picks the actions, see [`decision`]: a remote policy server, a human operator, or
//!   any closure.
//! - For tuning, see [`Configuration`](crate::configuration::Configuration), which can also be
//!   read from `FORGE_*` environment variables.
//!
//! Transport failures never crash an episode: they are replaced by a safe default (an empty
//! state, action 0) and reported loudly on stderr.
//!
//! # Usage Example
//!
//! Play one episode against an engine server, always picking the last offered action:
//!
//! ```no_run
//! use forge_gym::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::from_env().with_max_steps(200);
//!
//!     let engine = HttpEngine::new(config.engine_url(), config.state_timeout())?;
//!     let mut env = Environment::with_config(engine, &config);
//!
//!     let mut source = from_fn(|ctx: &DecisionContext<'_>| ctx.actions.len() as i64 - 1);
//!     let outcome = EpisodeRunner::with_config(&config).run(
//!         &mut env,
//!         &mut source,
//!         Some(&Scenario::puzzle("puzzles/PS_GRN1.pzl")),
//!     )?;
//!
//!     println!("{} after {} steps: {:.2}", outcome.end, outcome.steps, outcome.total_reward);
//!     Ok(())
//! }
//! ```
//!
//! # Manual stepping
//!
//! ```no_run
//! use forge_gym::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = ProcessEngine::new(ProcessOptions::forge(
//!         &find_forge_jar(std::path::Path::new(".")),
//!         None,
//!         PlayerSetup::agent_vs_ai(),
//!     ));
//!     let mut env = Environment::new(engine).with_reward(RewardMode::Sparse);
//!
//!     let (mut observation, mut info) = env.reset(None)?;
//!     loop {
//!         // prefer anything but passing
//!         let index = info.actions.iter().position(|a| !a.is_pass()).unwrap_or(0);
//!         let result = env.step(index as i64)?;
//!         observation = result.observation;
//!         info = result.info;
//!         if result.terminated || result.truncated {
//!             break;
//!         }
//!     }
//!     println!("final: {observation}");
//!     env.close();
//!     Ok(())
//! }
//! ```

pub use anyhow;
pub mod configuration;
pub mod decision;
pub mod engine;
pub mod engine_process;
pub mod environment;
pub mod logger;
pub mod observation;
pub mod reward;
pub mod runner;
pub mod state;
pub mod transcript;
pub mod transport;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use forge_gym::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::decision::{
        from_fn, DecisionContext, DecisionSource, FirstAction, Operator, OperatorAbort,
        RemotePolicy,
    };
    pub use crate::engine::{
        find_forge_jar, Engine, EngineCommand, HttpEngine, PlayerSetup, ProcessEngine,
        ProcessOptions, Scenario,
    };
    pub use crate::environment::{EnvError, Environment, EpisodeEnd, StepInfo, StepResult};
    pub use crate::observation::{ActionDescriptor, Observation};
    pub use crate::reward::RewardMode;
    pub use crate::runner::{EpisodeOutcome, EpisodeRunner, RunnerError};
    pub use crate::state::RawState;
}
