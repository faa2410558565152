//! Traits and types describing the external engine the environment drives.
//!
//! The engine owns every game rule. From the adapter's point of view it only:
//! - starts a game (optionally from a scenario) and returns a snapshot
//! - accepts a command and returns the snapshot that follows
//! - can be asked to go away
//!
//! [`HttpEngine`] talks to an already running headless server, [`ProcessEngine`] spawns the
//! engine as a child process and talks over its stdin/stdout.

use std::fmt::Display;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::state::RawState;
use crate::transport::TransportError;

mod http_engine;
mod process_engine;

pub use http_engine::HttpEngine;
pub use process_engine::{find_forge_jar, PlayerSetup, ProcessEngine, ProcessOptions};

/// A command of the engine's line protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    GetState,
    PossibleActions,
    PlayAction(usize),
    PassPriority,
    Concede,
}

impl Display for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::GetState => write!(f, "get_state"),
            EngineCommand::PossibleActions => write!(f, "possible_actions"),
            EngineCommand::PlayAction(index) => write!(f, "play_action {index}"),
            EngineCommand::PassPriority => write!(f, "pass_priority"),
            EngineCommand::Concede => write!(f, "concede"),
        }
    }
}

/// Options sent along with a reset, e.g. a puzzle file to load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    pub puzzle_file: Option<PathBuf>,
    /// Anything else the engine understands, passed through untouched.
    pub options: Map<String, Value>,
}

impl Scenario {
    pub fn puzzle(path: impl Into<PathBuf>) -> Scenario {
        Scenario {
            puzzle_file: Some(path.into()),
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Scenario {
        self.options.insert(key.into(), value);
        self
    }

    /// JSON object form: `{"puzzle_file": "...", ...options}`.
    pub fn to_json(&self) -> Value {
        let mut obj = self.options.clone();
        if let Some(path) = &self.puzzle_file {
            obj.insert(
                "puzzle_file".to_string(),
                Value::String(path.display().to_string()),
            );
        }
        Value::Object(obj)
    }
}

/// What an engine session must implement.
///
/// Every returned [`RawState`] must carry the current action list under
/// `possible_actions.actions` when the engine reports one.
pub trait Engine {
    /// Start a new game, dropping any previous one, and return the first snapshot.
    ///
    /// # Error
    /// Returned when the engine cannot be started or does not answer.
    fn reset(&mut self, scenario: Option<&Scenario>) -> Result<RawState, TransportError>;

    /// Submit `command` and return the snapshot that follows it.
    fn submit(&mut self, command: EngineCommand) -> Result<RawState, TransportError>;

    /// Best-effort release of the engine (concede, then stop). Must never panic, even if the
    /// engine is already gone.
    fn shutdown(&mut self);
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn reset(&mut self, scenario: Option<&Scenario>) -> Result<RawState, TransportError> {
        (**self).reset(scenario)
    }

    fn submit(&mut self, command: EngineCommand) -> Result<RawState, TransportError> {
        (**self).submit(command)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

#[cfg(test)]
mod interface_tests {
    use serde_json::json;

    use super::*;

    struct DummyEngine {
        shutdowns: usize,
    }

    impl Engine for DummyEngine {
        fn reset(&mut self, _scenario: Option<&Scenario>) -> Result<RawState, TransportError> {
            Ok(RawState::new(json!({"turn": 1})))
        }

        fn submit(&mut self, _command: EngineCommand) -> Result<RawState, TransportError> {
            Err(TransportError::Closed)
        }

        fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    #[test]
    fn test_dyn_engine() {
        let mut engine: Box<dyn Engine> = Box::new(DummyEngine { shutdowns: 0 });
        assert_eq!(engine.reset(None).unwrap().turn(), 1);
        assert!(engine.submit(EngineCommand::PassPriority).is_err());
        engine.shutdown();
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(EngineCommand::GetState.to_string(), "get_state");
        assert_eq!(EngineCommand::PossibleActions.to_string(), "possible_actions");
        assert_eq!(EngineCommand::PlayAction(7).to_string(), "play_action 7");
        assert_eq!(EngineCommand::PassPriority.to_string(), "pass_priority");
        assert_eq!(EngineCommand::Concede.to_string(), "concede");
    }

    #[test]
    fn test_scenario_json() {
        assert_eq!(Scenario::default().to_json(), json!({}));
        let scenario = Scenario::puzzle("puzzles/PS_GRN1.pzl").with_option("seed", json!(42));
        assert_eq!(
            scenario.to_json(),
            json!({"puzzle_file": "puzzles/PS_GRN1.pzl", "seed": 42})
        );
    }
}
