use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::{Engine, EngineCommand, Scenario};
use crate::engine_process::EngineProcess;
use crate::state::RawState;
use crate::transport::{warn_fallback, Framing, TransportError};

/// Who controls each seat of a Forge headless game.
///
/// "Human" seats are the ones driven through this adapter, the others are played by the
/// engine's own AI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerSetup {
    pub player1_is_human: bool,
    pub player2_is_human: bool,
}

impl PlayerSetup {
    pub fn new(player1_is_human: bool, player2_is_human: bool) -> PlayerSetup {
        PlayerSetup {
            player1_is_human,
            player2_is_human,
        }
    }

    /// Player 1 driven by the adapter, player 2 by the engine AI.
    pub fn agent_vs_ai() -> PlayerSetup {
        PlayerSetup::new(true, false)
    }

    /// Command line flags understood by `forge.view.ForgeHeadless`.
    pub fn flags(&self) -> Vec<&'static str> {
        match (self.player1_is_human, self.player2_is_human) {
            (false, false) => vec!["--both-ai"],
            (true, true) => vec!["--both-human"],
            (p1, p2) => {
                let mut flags = vec![];
                if !p1 {
                    flags.push("--p1-ai");
                }
                if p2 {
                    flags.push("--p2-human");
                }
                flags
            }
        }
    }
}

/// Launch and protocol settings for a [`ProcessEngine`].
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub command: String,
    pub args: Vec<String>,
    pub framing: Framing,
    /// Bound on every framed read.
    pub response_timeout: Duration,
    /// Pause after a fire-and-forget command before asking for the state.
    pub settle_delay: Duration,
    /// Pause after spawning, output produced meanwhile is discarded.
    pub startup_grace: Duration,
    /// How long the engine may take to exit after `concede` before being killed.
    pub shutdown_grace: Duration,
    /// Flag placed before the puzzle path of a scenario (the scenario is ignored if `None`).
    pub scenario_arg: Option<String>,
    pub allow_stderr: bool,
}

impl ProcessOptions {
    /// Any executable speaking the line protocol.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> ProcessOptions {
        ProcessOptions {
            command: command.into(),
            args,
            framing: Framing::Heuristic,
            response_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_millis(500),
            startup_grace: Duration::from_secs(3),
            shutdown_grace: Duration::from_millis(500),
            scenario_arg: None,
            allow_stderr: false,
        }
    }

    /// `java -Xmx4096m -cp <jar> forge.view.ForgeHeadless [flags]`.
    ///
    /// `java` is taken from `java_home/bin` when given, from `PATH` otherwise.
    pub fn forge(jar: &Path, java_home: Option<&Path>, players: PlayerSetup) -> ProcessOptions {
        let java = match java_home {
            Some(home) => home.join("bin").join("java").display().to_string(),
            None => "java".to_string(),
        };
        let mut args = vec![
            "-Xmx4096m".to_string(),
            "-cp".to_string(),
            jar.display().to_string(),
            "forge.view.ForgeHeadless".to_string(),
        ];
        args.extend(players.flags().into_iter().map(str::to_string));
        ProcessOptions::new(java, args)
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_scenario_arg(mut self, flag: impl Into<String>) -> Self {
        self.scenario_arg = Some(flag.into());
        self
    }

    pub fn with_allow_stderr(mut self, value: bool) -> Self {
        self.allow_stderr = value;
        self
    }
}

/// Locate the Forge desktop jar under `root`.
///
/// Looks for `forge-gui-desktop/target/forge-gui-desktop-*-jar-with-dependencies.jar`, and
/// falls back to the 2.0.07 snapshot name when nothing matches.
pub fn find_forge_jar(root: &Path) -> PathBuf {
    const PREFIX: &str = "forge-gui-desktop-";
    const SUFFIX: &str = "-jar-with-dependencies.jar";
    let target = root.join("forge-gui-desktop").join("target");

    let found = std::fs::read_dir(&target).ok().and_then(|entries| {
        let mut jars = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(PREFIX) && name.ends_with(SUFFIX))
            .collect::<Vec<_>>();
        jars.sort();
        jars.into_iter().next()
    });

    match found {
        Some(name) => target.join(name),
        None => target.join("forge-gui-desktop-2.0.07-SNAPSHOT-jar-with-dependencies.jar"),
    }
}

/// Engine running as a child process, driven over stdin/stdout.
///
/// Commands are fire-and-forget; after each one the state is rebuilt from a `get_state` and a
/// `possible_actions` query.
#[derive(Debug)]
pub struct ProcessEngine {
    options: ProcessOptions,
    process: Option<EngineProcess>,
}

impl ProcessEngine {
    pub fn new(options: ProcessOptions) -> ProcessEngine {
        ProcessEngine {
            options,
            process: None,
        }
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    fn launch_args(&self, scenario: Option<&Scenario>) -> Vec<String> {
        let mut args = self.options.args.clone();
        let puzzle = scenario.and_then(|s| s.puzzle_file.as_ref());
        match (puzzle, &self.options.scenario_arg) {
            (Some(path), Some(flag)) => {
                args.push(flag.clone());
                args.push(path.display().to_string());
            }
            (Some(path), None) => {
                warn!("engine has no scenario flag configured, ignoring {}", path.display());
            }
            (None, _) => {}
        }
        args
    }

    fn snapshot(&mut self) -> Result<RawState, TransportError> {
        let timeout = self.options.response_timeout;
        let process = self.process.as_mut().ok_or(TransportError::Closed)?;

        let state = process.request(&EngineCommand::GetState.to_string(), timeout)?;
        let mut state = RawState::new(state);

        match process.request(&EngineCommand::PossibleActions.to_string(), timeout) {
            Ok(actions) => state.set_actions(actions),
            Err(e) => {
                warn_fallback("could not read possible actions", &e, "an empty action list");
                state.set_actions(json!([]));
            }
        }
        Ok(state)
    }
}

impl Engine for ProcessEngine {
    #[instrument(skip_all, fields(command = %self.options.command))]
    fn reset(&mut self, scenario: Option<&Scenario>) -> Result<RawState, TransportError> {
        self.shutdown();

        let args = self.launch_args(scenario);
        let process = EngineProcess::launch(
            &self.options.command,
            &args,
            self.options.framing,
            self.options.allow_stderr,
        )
        .map_err(|e| TransportError::Connect(format!("{e:#}")))?;

        if !self.options.startup_grace.is_zero() {
            thread::sleep(self.options.startup_grace);
        }
        let discarded = process.drain().unwrap_or(0);
        debug!(discarded, "startup output discarded");
        self.process = Some(process);

        info!("engine ready");
        self.snapshot()
    }

    fn submit(&mut self, command: EngineCommand) -> Result<RawState, TransportError> {
        let process = self.process.as_mut().ok_or(TransportError::Closed)?;
        process.drain()?;
        process.send_line(&command.to_string())?;
        if !self.options.settle_delay.is_zero() {
            thread::sleep(self.options.settle_delay);
        }
        self.snapshot()
    }

    fn shutdown(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.shutdown(&EngineCommand::Concede.to_string(), self.options.shutdown_grace);
        }
    }
}

#[cfg(test)]
mod process_engine_tests {
    use super::*;

    #[test]
    fn test_player_flags() {
        assert_eq!(PlayerSetup::new(false, false).flags(), vec!["--both-ai"]);
        assert_eq!(PlayerSetup::new(true, true).flags(), vec!["--both-human"]);
        assert!(PlayerSetup::agent_vs_ai().flags().is_empty());
        assert_eq!(PlayerSetup::new(false, true).flags(), vec!["--p1-ai", "--p2-human"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_forge_command_line() {
        let options = ProcessOptions::forge(
            Path::new("/opt/forge.jar"),
            Some(Path::new("/usr/lib/jvm/java-17")),
            PlayerSetup::new(false, false),
        );
        assert_eq!(options.command, "/usr/lib/jvm/java-17/bin/java");
        assert_eq!(
            options.args,
            vec!["-Xmx4096m", "-cp", "/opt/forge.jar", "forge.view.ForgeHeadless", "--both-ai"]
        );
    }

    #[test]
    fn test_scenario_arguments() {
        let engine = ProcessEngine::new(
            ProcessOptions::new("engine", vec!["--headless".to_string()]).with_scenario_arg("--puzzle"),
        );
        let args = engine.launch_args(Some(&Scenario::puzzle("p.pzl")));
        assert_eq!(args, vec!["--headless", "--puzzle", "p.pzl"]);

        let engine = ProcessEngine::new(ProcessOptions::new("engine", vec![]));
        assert!(engine.launch_args(Some(&Scenario::puzzle("p.pzl"))).is_empty());
    }

    #[test]
    fn test_jar_fallback_name() {
        let jar = find_forge_jar(Path::new("/nonexistent"));
        assert!(jar.ends_with("forge-gui-desktop-2.0.07-SNAPSHOT-jar-with-dependencies.jar"));
    }

    #[test]
    fn test_submit_without_process() {
        let mut engine = ProcessEngine::new(ProcessOptions::new("engine", vec![]));
        let err = engine.submit(EngineCommand::PassPriority).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        engine.shutdown();
    }
}
