//! Config for the adapter behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`]. The CLI starts from the
//! environment and applies its flags on top with the `with_*` setters.
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive, set them to `"true"` to enable them.
//! Values that cannot be parsed are ignored (the default is kept).
//!
//! - `FORGE_ENGINE_URL` — Base URL of the engine HTTP server (default: `http://localhost:8080`)
//! - `FORGE_POLICY_URL` — Policy server endpoint (default: `http://localhost:5005`)
//! - `FORGE_MAX_STEPS` — Safety ceiling on steps per episode (default: `500`)
//! - `FORGE_MAX_TURNS` — Episode is truncated once the game reaches this turn (default: `100`)
//! - `FORGE_SEAT` — Which player the agent is, `0` or `1` (default: `0`)
//! - `FORGE_REWARD` — `dense` or `sparse` (default: `dense`)
//! - `FORGE_LOG` — Enable logging to a file (default: `false`)
//! - `FORGE_VERBOSE` — Print turn banners and actions to stdout (default: `true`)
//! - `FORGE_TRANSCRIPT` — Write a game log file after each episode (default: `true`)
//! - `FORGE_STATE_TIMEOUT_MS` — Timeout of engine requests (default: `30000`)
//! - `FORGE_POLICY_TIMEOUT_MS` — Timeout of policy requests (default: `300000`)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::reward::RewardMode;

/// Configuration for adapter behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) engine_url: String,
    pub(crate) policy_url: String,
    pub(crate) max_steps: usize,
    pub(crate) max_turns: i64,
    pub(crate) seat: usize,
    pub(crate) reward: RewardMode,
    pub(crate) log: bool,
    pub(crate) verbose: bool,
    pub(crate) transcript: bool,
    pub(crate) output_dir: PathBuf,
    pub(crate) state_timeout: Duration,
    pub(crate) policy_timeout: Duration,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The engine is expected at `http://localhost:8080` and the policy at
    ///   `http://localhost:5005`.
    /// - An episode is cut after 500 steps or at turn 100.
    /// - The agent plays the first seat with the dense reward.
    /// - Progress is printed to stdout and a transcript is written to the current directory.
    /// - Logging to file is disabled.
    pub fn new() -> Self {
        Self {
            engine_url: "http://localhost:8080".to_string(),
            policy_url: "http://localhost:5005".to_string(),
            max_steps: 500,
            max_turns: 100,
            seat: 0,
            reward: RewardMode::Dense,
            log: false,
            verbose: true,
            transcript: true,
            output_dir: PathBuf::from("."),
            state_timeout: Duration::from_secs(30),
            policy_timeout: Duration::from_secs(300),
        }
    }

    /// Create configuration from environment variables, see the module documentation for the
    /// list of recognized variables.
    ///
    /// Any other value (including unset) will result in using the default value for each field.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_value<T: FromStr>(var: &str, default: T) -> T {
            std::env::var(var)
                .ok()
                .and_then(|val| val.trim().parse().ok())
                .unwrap_or(default)
        }

        let default = Self::new();
        Self {
            engine_url: get_env_value("FORGE_ENGINE_URL", default.engine_url),
            policy_url: get_env_value("FORGE_POLICY_URL", default.policy_url),
            max_steps: get_env_value("FORGE_MAX_STEPS", default.max_steps),
            max_turns: get_env_value("FORGE_MAX_TURNS", default.max_turns),
            seat: get_env_value("FORGE_SEAT", default.seat).min(1),
            reward: get_env_value("FORGE_REWARD", default.reward),
            log: get_env_flag("FORGE_LOG", default.log),
            verbose: get_env_flag("FORGE_VERBOSE", default.verbose),
            transcript: get_env_flag("FORGE_TRANSCRIPT", default.transcript),
            output_dir: default.output_dir,
            state_timeout: Duration::from_millis(get_env_value(
                "FORGE_STATE_TIMEOUT_MS",
                default.state_timeout.as_millis() as u64,
            )),
            policy_timeout: Duration::from_millis(get_env_value(
                "FORGE_POLICY_TIMEOUT_MS",
                default.policy_timeout.as_millis() as u64,
            )),
        }
    }

    pub fn with_engine_url(mut self, url: impl Into<String>) -> Self {
        self.engine_url = url.into();
        self
    }

    pub fn with_policy_url(mut self, url: impl Into<String>) -> Self {
        self.policy_url = url.into();
        self
    }

    /// Safety ceiling: the episode is truncated after this many steps, game over or not.
    pub fn with_max_steps(mut self, value: usize) -> Self {
        self.max_steps = value;
        self
    }

    pub fn with_max_turns(mut self, value: i64) -> Self {
        self.max_turns = value;
        self
    }

    /// Which player the agent is (0 or 1, anything above is clamped to 1).
    pub fn with_seat(mut self, seat: usize) -> Self {
        self.seat = seat.min(1);
        self
    }

    pub fn with_reward(mut self, reward: RewardMode) -> Self {
        self.reward = reward;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable silent mode.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable the per-episode game log file.
    pub fn with_transcript(mut self, value: bool) -> Self {
        self.transcript = value;
        self
    }

    /// Directory receiving log and transcript files.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_state_timeout(mut self, timeout: Duration) -> Self {
        self.state_timeout = timeout;
        self
    }

    pub fn with_policy_timeout(mut self, timeout: Duration) -> Self {
        self.policy_timeout = timeout;
        self
    }

    pub fn engine_url(&self) -> &str {
        &self.engine_url
    }

    pub fn policy_url(&self) -> &str {
        &self.policy_url
    }

    pub fn state_timeout(&self) -> Duration {
        self.state_timeout
    }

    pub fn policy_timeout(&self) -> Duration {
        self.policy_timeout
    }

    pub fn log(&self) -> bool {
        self.log
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
