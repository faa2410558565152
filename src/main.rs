use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use forge_gym::logger::{init_console_logger, init_logger};
use forge_gym::prelude::*;
use forge_gym::transport::Framing;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RewardArg {
    Dense,
    Sparse,
}

#[derive(Parser, Debug)]
#[command(
    name = "forge-gym",
    version,
    about = "Play one Forge game with a policy server or a human operator"
)]
struct Args {
    /// Puzzle file loaded by the engine at reset
    puzzle: Option<PathBuf>,

    /// Pick every action at the terminal instead of asking the policy server
    #[arg(long)]
    local_debug: bool,

    #[arg(long)]
    engine_url: Option<String>,

    #[arg(long)]
    policy_url: Option<String>,

    #[arg(long)]
    max_steps: Option<usize>,

    #[arg(long)]
    max_turns: Option<i64>,

    #[arg(long, value_enum)]
    reward: Option<RewardArg>,

    /// Player controlled by the agent (0 or 1)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    seat: Option<u8>,

    /// Write a trace log file to the output directory
    #[arg(long)]
    log: bool,

    #[arg(long)]
    no_transcript: bool,

    #[arg(long)]
    quiet: bool,

    /// Directory for the game log and trace log files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Spawn the engine and talk over its stdin/stdout instead of HTTP
    #[arg(long)]
    process: bool,

    /// Forge desktop jar (found under --forge-root when omitted)
    #[arg(long, requires = "process")]
    jar: Option<PathBuf>,

    #[arg(long, requires = "process")]
    java_home: Option<PathBuf>,

    #[arg(long, default_value = ".")]
    forge_root: PathBuf,

    /// Engine prints one JSON document per line
    #[arg(long, requires = "process")]
    json_lines: bool,
}

impl Args {
    fn configuration(&self) -> Configuration {
        let mut config = Configuration::from_env();
        if let Some(url) = &self.engine_url {
            config = config.with_engine_url(url.clone());
        }
        if let Some(url) = &self.policy_url {
            config = config.with_policy_url(url.clone());
        }
        if let Some(max_steps) = self.max_steps {
            config = config.with_max_steps(max_steps);
        }
        if let Some(max_turns) = self.max_turns {
            config = config.with_max_turns(max_turns);
        }
        match self.reward {
            Some(RewardArg::Dense) => config = config.with_reward(RewardMode::Dense),
            Some(RewardArg::Sparse) => config = config.with_reward(RewardMode::Sparse),
            None => {}
        }
        if let Some(seat) = self.seat {
            config = config.with_seat(seat as usize);
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir.clone());
        }
        if self.log {
            config = config.with_log(true);
        }
        if self.no_transcript {
            config = config.with_transcript(false);
        }
        if self.quiet {
            config = config.with_verbose(false);
        }
        config
    }

    fn engine(&self, config: &Configuration) -> anyhow::Result<Box<dyn Engine>> {
        if !self.process {
            let engine = HttpEngine::new(config.engine_url(), config.state_timeout())
                .context("cannot create engine client")?;
            return Ok(Box::new(engine));
        }

        let jar = match &self.jar {
            Some(jar) => jar.clone(),
            None => find_forge_jar(&self.forge_root),
        };
        let players = match self.seat.unwrap_or(0) {
            0 => PlayerSetup::agent_vs_ai(),
            _ => PlayerSetup::new(false, true),
        };
        let framing = if self.json_lines {
            Framing::JsonLines
        } else {
            Framing::Heuristic
        };
        let options = ProcessOptions::forge(&jar, self.java_home.as_deref(), players)
            .with_framing(framing)
            .with_allow_stderr(self.log);
        Ok(Box::new(ProcessEngine::new(options)))
    }

    fn decision_source(&self, config: &Configuration) -> anyhow::Result<Box<dyn DecisionSource>> {
        if self.local_debug {
            return Ok(Box::new(Operator::new(true)));
        }
        let policy = RemotePolicy::new(config.policy_url(), config.policy_timeout())
            .context("cannot create policy client")?;
        Ok(Box::new(policy))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.configuration();

    if config.log() {
        let path = init_logger(config.output_dir())?;
        println!("Logging to {}", path.display());
    } else {
        init_console_logger()?;
    }
    info!(?config, ?args);

    let mut source = args.decision_source(&config)?;
    let mut env = Environment::with_config(args.engine(&config)?, &config);
    let scenario = args.puzzle.clone().map(Scenario::puzzle);

    match EpisodeRunner::with_config(&config).run(&mut env, &mut source, scenario.as_ref()) {
        Ok(_) => Ok(()),
        // the runner already released the engine
        Err(RunnerError::Aborted(_)) => Ok(()),
        Err(e) => Err(e).context("episode failed"),
    }
}
