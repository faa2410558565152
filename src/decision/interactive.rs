use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::Input;
use tracing::{info, warn};

use super::{describe_actions, DecisionContext, DecisionSource, OperatorAbort};
use crate::observation::decision_payload;

/// What a line typed by the operator means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Choose(usize),
    /// Print the raw snapshot and ask again.
    DumpState,
    Quit,
    /// Not understood, the message says why. Ask again.
    Invalid(String),
}

/// Interpret one operator line against a list of `action_count` actions.
pub fn parse_operator_input(input: &str, action_count: usize) -> OperatorCommand {
    let input = input.trim();
    match input.to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => return OperatorCommand::Quit,
        "j" | "json" => return OperatorCommand::DumpState,
        _ => {}
    }
    match input.parse::<i64>() {
        Ok(index) if index >= 0 && (index as usize) < action_count => {
            OperatorCommand::Choose(index as usize)
        }
        Ok(_) if action_count == 0 => {
            OperatorCommand::Invalid("No actions available, enter 'q' to quit".to_string())
        }
        Ok(_) => OperatorCommand::Invalid(format!(
            "Invalid index. Must be 0-{}",
            action_count - 1
        )),
        Err(_) => OperatorCommand::Invalid("Please enter a number".to_string()),
    }
}

/// Where operator lines come from.
enum Prompt {
    /// Line editing through dialoguer.
    Terminal,
    /// Plain lines, for piped or scripted input.
    Lines(Box<dyn BufRead>),
}

/// A human at the terminal picks every action.
///
/// Shows the payload a policy would receive and the numbered action list, then loops on the
/// prompt until a valid index is entered. End of input counts as a quit.
///
/// When stdin is not a terminal the operator reads plain lines from it instead, so
/// `echo 1 | forge-gym --local-debug` plays action 1.
pub struct Operator {
    /// Print the full policy payload before each prompt.
    pub show_payload: bool,
    prompt: Prompt,
}

impl Operator {
    const PROMPT: &'static str = "Enter action index (or 'q' to quit, 'j' for raw JSON)";

    pub fn new(show_payload: bool) -> Operator {
        let stdin = io::stdin();
        let prompt = match stdin.is_terminal() {
            true => Prompt::Terminal,
            false => Prompt::Lines(Box::new(stdin.lock())),
        };
        Operator {
            show_payload,
            prompt,
        }
    }

    /// Operator answering from `reader`, one line per prompt.
    pub fn from_reader(show_payload: bool, reader: impl BufRead + 'static) -> Operator {
        Operator {
            show_payload,
            prompt: Prompt::Lines(Box::new(reader)),
        }
    }

    fn show(&self, ctx: &DecisionContext<'_>) {
        println!("\n{}", "=".repeat(60));
        println!("DECISION POINT | {}", ctx.observation);
        println!("{}", "=".repeat(60));
        if self.show_payload {
            let payload = decision_payload(ctx.state, ctx.actions, ctx.seat);
            match serde_json::to_string_pretty(&payload) {
                Ok(text) => println!("{text}"),
                Err(e) => warn!("cannot render payload: {e}"),
            }
        }
        println!("\nActions:\n{}", describe_actions(ctx.actions));
    }

    /// Next operator line, `None` at end of input.
    fn read_line(&mut self) -> Option<String> {
        match &mut self.prompt {
            Prompt::Terminal => match Input::<String>::new()
                .with_prompt(Self::PROMPT)
                .allow_empty(true)
                .report(false)
                .interact_text()
            {
                Ok(line) => Some(line),
                Err(e) => {
                    info!("operator input closed: {e}");
                    None
                }
            },
            Prompt::Lines(reader) => {
                print!("{}: ", Self::PROMPT);
                let _ = io::stdout().flush();
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => None,
                    Ok(_) => {
                        println!("{}", line.trim_end());
                        Some(line)
                    }
                    Err(e) => {
                        info!("operator input closed: {e}");
                        None
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prompt = match self.prompt {
            Prompt::Terminal => "terminal",
            Prompt::Lines(_) => "lines",
        };
        f.debug_struct("Operator")
            .field("show_payload", &self.show_payload)
            .field("prompt", &prompt)
            .finish()
    }
}

impl DecisionSource for Operator {
    fn choose(&mut self, ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort> {
        self.show(ctx);
        loop {
            let Some(line) = self.read_line() else {
                println!("\nEOF - quitting");
                return Err(OperatorAbort);
            };

            match parse_operator_input(&line, ctx.actions.len()) {
                OperatorCommand::Choose(index) => return Ok(index as i64),
                OperatorCommand::DumpState => match serde_json::to_string_pretty(ctx.state) {
                    Ok(text) => println!("{text}"),
                    Err(e) => warn!("cannot render state: {e}"),
                },
                OperatorCommand::Quit => {
                    println!("Quitting...");
                    return Err(OperatorAbort);
                }
                OperatorCommand::Invalid(message) => println!("{message}"),
            }
        }
    }
}
