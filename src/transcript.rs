//! Plain-text record of one episode.
//!
//! ```text
//! Forge game log
//! Started: 2025-03-02 18:40:11
//! Puzzle: puzzles/PS_GRN1.pzl
//!
//! === Turn 1 ===
//! [MAIN1] play_land: Forest
//! [MAIN1] Pass priority
//! ...
//! ```

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use time::{format_description, OffsetDateTime};

use crate::observation::ActionDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLog {
    header: Vec<String>,
    entries: Vec<String>,
    last_turn: Option<i64>,
}

impl GameLog {
    pub fn new() -> GameLog {
        let mut header = vec!["Forge game log".to_string()];
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        if let Ok(started) = format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
            .map_err(|e| e.to_string())
            .and_then(|format| now.format(&format).map_err(|e| e.to_string()))
        {
            header.push(format!("Started: {started}"));
        }
        GameLog {
            header,
            entries: vec![],
            last_turn: None,
        }
    }

    /// Add a `key: value` line to the header.
    pub fn header_line(&mut self, key: &str, value: impl std::fmt::Display) {
        self.header.push(format!("{key}: {value}"));
    }

    /// Record a turn boundary. Repeated calls for the same turn add nothing.
    pub fn turn(&mut self, turn: i64) -> bool {
        if self.last_turn == Some(turn) {
            return false;
        }
        self.last_turn = Some(turn);
        self.entries.push(format!("=== Turn {turn} ==="));
        true
    }

    pub fn action(&mut self, phase: &str, action: &ActionDescriptor) {
        let line = if action.is_pass() {
            format!("[{phase}] Pass priority")
        } else {
            match &action.card_name {
                Some(card) => format!("[{phase}] {}: {card}", action.kind),
                None => format!("[{phase}] {}", action.kind),
            }
        };
        self.entries.push(line);
    }

    /// Free-form line, used for anomalies and the final result.
    pub fn note(&mut self, text: impl Into<String>) {
        self.entries.push(text.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn render(&self) -> String {
        let mut text = self.header.join("\n");
        text.push_str("\n\n");
        for entry in &self.entries {
            text.push_str(entry);
            text.push('\n');
        }
        text
    }

    /// Write the log to `dir/game_log_<unix seconds>.txt` and return the path.
    ///
    /// An existing file is never overwritten: a `_<n>` suffix is added instead.
    pub fn write_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create transcript directory {}", dir.display()))?;
        let stamp = OffsetDateTime::now_utc().unix_timestamp();

        let mut suffix = 0;
        let (path, mut file) = loop {
            let name = match suffix {
                0 => format!("game_log_{stamp}.txt"),
                n => format!("game_log_{stamp}_{n}.txt"),
            };
            let path = dir.join(name);
            match File::create_new(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("cannot create {}", path.display()))
                }
            }
        };

        file.write_all(self.render().as_bytes())
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(path)
    }
}

impl Default for GameLog {
    fn default() -> Self {
        GameLog::new()
    }
}
