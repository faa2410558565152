//! Tolerant read access to the engine's JSON snapshots.
//!
//! Nothing in a [`RawState`] is guaranteed: every accessor takes (or documents) the default
//! used when a field is missing or has the wrong type.

use serde::Serialize;
use serde_json::{Map, Value};

/// Life total assumed when the engine does not report one.
pub const DEFAULT_LIFE: i64 = 20;

/// Unvalidated snapshot of the engine state.
///
/// Always wraps a JSON object: anything else given to [`RawState::new`] becomes an empty
/// state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawState(Value);

impl Default for RawState {
    fn default() -> Self {
        RawState(Value::Object(Map::new()))
    }
}

impl From<Value> for RawState {
    fn from(value: Value) -> Self {
        RawState::new(value)
    }
}

impl RawState {
    pub fn new(value: Value) -> RawState {
        match value {
            Value::Object(_) => RawState(value),
            _ => RawState::default(),
        }
    }

    pub fn empty() -> RawState {
        RawState::default()
    }

    /// True when the engine gave us nothing usable.
    pub fn is_empty(&self) -> bool {
        self.0.as_object().map_or(true, Map::is_empty)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field `key` or `default` (also clones `default` when the field is null).
    pub fn field_or(&self, key: &str, default: Value) -> Value {
        match self.0.get(key) {
            Some(Value::Null) | None => default,
            Some(v) => v.clone(),
        }
    }

    pub fn int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(as_int).unwrap_or(default)
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn text<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn turn(&self) -> i64 {
        self.int("turn", 0)
    }

    pub fn phase(&self) -> Option<&str> {
        self.get("phase").and_then(Value::as_str)
    }

    pub fn game_over(&self) -> bool {
        self.flag("game_over", false)
    }

    pub fn winner(&self) -> Option<&str> {
        self.get("winner").and_then(Value::as_str)
    }

    /// Index of the player whose turn it is, 0-based.
    ///
    /// The engine reports `activePlayerId` 1-based; `active_player` is taken as-is.
    pub fn active_player(&self) -> i64 {
        if let Some(id) = self.get("activePlayerId").and_then(as_int) {
            return (id - 1).max(0);
        }
        self.int("active_player", 0)
    }

    pub fn stack_size(&self) -> i64 {
        if let Some(size) = self.get("stack_size").and_then(as_int) {
            return size;
        }
        self.get("stack")
            .and_then(Value::as_array)
            .map_or(0, |s| s.len() as i64)
    }

    /// The two tracked players, from `players[0..2]` or else `player1`/`player2`.
    pub fn players(&self) -> [PlayerView<'_>; 2] {
        match self.get("players").and_then(Value::as_array) {
            Some(players) => [PlayerView(players.first()), PlayerView(players.get(1))],
            None => [
                PlayerView(self.get("player1")),
                PlayerView(self.get("player2")),
            ],
        }
    }

    /// The raw action list, `possible_actions.actions` (a bare array is accepted too).
    pub fn actions(&self) -> &[Value] {
        let list = match self.get("possible_actions") {
            Some(Value::Array(list)) => Some(list),
            Some(other) => other.get("actions").and_then(Value::as_array),
            None => None,
        };
        list.map_or(&[][..], Vec::as_slice)
    }

    /// Store an action list answer (`{"actions": [...]}` or `[...]`) under
    /// `possible_actions.actions`.
    pub fn set_actions(&mut self, answer: Value) {
        let actions = match answer {
            Value::Array(list) => Value::Array(list),
            Value::Object(mut obj) => obj.remove("actions").unwrap_or(Value::Array(vec![])),
            _ => Value::Array(vec![]),
        };
        if let Value::Object(obj) = &mut self.0 {
            let mut wrapper = Map::new();
            wrapper.insert("actions".to_string(), actions);
            obj.insert("possible_actions".to_string(), Value::Object(wrapper));
        }
    }
}

/// Read-only view over one player object (which may be missing).
#[derive(Debug, Clone, Copy)]
pub struct PlayerView<'a>(Option<&'a Value>);

impl<'a> PlayerView<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.and_then(|p| p.get(key))
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some_and(Value::is_object)
    }

    pub fn life(&self) -> i64 {
        self.get("life").and_then(as_int).unwrap_or(DEFAULT_LIFE)
    }

    pub fn name(&self) -> Option<&'a str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn hand(&self) -> &'a [Value] {
        self.get("hand")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn hand_size(&self) -> i64 {
        self.hand().len() as i64
    }

    pub fn library_count(&self) -> i64 {
        self.get("libraryCount")
            .or_else(|| self.get("library_count"))
            .and_then(as_int)
            .unwrap_or(0)
    }

    pub fn battlefield_size(&self) -> i64 {
        self.get("battlefield")
            .and_then(Value::as_array)
            .map_or(0, |b| b.len() as i64)
    }
}

/// Integer out of a JSON number, accepting floats (truncated).
pub fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

/// Display name of a card entry that may be a plain string or an object.
pub fn card_name(card: &Value) -> String {
    match card {
        Value::String(name) => name.clone(),
        Value::Object(obj) => ["name", "cardName", "card_name"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| card.to_string()),
        other => other.to_string(),
    }
}
