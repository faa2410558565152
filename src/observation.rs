//! Normalization of engine snapshots into fixed-shape observations and action lists.
//!
//! - [`normalize`] turns a [`RawState`] into an [`Observation`], whatever the engine omitted
//! - [`normalize_actions`] re-indexes the engine's action list as [`ActionDescriptor`]s
//! - [`decision_payload`] builds the JSON document sent to a policy server
//!
//! The position of an action in the engine's list is the only handle the engine accepts, so
//! the order is preserved exactly and indices are always `0..N`.

use std::fmt::Display;

use serde::Serialize;
use serde_json::{json, Value};

use crate::state::{card_name, RawState, DEFAULT_LIFE};

/// Fixed-shape projection of a [`RawState`].
///
/// Two-element arrays are indexed by engine player order (`players[0]`, `players[1]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub turn: i64,
    /// Phase code, see [`phase_code`].
    pub phase: u8,
    pub active_player: i64,
    pub stack_size: i64,
    pub life: [i64; 2],
    pub hand_size: [i64; 2],
    pub library_count: [i64; 2],
    pub game_over: bool,
}

impl Default for Observation {
    fn default() -> Self {
        Observation {
            turn: 0,
            phase: 0,
            active_player: 0,
            stack_size: 0,
            life: [DEFAULT_LIFE; 2],
            hand_size: [0; 2],
            library_count: [0; 2],
            game_over: false,
        }
    }
}

impl Observation {
    /// True if any tracked player is at or below zero life.
    pub fn life_depleted(&self) -> bool {
        self.life.iter().any(|&life| life <= 0)
    }
}

impl Display for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "turn {} | phase {} | life {}/{} | hand {}/{} | stack {}",
            self.turn,
            self.phase,
            self.life[0],
            self.life[1],
            self.hand_size[0],
            self.hand_size[1],
            self.stack_size
        )
    }
}

/// Small integer code for a phase name. Unknown phases map to 0.
///
/// Accepts the engine's enum tags (`COMBAT_DECLARE_ATTACKERS`) as well as its display names
/// (`Declare Attackers`), case-insensitively.
pub fn phase_code(phase: &str) -> u8 {
    let key = phase
        .trim()
        .to_ascii_uppercase()
        .replace(|c: char| c == ' ' || c == '-', "_");
    match key.as_str() {
        "UNTAP" => 0,
        "UPKEEP" => 1,
        "DRAW" => 2,
        "MAIN1" | "MAIN_PHASE_1" => 3,
        "COMBAT_BEGIN" | "BEGINNING_OF_COMBAT" => 4,
        "COMBAT_DECLARE_ATTACKERS" | "DECLARE_ATTACKERS" => 5,
        "COMBAT_DECLARE_BLOCKERS" | "DECLARE_BLOCKERS" => 6,
        "COMBAT_FIRST_STRIKE_DAMAGE" | "FIRST_STRIKE_DAMAGE" => 7,
        "COMBAT_DAMAGE" => 8,
        "COMBAT_END" | "END_OF_COMBAT" => 9,
        "MAIN2" | "MAIN_PHASE_2" => 3,
        "END_OF_TURN" => 1,
        "CLEANUP" => 1,
        _ => 0,
    }
}

pub fn normalize(state: &RawState) -> Observation {
    let [p0, p1] = state.players();
    Observation {
        turn: state.turn(),
        phase: state.phase().map_or(0, phase_code),
        active_player: state.active_player(),
        stack_size: state.stack_size(),
        life: [p0.life(), p1.life()],
        hand_size: [p0.hand_size(), p1.hand_size()],
        library_count: [p0.library_count(), p1.library_count()],
        game_over: state.game_over(),
    }
}

/// One entry of the engine's action list.
///
/// `index` is only valid for the submission that immediately follows the snapshot it was
/// read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub card_name: Option<String>,
    pub mana_cost: Option<String>,
    pub description: Option<String>,
    pub requires_targets: bool,
    pub is_instant: bool,
}

impl ActionDescriptor {
    pub fn is_pass(&self) -> bool {
        self.kind == "pass_priority"
    }
}

impl Display for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(card) = &self.card_name {
            write!(f, ": {card}")?;
        }
        if let Some(cost) = &self.mana_cost {
            write!(f, " ({cost})")?;
        }
        if self.is_instant {
            write!(f, " [instant]")?;
        }
        Ok(())
    }
}

fn non_empty_text(action: &Value, key: &str) -> Option<String> {
    action
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn normalize_actions(state: &RawState) -> Vec<ActionDescriptor> {
    state
        .actions()
        .iter()
        .enumerate()
        .map(|(index, action)| ActionDescriptor {
            index,
            kind: non_empty_text(action, "type").unwrap_or_else(|| "unknown".to_string()),
            card_name: non_empty_text(action, "card_name"),
            mana_cost: non_empty_text(action, "mana_cost"),
            description: non_empty_text(action, "description"),
            requires_targets: action
                .get("requires_targets")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            is_instant: action
                .get("is_instant")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
        .collect()
}

/// Document posted to a policy server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionPayload {
    #[serde(rename = "gameState")]
    pub game_state: Value,
    #[serde(rename = "actionState")]
    pub action_state: ActionState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionState {
    pub possible_actions: Vec<PayloadAction>,
}

/// Action as presented to a policy: flat strings, empty when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadAction {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub card: String,
    pub mana_cost: String,
    pub description: String,
    pub is_instant: bool,
    pub requires_targets: bool,
}

impl From<&ActionDescriptor> for PayloadAction {
    fn from(action: &ActionDescriptor) -> Self {
        PayloadAction {
            index: action.index,
            kind: action.kind.clone(),
            card: action.card_name.clone().unwrap_or_default(),
            mana_cost: action.mana_cost.clone().unwrap_or_default(),
            description: action.description.clone().unwrap_or_default(),
            is_instant: action.is_instant,
            requires_targets: action.requires_targets,
        }
    }
}

/// Curated subset of the snapshot plus the normalized actions.
///
/// The hand is the top-level `hand` if the engine sends one, else the hand of the player at
/// `seat`; entries are reduced to card names.
pub fn decision_payload(
    state: &RawState,
    actions: &[ActionDescriptor],
    seat: usize,
) -> DecisionPayload {
    let hand = match state.get("hand").and_then(Value::as_array) {
        Some(hand) => hand.as_slice(),
        None => state.players()[seat.min(1)].hand(),
    };
    let hand = hand.iter().map(card_name).collect::<Vec<_>>();
    let library_count = match state.get("library_count") {
        Some(count) => count.clone(),
        None => json!(state.players()[seat.min(1)].library_count()),
    };

    let game_state = json!({
        "game_id": state.field_or("game_id", json!("")),
        "turn": state.turn(),
        "phase": state.text("phase", "UNKNOWN"),
        "active_player": state.field_or("active_player", json!("")),
        "priority_player": state.field_or("priority_player", json!("")),
        "game_over": state.game_over(),
        "hand": hand,
        "library_count": library_count,
        "battlefield": state.field_or("battlefield", json!({})),
        "player1": state.field_or("player1", json!({})),
        "player2": state.field_or("player2", json!({})),
        "players": state.field_or("players", json!([])),
        "mana_pool": state.field_or("mana_pool", json!({})),
        "stack": state.field_or("stack", json!([])),
        "combat": state.field_or("combat", json!({})),
        "can_play_land": state.flag("can_play_land", true),
    });

    DecisionPayload {
        game_state,
        action_state: ActionState {
            possible_actions: actions.iter().map(PayloadAction::from).collect(),
        },
    }
}

#[cfg(test)]
mod observation_tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_state_gives_default_observation() {
        for value in [json!({}), json!(null), json!("garbage"), json!([])] {
            let obs = normalize(&RawState::new(value));
            assert_eq!(obs, Observation::default());
            assert_eq!(obs.turn, 0);
            assert_eq!(obs.phase, 0);
            assert_eq!(obs.life, [20, 20]);
            assert_eq!(obs.hand_size, [0, 0]);
        }
        assert!(normalize_actions(&RawState::empty()).is_empty());
    }

    #[test]
    fn test_full_state() {
        let state = RawState::new(json!({
            "turn": 4,
            "phase": "COMBAT_DECLARE_ATTACKERS",
            "activePlayerId": 2,
            "stack": [{"name": "Shock"}],
            "players": [
                {"life": 17, "hand": ["Forest", {"cardName": "Bear"}], "libraryCount": 50},
                {"life": 9, "hand": [], "libraryCount": 48},
            ],
            "game_over": false,
        }));
        let obs = normalize(&state);
        assert_eq!(obs.turn, 4);
        assert_eq!(obs.phase, 5);
        assert_eq!(obs.active_player, 1);
        assert_eq!(obs.stack_size, 1);
        assert_eq!(obs.life, [17, 9]);
        assert_eq!(obs.hand_size, [2, 0]);
        assert_eq!(obs.library_count, [50, 48]);
    }

    #[test]
    fn test_phase_codes() {
        assert_eq!(phase_code("UNTAP"), 0);
        assert_eq!(phase_code("MAIN1"), 3);
        assert_eq!(phase_code("MAIN2"), 3);
        assert_eq!(phase_code("Main Phase 1"), 3);
        assert_eq!(phase_code("Declare Blockers"), 6);
        assert_eq!(phase_code("combat_damage"), 8);
        assert_eq!(phase_code("End of Combat"), 9);
        assert_eq!(phase_code("CLEANUP"), 1);
        assert_eq!(phase_code("SOMETHING_NEW"), 0);
        assert_eq!(phase_code(""), 0);
    }

    #[test]
    fn test_actions_keep_engine_order() {
        let state = RawState::new(json!({
            "possible_actions": {"actions": [
                {"type": "play_land", "card_name": "Forest"},
                {"type": "cast_spell", "card_name": "Shock", "mana_cost": "{R}", "requires_targets": true},
                "weird entry",
                {"type": "pass_priority", "card_name": ""},
            ]}
        }));
        let actions = normalize_actions(&state);
        let indices = actions.iter().map(|a| a.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(actions[0].card_name.as_deref(), Some("Forest"));
        assert!(actions[1].requires_targets);
        assert_eq!(actions[1].to_string(), "cast_spell: Shock ({R})");
        assert_eq!(actions[2].kind, "unknown");
        assert!(actions[3].is_pass());
        assert_eq!(actions[3].card_name, None);
    }

    #[test]
    fn test_decision_payload_shape() {
        let state = RawState::new(json!({
            "game_id": "g-1",
            "turn": 2,
            "phase": "MAIN1",
            "hand": ["Forest", {"name": "Llanowar Elves", "id": 3}],
            "player1": {"life": 20},
            "possible_actions": {"actions": [{"type": "play_land", "card_name": "Forest"}]},
        }));
        let actions = normalize_actions(&state);
        let payload = serde_json::to_value(decision_payload(&state, &actions, 0)).unwrap();

        assert_eq!(payload["gameState"]["game_id"], "g-1");
        assert_eq!(payload["gameState"]["hand"], json!(["Forest", "Llanowar Elves"]));
        assert_eq!(payload["gameState"]["player2"], json!({}));
        assert_eq!(payload["gameState"]["can_play_land"], true);
        let first = &payload["actionState"]["possible_actions"][0];
        assert_eq!(first["index"], 0);
        assert_eq!(first["type"], "play_land");
        assert_eq!(first["card"], "Forest");
        assert_eq!(first["mana_cost"], "");
    }

    #[test]
    fn test_decision_payload_of_empty_state() {
        let payload = serde_json::to_value(decision_payload(&RawState::empty(), &[], 1)).unwrap();
        assert_eq!(payload["gameState"]["phase"], "UNKNOWN");
        assert_eq!(payload["gameState"]["turn"], 0);
        assert_eq!(payload["gameState"]["hand"], json!([]));
        assert!(payload["actionState"]["possible_actions"]
            .as_array()
            .unwrap()
            .is_empty());
    }
}
