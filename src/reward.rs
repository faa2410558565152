//! Reward signals computed from two consecutive observations.
//!
//! All rewards are from the point of view of the player at `seat` (0 or 1 in engine player
//! order); the other player is the opponent.

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use crate::observation::Observation;

/// Life points worth one unit of dense reward (so 0.1 per point).
pub const LIFE_POINTS_PER_UNIT: f64 = 10.0;
/// Flat bonus (or penalty) on the step a life total first reaches zero.
pub const KNOCKOUT_REWARD: f64 = 10.0;

type CustomReward = dyn Fn(Option<&Observation>, &Observation) -> f64 + Send + Sync;

/// Which reward function the environment uses.
#[derive(Clone, Default)]
pub enum RewardMode {
    /// Life differences every step plus a knockout bonus/penalty.
    #[default]
    Dense,
    /// +1 / -1 on the deciding step, 0 everywhere else.
    Sparse,
    /// Integrator supplied. No constraint on the output range.
    Custom(Arc<CustomReward>),
}

impl RewardMode {
    pub fn custom<F>(f: F) -> RewardMode
    where
        F: Fn(Option<&Observation>, &Observation) -> f64 + Send + Sync + 'static,
    {
        RewardMode::Custom(Arc::new(f))
    }

    pub fn compute(&self, previous: Option<&Observation>, current: &Observation, seat: usize) -> f64 {
        match self {
            RewardMode::Dense => dense_reward(previous, current, seat),
            RewardMode::Sparse => sparse_reward(previous, current, seat),
            RewardMode::Custom(f) => f(previous, current),
        }
    }
}

impl Debug for RewardMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardMode::Dense => write!(f, "Dense"),
            RewardMode::Sparse => write!(f, "Sparse"),
            RewardMode::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl FromStr for RewardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dense" => Ok(RewardMode::Dense),
            "sparse" => Ok(RewardMode::Sparse),
            other => Err(format!("unknown reward mode '{other}' (expected 'dense' or 'sparse')")),
        }
    }
}

/// `(self, opponent)` indices for `seat`.
fn seats(seat: usize) -> (usize, usize) {
    let me = seat.min(1);
    (me, 1 - me)
}

fn knocked_out(previous_life: i64, current_life: i64) -> bool {
    previous_life > 0 && current_life <= 0
}

fn life_lost(previous_life: i64, current_life: i64) -> f64 {
    // divide rather than multiply by 0.1: exact tenths for integer life totals
    (previous_life - current_life).max(0) as f64 / LIFE_POINTS_PER_UNIT
}

/// Dense reward: `+0.1` per opponent life point lost, `-0.1` per own life point lost,
/// `+10` / `-10` on the step the opponent's / own life first reaches zero.
///
/// The four terms simply add up. Always 0 without a previous observation.
pub fn dense_reward(previous: Option<&Observation>, current: &Observation, seat: usize) -> f64 {
    let Some(previous) = previous else {
        return 0.0;
    };
    let (me, opponent) = seats(seat);
    let mut reward = 0.0;

    reward += life_lost(previous.life[opponent], current.life[opponent]);
    reward -= life_lost(previous.life[me], current.life[me]);
    if knocked_out(previous.life[opponent], current.life[opponent]) {
        reward += KNOCKOUT_REWARD;
    }
    if knocked_out(previous.life[me], current.life[me]) {
        reward -= KNOCKOUT_REWARD;
    }
    reward
}

/// Sparse reward: 0 except on the step where a life total first reaches zero, where it is
/// `+1` if only the opponent is down, `-1` if only self is down, and 0 for a double knockout.
pub fn sparse_reward(previous: Option<&Observation>, current: &Observation, seat: usize) -> f64 {
    let Some(previous) = previous else {
        return 0.0;
    };
    let (me, opponent) = seats(seat);
    let deciding_step = knocked_out(previous.life[me], current.life[me])
        || knocked_out(previous.life[opponent], current.life[opponent]);
    if !deciding_step {
        return 0.0;
    }
    match (current.life[me] <= 0, current.life[opponent] <= 0) {
        (false, true) => 1.0,
        (true, false) => -1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod reward_tests {
    use super::*;

    fn obs(life: [i64; 2]) -> Observation {
        Observation {
            life,
            ..Observation::default()
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_call_is_zero() {
        assert_eq!(dense_reward(None, &obs([20, 0]), 0), 0.0);
        assert_eq!(sparse_reward(None, &obs([20, 0]), 0), 0.0);
    }

    #[test]
    fn test_no_change_is_exactly_zero() {
        let o = obs([13, 7]);
        assert_eq!(dense_reward(Some(&o), &o, 0), 0.0);
        assert_eq!(sparse_reward(Some(&o), &o, 0), 0.0);
        let dead = obs([0, 7]);
        assert_eq!(dense_reward(Some(&dead), &dead, 0), 0.0);
    }

    #[test]
    fn test_dense_components_add_up() {
        // opponent loses 3, self loses 2
        let r = dense_reward(Some(&obs([20, 20])), &obs([18, 17]), 0);
        assert!(close(r, 0.3 - 0.2));
        // opponent knocked out from 4
        let r = dense_reward(Some(&obs([20, 4])), &obs([20, 0]), 0);
        assert!(close(r, 0.4 + 10.0));
        // self knocked out from 2, opponent lost 1
        let r = dense_reward(Some(&obs([2, 20])), &obs([-1, 19]), 0);
        assert!(close(r, 0.1 - 0.3 - 10.0));
        // both knocked out: bonuses cancel, life terms remain
        let r = dense_reward(Some(&obs([1, 1])), &obs([0, 0]), 0);
        assert!(close(r, 0.0));
    }

    #[test]
    fn test_dense_is_order_independent_between_steps() {
        let a = obs([20, 20]);
        let b = obs([20, 15]);
        let c = obs([17, 15]);
        let forward = dense_reward(Some(&a), &b, 0) + dense_reward(Some(&b), &c, 0);
        let other_path = dense_reward(Some(&a), &obs([17, 20]), 0)
            + dense_reward(Some(&obs([17, 20])), &c, 0);
        assert!(close(forward, other_path));
    }

    #[test]
    fn test_gaining_life_is_not_rewarded() {
        assert_eq!(dense_reward(Some(&obs([10, 10])), &obs([15, 14]), 0), 0.0);
    }

    #[test]
    fn test_seat_flips_perspective() {
        let before = obs([20, 20]);
        let after = obs([15, 20]);
        assert!(close(dense_reward(Some(&before), &after, 0), -0.5));
        assert!(close(dense_reward(Some(&before), &after, 1), 0.5));
    }

    #[test]
    fn test_sparse_only_on_deciding_step() {
        assert_eq!(sparse_reward(Some(&obs([20, 20])), &obs([20, 5]), 0), 0.0);
        assert_eq!(sparse_reward(Some(&obs([20, 5])), &obs([20, 0]), 0), 1.0);
        assert_eq!(sparse_reward(Some(&obs([20, 0])), &obs([20, -2]), 0), 0.0);
        assert_eq!(sparse_reward(Some(&obs([3, 5])), &obs([0, 5]), 0), -1.0);
        assert_eq!(sparse_reward(Some(&obs([3, 5])), &obs([0, 5]), 1), 1.0);
        assert_eq!(sparse_reward(Some(&obs([1, 1])), &obs([0, 0]), 0), 0.0);
    }

    #[test]
    fn test_custom_and_parse() {
        let mode = RewardMode::custom(|_, current| current.turn as f64 * 100.0);
        let current = Observation {
            turn: 3,
            ..Observation::default()
        };
        assert_eq!(mode.compute(None, &current, 0), 300.0);
        assert!(matches!("Sparse".parse::<RewardMode>(), Ok(RewardMode::Sparse)));
        assert!(matches!("dense".parse::<RewardMode>(), Ok(RewardMode::Dense)));
        assert!("shaped".parse::<RewardMode>().is_err());
        assert_eq!(format!("{mode:?}"), "Custom");
    }
}
