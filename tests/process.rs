#![cfg(unix)]

use std::time::Duration;

use forge_gym::prelude::*;

use crate::common::init_test_logger;

mod common;

const FAKE_ENGINE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fake_engine.sh");

fn fake_engine() -> ProcessEngine {
    let options = ProcessOptions::new("sh", vec![FAKE_ENGINE.to_string()])
        .with_startup_grace(Duration::from_millis(200))
        .with_settle_delay(Duration::from_millis(100))
        .with_response_timeout(Duration::from_secs(2))
        .with_shutdown_grace(Duration::from_secs(1))
        .with_scenario_arg("--puzzle");
    ProcessEngine::new(options)
}

#[test]
fn full_episode_over_pipes() {
    init_test_logger();
    let mut env = Environment::new(fake_engine());
    let outcome = EpisodeRunner::new()
        .run(&mut env, &mut FirstAction, None)
        .unwrap();

    assert_eq!(outcome.end, EpisodeEnd::GameOver);
    assert_eq!(outcome.steps, 4);
    assert!((outcome.total_reward - 12.0).abs() < 1e-9);
    assert_eq!(outcome.final_state.players()[1].life(), 0);
    assert!(outcome.final_state.game_over());
    assert!(!env.engine().is_running());
}

#[test]
fn first_snapshot_merges_actions() {
    let mut env = Environment::new(fake_engine());
    let (observation, info) = env.reset(None).unwrap();

    assert_eq!(observation.turn, 1);
    assert_eq!(observation.phase, 3);
    assert_eq!(observation.life, [20, 20]);
    assert_eq!(observation.hand_size, [1, 0]);
    assert_eq!(info.actions.len(), 2);
    assert_eq!(info.actions[0].card_name.as_deref(), Some("Bear"));
    assert!(info.actions[1].is_pass());
    env.close();
    assert!(!env.engine().is_running());
}

#[test]
fn puzzle_scenario_is_passed_to_the_engine() {
    let puzzle = std::env::temp_dir().join(format!("forge-gym-puzzle-{}.pzl", std::process::id()));
    std::fs::write(&puzzle, "5").unwrap();

    let mut env = Environment::new(fake_engine()).with_reward(RewardMode::Sparse);
    let outcome = EpisodeRunner::new()
        .run(&mut env, &mut FirstAction, Some(&Scenario::puzzle(&puzzle)))
        .unwrap();
    std::fs::remove_file(&puzzle).unwrap();

    assert_eq!(outcome.end, EpisodeEnd::GameOver);
    assert_eq!(outcome.steps, 1);
    assert_eq!(outcome.total_reward, 1.0);
}

#[test]
fn reset_starts_a_fresh_game() {
    let mut env = Environment::new(fake_engine());
    env.reset(None).unwrap();
    let result = env.step(0).unwrap();
    assert_eq!(result.observation.life, [20, 15]);

    let (observation, _) = env.reset(None).unwrap();
    assert_eq!(observation.life, [20, 20]);
    assert_eq!(env.steps(), 0);
}

#[test]
fn missing_engine_binary_fails_reset() {
    let options = ProcessOptions::new("/nonexistent/forge-engine", vec![])
        .with_startup_grace(Duration::ZERO);
    let mut env = Environment::new(ProcessEngine::new(options));
    assert!(matches!(env.reset(None), Err(EnvError::Reset(_))));
    assert!(!env.engine().is_running());
}
