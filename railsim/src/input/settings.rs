use crate::railway::Direction;
use crate::{read_file, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable parameters of a simulation run. Missing fields in a JSON
/// settings file take their default values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mean of the exponential spawn interval, seconds.
    pub mean_inter_arrival_time: f64,
    pub train_length: f64,
    /// Maximum speed of spawned trains, m/s.
    pub default_speed: f64,
    /// Service braking of spawned trains, m/s².
    pub braking_deceleration: f64,
    pub signal_recognition_distance: f64,
    pub signal_braking_deceleration: f64,
    pub acceleration: f64,
    pub movement_update_interval: f64,
    pub idle_update_interval: f64,
    pub switch_transition_time: f64,
    pub train_spawn_up: bool,
    pub train_spawn_down: bool,
    /// Delay before signals protecting an entered track turn to stop.
    pub occupation_red_delay: f64,
    /// Delay before a signal with a waiting train turns to proceed.
    pub wait_proceed_delay: f64,
    /// Period of the idle switch self test. Zero disables it.
    pub self_test_interval: f64,
    pub first_spawn_delay: f64,
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            mean_inter_arrival_time: 300.0,
            train_length: 200.0,
            default_speed: 20.0,
            braking_deceleration: 1.0,
            signal_recognition_distance: 500.0,
            signal_braking_deceleration: 1.5,
            acceleration: 0.5,
            movement_update_interval: 1.0,
            idle_update_interval: 1.0,
            switch_transition_time: 10.0,
            train_spawn_up: true,
            train_spawn_down: true,
            occupation_red_delay: 3.0,
            wait_proceed_delay: 1.0,
            self_test_interval: 60.0,
            first_spawn_delay: 1.0,
            seed: 42,
        }
    }
}

impl Settings {
    pub fn from_json(s: &str) -> AppResult<Settings> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> AppResult<Settings> {
        let contents = read_file(path)?;
        Settings::from_json(&contents)
    }

    pub fn spawn_enabled(&self, dir: Direction) -> bool {
        match dir {
            Direction::Up => self.train_spawn_up,
            Direction::Down => self.train_spawn_down,
        }
    }

    pub fn any_spawn_enabled(&self) -> bool {
        self.train_spawn_up || self.train_spawn_down
    }

    pub fn self_test_enabled(&self) -> bool {
        self.self_test_interval > 0.0
    }
}
