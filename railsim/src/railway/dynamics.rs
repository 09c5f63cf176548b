use serde::Serialize;
use std::f64::INFINITY;

/// Speeds at or below this are treated as standing still.
pub const STANDSTILL: f64 = 1e-3;

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct TrainParams {
    pub length: f64,
    pub max_acc: f64,
    pub max_brk: f64,
    pub max_vel: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum DriverAction {
    Accel,
    Brake,
    Coast,
    Halt,
}

/// Velocity after `dt` under `action`. Braking uses `brk`, which may differ
/// from the train's service braking.
pub fn velocity_update(train: &TrainParams, v: f64, action: DriverAction, brk: f64, dt: f64) -> f64 {
    match action {
        DriverAction::Accel => (v + train.max_acc * dt).min(train.max_vel).max(0.0),
        // Cannot brake to negative velocity.
        DriverAction::Brake => (v - brk * dt).max(0.0),
        DriverAction::Coast => v.min(train.max_vel).max(0.0),
        DriverAction::Halt => 0.0,
    }
}

pub fn braking_distance(v: f64, brk: f64) -> f64 {
    if brk <= 0.0 {
        INFINITY
    } else {
        v * v / (2.0 * brk)
    }
}

/// How far ahead a driver looks for signals: never less than the train's
/// braking distance.
pub fn recognition_distance(configured: f64, train: &TrainParams, v: f64) -> f64 {
    configured.max(braking_distance(v, train.max_brk))
}
