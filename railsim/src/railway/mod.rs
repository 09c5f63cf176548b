//! Railway simulation.

pub mod world;
pub mod traversal;
pub mod dynamics;
pub mod driver;
pub mod occupancy;
pub mod switch;
pub mod interlocking;
pub mod safety;

use crate::eventsim::QueueItem;
use serde::Serialize;
use std::fmt;

pub use crate::input::topology::{Direction, SignalId, SwitchId, TrackId};

pub type TrainId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Aspect {
    Stop,
    Proceed,
}

/// Resting position of a switch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SwitchPosition {
    Normal,
    Reverse,
}

impl SwitchPosition {
    pub fn other(self) -> SwitchPosition {
        match self {
            SwitchPosition::Normal => SwitchPosition::Reverse,
            SwitchPosition::Reverse => SwitchPosition::Normal,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SwitchState {
    Normal,
    Reverse,
    Moving,
}

impl From<SwitchPosition> for SwitchState {
    fn from(p: SwitchPosition) -> SwitchState {
        match p {
            SwitchPosition::Normal => SwitchState::Normal,
            SwitchPosition::Reverse => SwitchState::Reverse,
        }
    }
}

/// Everything the simulation can schedule.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Spawn,
    /// Movement step. Steps carrying an outdated generation were superseded
    /// by a later reschedule and are dropped.
    Move { train: TrainId, generation: u64 },
    SignalChange { signal: SignalId, aspect: Aspect },
    SwitchMove { switch: SwitchId, target: SwitchPosition },
    SwitchComplete { switch: SwitchId, target: SwitchPosition },
    SelfTest,
}

impl QueueItem for Action {
    fn kind(&self) -> &'static str {
        match *self {
            Action::Spawn => "TrainSpawn",
            Action::Move { .. } => "TrainMove",
            Action::SignalChange { .. } => "SignalChange",
            Action::SwitchMove { .. } => "SwitchMove",
            Action::SwitchComplete { .. } => "SwitchMove",
            Action::SelfTest => "SwitchTimer",
        }
    }

    fn priority(&self) -> i32 {
        match *self {
            Action::SignalChange { .. } |
            Action::SwitchMove { .. } |
            Action::SwitchComplete { .. } => 0,
            Action::Move { .. } => 1,
            Action::Spawn | Action::SelfTest => 2,
        }
    }

    fn detail(&self) -> String {
        match *self {
            Action::Move { train, generation } => format!("train={} generation={}", train, generation),
            Action::SignalChange { signal, aspect } => format!("signal={} aspect={:?}", signal, aspect),
            Action::SwitchMove { switch, target } |
            Action::SwitchComplete { switch, target } => format!("switch={} target={:?}", switch, target),
            Action::Spawn | Action::SelfTest => String::new(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Action::Spawn => write!(f, "spawn train"),
            Action::Move { train, .. } => write!(f, "move train {}", train),
            Action::SignalChange { signal, aspect } => write!(f, "signal {} to {:?}", signal, aspect),
            Action::SwitchMove { switch, target } => write!(f, "switch {} start moving to {:?}", switch, target),
            Action::SwitchComplete { switch, target } => write!(f, "switch {} reaches {:?}", switch, target),
            Action::SelfTest => write!(f, "switch self test"),
        }
    }
}
