//! Following the topology from one track to the next, through switches.

use super::world::World;
use super::*;
use crate::input::topology::{ConnectorId, ConnectorOwner, Orientation, StaticTopology, TrackSide};
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum CrossingKind {
    Split,
    Merge,
}

/// Something wrong with the switch a train is crossing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum CrossingFault {
    /// The switch blades are in transit.
    MovingSwitch,
    /// Arriving on a branch the switch is not set for.
    TrailingPoint,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Crossing {
    pub switch: SwitchId,
    pub kind: CrossingKind,
    pub fault: Option<CrossingFault>,
}

/// Where a train ends up after passing a track boundary.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Traversal {
    pub track: TrackId,
    /// Entry point on `track`, either 0 or its length.
    pub position: f64,
    pub direction: Direction,
    pub crossing: Option<Crossing>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Exit {
    Track(Traversal),
    OpenEnd,
    DeadEnd,
}

/// Whether crossing a switch splits or merges, given the direction of
/// travel measured on the switch's parent track.
pub fn crossing_kind(orientation: Orientation, dir: Direction) -> CrossingKind {
    match (orientation, dir) {
        (Orientation::Outgoing, Direction::Up) => CrossingKind::Split,
        (Orientation::Outgoing, Direction::Down) => CrossingKind::Merge,
        (Orientation::Incoming, Direction::Up) => CrossingKind::Merge,
        (Orientation::Incoming, Direction::Down) => CrossingKind::Split,
    }
}

/// Resolves what lies beyond the boundary of `track` when travelling in
/// `dir`. The switch state decides the branch taken at a split; faults at a
/// switch are reported on the crossing and left for the caller to act on.
pub fn resolve_exit(topo: &StaticTopology, world: &World, track: TrackId, dir: Direction) -> Exit {
    let end = match topo.tracks.get(track) {
        Some(t) => t.end(TrackSide::exit_of(dir)),
        None => return Exit::DeadEnd,
    };
    match topo.far_side(end.connector) {
        Some((far, _)) => enter_through(topo, world, far, dir),
        None if end.open_end => Exit::OpenEnd,
        None => Exit::DeadEnd,
    }
}

fn enter_track(topo: &StaticTopology, track: TrackId, side: TrackSide, crossing: Option<Crossing>) -> Traversal {
    Traversal {
        track: track,
        position: topo.tracks[track].boundary(side),
        direction: side.entry_direction(),
        crossing: crossing,
    }
}

/// `dir` is the direction of travel on the track being left.
fn enter_through(topo: &StaticTopology, world: &World, far: ConnectorId, dir: Direction) -> Exit {
    let (switch, arrival) = match topo.connectors[far].owner {
        ConnectorOwner::Track(t, side) => return Exit::Track(enter_track(topo, t, side, None)),
        ConnectorOwner::SwitchTrunk(sw) => (sw, None),
        ConnectorOwner::SwitchBranch(sw, b) => (sw, Some(b)),
    };

    let sw = &topo.switches[switch];
    let state = &world.switches[switch];
    let parent_dir = match arrival {
        None => dir,
        Some(_) => sw.side.entry_direction(),
    };
    let kind = crossing_kind(sw.orientation, parent_dir);
    let moving = state.state == SwitchState::Moving;

    match (kind, arrival) {
        (CrossingKind::Split, None) => {
            let reverse = state.effective() == SwitchPosition::Reverse;
            let branch = match sw.branch_for(reverse) {
                Some(b) => b,
                None => return Exit::DeadEnd,
            };
            let crossing = Crossing {
                switch: switch,
                kind: kind,
                fault: if moving { Some(CrossingFault::MovingSwitch) } else { None },
            };
            match topo.far_side(sw.branches[branch].connector) {
                Some((_, conn)) => match conn.owner {
                    ConnectorOwner::Track(t, side) => Exit::Track(enter_track(topo, t, side, Some(crossing))),
                    _ => {
                        log::debug!("switch {} branch leads directly into another switch", sw.id);
                        Exit::DeadEnd
                    }
                },
                None => Exit::DeadEnd,
            }
        }
        (CrossingKind::Merge, Some(branch)) => {
            let set_for = sw.branch_for(state.effective() == SwitchPosition::Reverse);
            let fault = if moving {
                Some(CrossingFault::MovingSwitch)
            } else if set_for != Some(branch) {
                Some(CrossingFault::TrailingPoint)
            } else {
                None
            };
            let crossing = Crossing { switch: switch, kind: kind, fault: fault };
            Exit::Track(enter_track(topo, sw.track, sw.side, Some(crossing)))
        }
        _ => {
            log::debug!("switch {} crossed against its orientation", sw.id);
            Exit::DeadEnd
        }
    }
}
