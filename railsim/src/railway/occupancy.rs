//! Which tracks each train covers.
//!
//! A train's body is found by walking backwards from the head, across track
//! boundaries and switches, until the train length is used up. The tracks
//! walked over are the physical occupation; adding every track that shares a
//! name with one of them gives the logical occupation used for track state.

use super::interlocking;
use super::traversal::{resolve_exit, Exit};
use super::world::World;
use super::*;
use crate::input::topology::StaticTopology;
use crate::output::history::InfrastructureLogEvent;
use crate::simulation::Simulation;
use smallvec::SmallVec;

const MAX_HOPS: usize = 20;
const EPS: f64 = 1e-9;

/// Part of a train body on one track, `start <= end` in track coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    pub track: TrackId,
    pub start: f64,
    pub end: f64,
    /// Direction of travel on this track.
    pub direction: Direction,
}

impl Segment {
    pub fn len(&self) -> f64 {
        self.end - self.start
    }
}

pub type Span = SmallVec<[Segment; 4]>;

/// Body of a train with its head at `position` on `track`. The part of the
/// body that has already run past an open end is not on any track.
pub fn span(topo: &StaticTopology,
            world: &World,
            track: TrackId,
            position: f64,
            direction: Direction,
            length: f64)
            -> Span {
    let mut segments = Span::new();
    let t = match topo.tracks.get(track) {
        Some(t) => t,
        None => return segments,
    };

    let head = position.max(0.0).min(t.length);
    let overhang = match direction {
        Direction::Up => (position - t.length).max(0.0),
        Direction::Down => (-position).max(0.0),
    };
    let mut remaining = length - overhang;
    if remaining <= 0.0 {
        return segments;
    }

    let behind = match direction {
        Direction::Up => head,
        Direction::Down => t.length - head,
    };
    let covered = behind.min(remaining);
    segments.push(match direction {
        Direction::Up => Segment { track: track, start: head - covered, end: head, direction: direction },
        Direction::Down => Segment { track: track, start: head, end: head + covered, direction: direction },
    });
    remaining -= covered;

    let mut current = track;
    let mut backwards = direction.reverse();
    let mut hops = 0;
    while remaining > EPS && hops < MAX_HOPS {
        hops += 1;
        let next = match resolve_exit(topo, world, current, backwards) {
            Exit::Track(next) => next,
            Exit::OpenEnd | Exit::DeadEnd => break,
        };
        if segments.iter().any(|s| s.track == next.track) {
            break;
        }
        let next_length = topo.tracks[next.track].length;
        let covered = next_length.min(remaining);
        let forwards = next.direction.reverse();
        segments.push(match next.direction {
            Direction::Up => Segment { track: next.track, start: 0.0, end: covered, direction: forwards },
            Direction::Down => Segment {
                track: next.track,
                start: next_length - covered,
                end: next_length,
                direction: forwards,
            },
        });
        remaining -= covered;
        current = next.track;
        backwards = next.direction;
    }
    segments
}

/// Adds same-named sibling tracks to a set of physically covered tracks.
pub fn logical(topo: &StaticTopology, physical: &[TrackId]) -> SmallVec<[TrackId; 4]> {
    let mut tracks: SmallVec<[TrackId; 4]> = SmallVec::new();
    for &t in physical {
        for &u in Some(t).iter().chain(topo.siblings(t).iter()) {
            if !tracks.contains(&u) {
                tracks.push(u);
            }
        }
    }
    tracks
}

/// Recomputes the occupation of a train from its current position. Tracks
/// the body newly covers or leaves are reported to the interlocking, and the
/// occupant lists of the affected tracks are updated.
pub fn update(sim: &mut Simulation, id: TrainId) {
    let (segments, old_physical, old_logical) = match sim.world.trains.get(&id) {
        Some(train) => (span(&sim.topology, &sim.world, train.track, train.position,
                             train.direction, train.params.length),
                        train.physical.clone(),
                        train.occupied.clone()),
        None => return,
    };
    let physical: SmallVec<[TrackId; 4]> = segments.iter().map(|s| s.track).collect();
    let occupied = logical(&sim.topology, &physical);

    if let Some(train) = sim.world.trains.get_mut(&id) {
        train.physical = physical.clone();
        train.occupied = occupied.clone();
    }

    for seg in segments.iter().filter(|s| !old_physical.contains(&s.track)) {
        interlocking::train_entered(sim, seg.track, id, seg.direction);
    }
    for &t in old_physical.iter().filter(|t| !physical.contains(t)) {
        interlocking::train_left(sim, t, id);
    }

    set_occupants(sim, id, &old_logical, &occupied);
}

/// Clears all occupation of a train that is about to leave the model.
pub fn release(sim: &mut Simulation, id: TrainId) {
    let (old_physical, old_logical) = match sim.world.trains.get_mut(&id) {
        Some(train) => {
            let physical = train.physical.clone();
            let occupied = train.occupied.clone();
            train.physical.clear();
            train.occupied.clear();
            (physical, occupied)
        }
        None => return,
    };
    for &t in &old_physical {
        interlocking::train_left(sim, t, id);
    }
    set_occupants(sim, id, &old_logical, &[]);
}

fn set_occupants(sim: &mut Simulation, id: TrainId, old: &[TrackId], new: &[TrackId]) {
    for &t in old.iter().filter(|t| !new.contains(t)) {
        let now_free = {
            let state = &mut sim.world.tracks[t];
            let before = state.is_occupied();
            state.occupants.retain(|o| *o != id);
            before && !state.is_occupied()
        };
        if now_free {
            sim.log_infrastructure(InfrastructureLogEvent::Occupied(t, false));
        }
    }
    for &t in new.iter().filter(|t| !old.contains(t)) {
        let now_occupied = {
            let state = &mut sim.world.tracks[t];
            let before = state.is_occupied();
            if !state.occupants.contains(&id) {
                state.occupants.push(id);
            }
            !before
        };
        if now_occupied {
            sim.log_infrastructure(InfrastructureLogEvent::Occupied(t, true));
        }
    }
}
