//! Collision and derailment detection.

use super::traversal::CrossingFault;
use super::world::World;
use super::*;
use crate::input::topology::StaticTopology;
use crate::output::history::format_time;
use crate::simulation::Simulation;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AccidentKind {
    HeadOnCollision,
    RearEndCollision,
    /// A switch started moving under a train.
    SwitchMovedUnderTrain,
    /// A train ran over a switch that was moving or set against it.
    Derailment(CrossingFault),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Accident {
    pub time: f64,
    pub kind: AccidentKind,
    pub trains: Vec<TrainId>,
    pub track: Option<TrackId>,
    pub switch: Option<SwitchId>,
    pub description: String,
}

impl Accident {
    pub fn derailment(topo: &StaticTopology,
                      world: &World,
                      time: f64,
                      train: TrainId,
                      switch: SwitchId,
                      fault: CrossingFault)
                      -> Accident {
        let how = match fault {
            CrossingFault::MovingSwitch => "over moving switch",
            CrossingFault::TrailingPoint => "trailing through switch",
        };
        Accident {
            time: time,
            kind: AccidentKind::Derailment(fault),
            trains: vec![train],
            track: Some(topo.switches[switch].track),
            switch: Some(switch),
            description: format!("{}: train {} derailed {} {}",
                                 format_time(time), train_name(world, train), how,
                                 topo.switches[switch].id),
        }
    }
}

fn train_name(world: &World, id: TrainId) -> String {
    world.trains.get(&id).map(|t| t.name.clone()).unwrap_or_else(|| format!("#{}", id))
}

/// Runs after every processed event. The first accident found halts the
/// simulation; later ones are not looked for.
pub fn check(sim: &mut Simulation) {
    if sim.is_halted() {
        return;
    }
    if let Some(accident) = inspect(&sim.topology, &sim.world, sim.time()) {
        sim.report_accident(accident);
    }
}

/// Collisions are checked track by track in id order, then switches moving
/// under an occupied parent track.
pub fn inspect(topo: &StaticTopology, world: &World, time: f64) -> Option<Accident> {
    for (track, state) in world.tracks.iter().enumerate() {
        if state.occupants.len() < 2 {
            continue;
        }
        let (a, b) = match (world.trains.get(&state.occupants[0]), world.trains.get(&state.occupants[1])) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        let (kind, what) = if a.direction != b.direction {
            (AccidentKind::HeadOnCollision, "head-on collision")
        } else {
            (AccidentKind::RearEndCollision, "rear-end collision")
        };
        return Some(Accident {
            time: time,
            kind: kind,
            trains: vec![a.id, b.id],
            track: Some(track),
            switch: None,
            description: format!("{}: {} between {} and {} on track {}",
                                 format_time(time), what, a.name, b.name, topo.tracks[track].id),
        });
    }

    for (switch, state) in world.switches.iter().enumerate() {
        if state.state != SwitchState::Moving {
            continue;
        }
        let parent = topo.switches[switch].track;
        if let Some(&train) = world.tracks[parent].occupants.first() {
            return Some(Accident {
                time: time,
                kind: AccidentKind::SwitchMovedUnderTrain,
                trains: world.tracks[parent].occupants.to_vec(),
                track: Some(parent),
                switch: Some(switch),
                description: format!("{}: switch {} moving under train {} on track {}",
                                     format_time(time), topo.switches[switch].id,
                                     train_name(world, train), topo.tracks[parent].id),
            });
        }
    }
    None
}
