//! Train movement: spawning, the periodic movement step and removal at
//! the edge of the model.

use super::dynamics::*;
use super::occupancy;
use super::interlocking;
use super::safety::Accident;
use super::traversal::{resolve_exit, Exit, Traversal};
use super::world::World;
use super::*;
use crate::input::topology::StaticTopology;
use crate::output::history::{Notification, TrainLogEvent};
use crate::simulation::Simulation;
use rand::Rng;

/// Boundaries crossed in one step before giving up.
const MAX_HOPS: usize = 20;
/// Signals closer than this to a track's entry point block entry, as do
/// signals the step would otherwise carry the train past.
const ENTRY_BLOCK_MARGIN: f64 = 5.0;
/// Signals closer than this are considered passed.
const SIGNAL_PASSED: f64 = 0.01;
const STOP_DISTANCE: f64 = 1.0;
const MIN_INTERVAL: f64 = 1e-3;

pub fn train_params(sim: &Simulation) -> TrainParams {
    TrainParams {
        length: sim.settings.train_length,
        max_acc: sim.settings.acceleration,
        max_brk: sim.settings.braking_deceleration,
        max_vel: sim.settings.default_speed,
    }
}

/// Draws an exponentially distributed delay with the given mean.
pub fn exponential_delay<R: Rng>(rng: &mut R, mean: f64) -> f64 {
    let mean = mean.max(0.1);
    let u: f64 = rng.gen_range(std::f64::EPSILON..1.0);
    -mean * u.ln()
}

/// Adds a standing train, computes its occupation and schedules its first
/// movement step.
pub fn insert_train(sim: &mut Simulation,
                    name: Option<String>,
                    track: TrackId,
                    position: f64,
                    direction: Direction)
                    -> TrainId {
    let params = train_params(sim);
    let id = sim.world.add_train(name, params, track, position, direction);
    sim.self_test_done = false;
    let name = sim.world.trains[&id].name.clone();
    log::info!("train {} added on track {} at {:.1} heading {:?}",
               name, sim.topology.tracks[track].id, position, direction);
    let time = sim.time();
    sim.notify(Notification::TrainAdded { time: time, train: id, name: name });
    occupancy::update(sim, id);
    let dt = sim.settings.movement_update_interval.max(MIN_INTERVAL);
    sim.schedule_in(dt, Action::Move { train: id, generation: 0 });
    id
}

/// Spawns a train at a random free open end and schedules the next spawn.
pub fn spawn(sim: &mut Simulation) {
    let candidates: Vec<(TrackId, f64, Direction)> = sim.topology
        .open_ends()
        .into_iter()
        .map(|(track, side)| (track, sim.topology.tracks[track].boundary(side), side.entry_direction()))
        .filter(|&(track, _, dir)| sim.settings.spawn_enabled(dir) && !sim.world.tracks[track].is_occupied())
        .collect();

    if candidates.is_empty() {
        log::debug!("no free open end to spawn a train at");
    } else {
        let (track, position, dir) = candidates[sim.rng.gen_range(0..candidates.len())];
        insert_train(sim, None, track, position, dir);
    }

    if sim.settings.any_spawn_enabled() {
        let mean = sim.settings.mean_inter_arrival_time;
        let delay = exponential_delay(&mut sim.rng, mean);
        sim.schedule_in(delay, Action::Spawn);
    }
}

/// Nearest signal showing stop that faces the train and lies ahead of it on
/// its current track, within `lookahead`.
pub fn stop_signal_ahead(topo: &StaticTopology,
                         world: &World,
                         track: TrackId,
                         position: f64,
                         dir: Direction,
                         lookahead: f64)
                         -> Option<(SignalId, f64)> {
    topo.tracks[track]
        .signals
        .iter()
        .filter(|s| s.dir == dir && world.signals[s.signal].aspect == Aspect::Stop)
        .map(|s| (s.signal, (s.pos - position) * dir.sign()))
        .filter(|&(_, dist)| dist > SIGNAL_PASSED && dist <= lookahead)
        .fold(None, |best: Option<(SignalId, f64)>, (s, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((s, d)),
        })
}

/// Stop signal past the entry point of the track about to be entered, no
/// further in than `reach`.
pub fn entry_signal(topo: &StaticTopology, world: &World, next: &Traversal, reach: f64) -> Option<SignalId> {
    topo.tracks[next.track]
        .signals
        .iter()
        .filter(|s| s.dir == next.direction && world.signals[s.signal].aspect == Aspect::Stop)
        .find(|s| {
            let dist = (s.pos - next.position).abs();
            dist > SIGNAL_PASSED && dist <= reach
        })
        .map(|s| s.signal)
}

fn at_dead_end(topo: &StaticTopology, world: &World, track: TrackId, position: f64, dir: Direction) -> bool {
    let boundary = match dir {
        Direction::Up => topo.tracks[track].length,
        Direction::Down => 0.0,
    };
    (position - boundary).abs() < 1e-9 && resolve_exit(topo, world, track, dir) == Exit::DeadEnd
}

/// One movement step. Steps for removed trains, or superseded by a later
/// reschedule, are ignored.
pub fn move_train(sim: &mut Simulation, id: TrainId, generation: u64) {
    let train = match sim.world.trains.get(&id) {
        Some(t) if t.generation == generation => t.clone(),
        Some(_) => {
            log::debug!("superseded move step for train {}", id);
            return;
        }
        None => {
            log::debug!("move step for removed train {}", id);
            return;
        }
    };

    let dt = sim.settings.movement_update_interval.max(MIN_INTERVAL);
    let mut track = train.track;
    let mut direction = train.direction;
    let travel = train.speed * dt;
    let mut position = train.position + direction.sign() * travel;
    let mut waiting = train.waiting;
    let mut new_wait = None;
    let mut action = DriverAction::Accel;

    // Signals are looked for from the start of the step.
    let lookahead = recognition_distance(sim.settings.signal_recognition_distance,
                                         &train.params, train.speed).max(travel);
    if let Some((signal, dist)) = stop_signal_ahead(&sim.topology, &sim.world, track, train.position,
                                                    direction, lookahead) {
        if dist - travel < STOP_DISTANCE || train.speed <= STANDSTILL {
            let hold = (dist - STOP_DISTANCE).max(0.0);
            position = train.position + direction.sign() * travel.min(hold);
            action = DriverAction::Halt;
            if waiting.is_none() {
                waiting = Some(signal);
                new_wait = Some(signal);
            }
        } else {
            action = DriverAction::Brake;
        }
    }

    let mut leaving = false;
    let mut hops = 0;
    loop {
        let length = sim.topology.tracks[track].length;
        let (overflow, boundary) = match direction {
            Direction::Up => (position - length, length),
            Direction::Down => (-position, 0.0),
        };
        if overflow <= 0.0 {
            break;
        }
        if hops >= MAX_HOPS {
            log::warn!("train {} crossed too many boundaries in one step", train.name);
            position = boundary;
            action = DriverAction::Halt;
            break;
        }
        hops += 1;

        match resolve_exit(&sim.topology, &sim.world, track, direction) {
            Exit::OpenEnd => {
                leaving = overflow >= train.params.length;
                break;
            }
            Exit::DeadEnd => {
                log::debug!("train {} at dead end of track {}", train.name, sim.topology.tracks[track].id);
                position = boundary;
                action = DriverAction::Halt;
                break;
            }
            Exit::Track(next) => {
                if let Some((switch, fault)) = next.crossing.and_then(|c| c.fault.map(|f| (c.switch, f))) {
                    if let Some(t) = sim.world.trains.get_mut(&id) {
                        t.track = track;
                        t.position = boundary;
                        t.direction = direction;
                        t.speed = 0.0;
                    }
                    occupancy::update(sim, id);
                    let time = sim.time();
                    sim.notify(Notification::Train {
                        time: time,
                        train: id,
                        event: TrainLogEvent::Derailed(switch),
                    });
                    let accident = Accident::derailment(&sim.topology, &sim.world, time, id, switch, fault);
                    sim.report_accident(accident);
                    return;
                }
                let reach = ENTRY_BLOCK_MARGIN.max(overflow + SIGNAL_PASSED);
                if let Some(signal) = entry_signal(&sim.topology, &sim.world, &next, reach) {
                    position = boundary;
                    action = DriverAction::Halt;
                    if waiting.is_none() {
                        waiting = Some(signal);
                        new_wait = Some(signal);
                    }
                    break;
                }
                track = next.track;
                direction = next.direction;
                position = next.position + direction.sign() * overflow;
            }
        }
    }

    if action == DriverAction::Accel && waiting.is_some() {
        action = DriverAction::Coast;
    }
    if action == DriverAction::Accel && at_dead_end(&sim.topology, &sim.world, track, position, direction) {
        action = DriverAction::Halt;
    }
    let brk = sim.settings.signal_braking_deceleration;
    let speed = velocity_update(&train.params, train.speed, action, brk, dt);

    if leaving {
        occupancy::release(sim, id);
        if let Some(t) = sim.world.remove_train(id) {
            log::info!("train {} left the model", t.name);
            let time = sim.time();
            sim.notify(Notification::TrainRemoved { time: time, train: id, name: t.name });
        }
        return;
    }

    if let Some(t) = sim.world.trains.get_mut(&id) {
        t.track = track;
        t.position = position;
        t.direction = direction;
        t.speed = speed;
        t.waiting = waiting;
    }
    log::debug!("train {} {:?} on {} at {:.2} speed {:.2}",
                train.name, action, sim.topology.tracks[track].id, position, speed);
    let time = sim.time();
    sim.notify(Notification::Train {
        time: time,
        train: id,
        event: TrainLogEvent::Move {
            track: track,
            position: position,
            speed: speed,
            action: action,
        },
    });

    if let Some(signal) = new_wait {
        interlocking::train_waiting(sim, id, signal);
    }
    occupancy::update(sim, id);

    let next = if speed <= STANDSTILL {
        sim.settings.idle_update_interval.max(MIN_INTERVAL)
    } else {
        dt
    };
    sim.schedule_in(next, Action::Move { train: id, generation: generation });
}
