//! Signal logic driven by occupation and by waiting trains, plus the idle
//! switch self test.

use super::*;
use crate::output::history::{InfrastructureLogEvent, TrainLogEvent};
use crate::simulation::Simulation;

/// A train's body has started covering `track`. Signals on the track facing
/// the train are set to stop after a short delay.
pub fn train_entered(sim: &mut Simulation, track: TrackId, train: TrainId, dir: Direction) {
    log::debug!("train {} entered track {}", train, sim.topology.tracks[track].id);
    let delay = sim.settings.occupation_red_delay;
    let facing: Vec<SignalId> = sim.topology.tracks[track]
        .signals
        .iter()
        .filter(|s| s.dir == dir)
        .map(|s| s.signal)
        .collect();
    for signal in facing {
        request_aspect(sim, signal, Aspect::Stop, delay);
    }
}

/// Leaving a track releases nothing; signals clear only for waiting trains.
pub fn train_left(sim: &mut Simulation, track: TrackId, train: TrainId) {
    log::debug!("train {} left track {}", train, sim.topology.tracks[track].id);
}

/// A train has stopped in front of `signal`.
pub fn train_waiting(sim: &mut Simulation, train: TrainId, signal: SignalId) {
    log::debug!("train {} waiting at signal {}", train, signal);
    let time = sim.time();
    sim.notify(crate::output::history::Notification::Train {
        time: time,
        train: train,
        event: TrainLogEvent::Waiting(signal),
    });
    let delay = sim.settings.wait_proceed_delay;
    request_aspect(sim, signal, Aspect::Proceed, delay);
}

/// Schedules an aspect change unless the same aspect is already pending, or
/// already shown with nothing else pending.
pub fn request_aspect(sim: &mut Simulation, signal: SignalId, aspect: Aspect, delay: f64) {
    {
        let state = match sim.world.signals.get_mut(signal) {
            Some(s) => s,
            None => {
                log::debug!("aspect request for unknown signal {}", signal);
                return;
            }
        };
        if state.pending == Some(aspect) {
            return;
        }
        if state.pending.is_none() && state.aspect == aspect {
            return;
        }
        state.pending = Some(aspect);
    }
    sim.schedule_in(delay, Action::SignalChange { signal: signal, aspect: aspect });
}

/// Applies a scheduled aspect change. A proceed aspect releases the trains
/// waiting at the signal, which get a fresh movement step right away.
pub fn change_aspect(sim: &mut Simulation, signal: SignalId, aspect: Aspect) {
    match sim.world.signals.get_mut(signal) {
        Some(state) => {
            state.aspect = aspect;
            if state.pending == Some(aspect) {
                state.pending = None;
            }
        }
        None => {
            log::debug!("aspect change for unknown signal {}", signal);
            return;
        }
    }
    log::debug!("signal {} shows {:?}", sim.topology.signals[signal].id, aspect);
    sim.log_infrastructure(InfrastructureLogEvent::Aspect(signal, aspect));

    if aspect == Aspect::Proceed {
        for id in sim.world.trains_waiting_at(signal) {
            let generation = match sim.world.trains.get_mut(&id) {
                Some(train) => {
                    train.waiting = None;
                    train.generation += 1;
                    train.generation
                }
                None => continue,
            };
            sim.schedule_in(0.0, Action::Move { train: id, generation: generation });
        }
    }
}

/// Periodic check: once per quiet period, with no train on any track and no
/// switch in transit, every switch is thrown to its other position. A new
/// train starts a new quiet period.
pub fn self_test(sim: &mut Simulation) {
    if sim.world.any_track_occupied() {
        sim.self_test_done = false;
    } else if !sim.world.any_switch_moving() && !sim.self_test_done {
        let targets: Vec<(SwitchId, SwitchPosition)> = sim.world
            .switches
            .iter()
            .enumerate()
            .map(|(id, sw)| (id, sw.effective().other()))
            .collect();
        if !targets.is_empty() {
            log::info!("idle self test: throwing {} switches", targets.len());
        }
        for (switch, target) in targets {
            sim.schedule_in(0.0, Action::SwitchMove { switch: switch, target: target });
        }
        sim.self_test_done = true;
    }
    if sim.settings.self_test_enabled() {
        let interval = sim.settings.self_test_interval;
        sim.schedule_in(interval, Action::SelfTest);
    }
}
