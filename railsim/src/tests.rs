use crate::eventsim::QueueOp;
use crate::input::layouts;
use crate::input::settings::Settings;
use crate::input::topology::{Orientation, StaticTopology, TopologyBuilder, TrackSide};
use crate::output::history::{recorder, Notification, TrainLogEvent};
use crate::railway::dynamics::DriverAction;
use crate::output::json::json_history;
use crate::railway::occupancy::span;
use crate::railway::safety::AccidentKind;
use crate::railway::traversal::CrossingFault;
use crate::railway::world::World;
use crate::railway::*;
use crate::simulation::Simulation;
use maplit::btreeset;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

fn quiet() -> Settings {
    Settings {
        train_spawn_up: false,
        train_spawn_down: false,
        self_test_interval: 0.0,
        ..Settings::default()
    }
}

/// Parent `A` with an outgoing switch at its end, `B` on the straight
/// course and `C` on the left one. Only `B` and `C` are open at the far end.
fn junction() -> StaticTopology {
    let mut b = TopologyBuilder::new();
    b.track("A", "a", 500.0)
        .track("B", "b", 300.0)
        .track("C", "c", 300.0)
        .switch("SW", "A", 500.0, Orientation::Outgoing, "straight", &["straight", "left"])
        .link("SW.straight", "B.begin")
        .link("SW.left", "C.begin")
        .open_end("B", TrackSide::End)
        .open_end("C", TrackSide::End);
    b.build().unwrap()
}

fn single_track(length: f64) -> StaticTopology {
    let mut b = TopologyBuilder::new();
    b.track("A", "a", length).open_end("A", TrackSide::Begin);
    b.build().unwrap()
}

#[test]
fn spawned_train_stops_at_dead_end() {
    let settings = Settings {
        train_spawn_down: false,
        first_spawn_delay: 0.0,
        mean_inter_arrival_time: 1000.0,
        self_test_interval: 0.0,
        ..Settings::default()
    };
    let mut sim = Simulation::new(single_track(100.0), settings);
    sim.start();
    sim.advance_to(100.0);

    assert!(sim.accident().is_none());
    assert_eq!(sim.world.trains.len(), 1);
    let train = sim.world.trains.values().next().unwrap();
    assert_eq!(train.direction, Direction::Up);
    assert_eq!(train.position, 100.0);
    assert_eq!(train.speed, 0.0);
    assert_eq!(sim.time(), 100.0);
}

#[test]
fn opposing_trains_on_one_track_collide_head_on() {
    let mut b = TopologyBuilder::new();
    b.track("A", "a", 1000.0);
    let mut sim = Simulation::new(b.build().unwrap(), quiet());
    let t1 = sim.place_train(0, 300.0, Direction::Up).unwrap();
    let t2 = sim.place_train(0, 700.0, Direction::Down).unwrap();
    assert_eq!(sim.world.tracks[0].occupants.len(), 2);

    let (history, observer) = recorder();
    sim.subscribe(observer);
    sim.start();
    let stopped_at = sim.advance_to(50.0);

    let accident = sim.accident().unwrap().clone();
    assert_eq!(accident.kind, AccidentKind::HeadOnCollision);
    assert_eq!(accident.trains, vec![t1, t2]);
    assert_eq!(stopped_at, 1.0);
    assert!(!sim.is_running());
    assert_eq!(history.borrow().accident, Some(accident));

    // Halted: neither commands nor time move anything any more.
    assert_eq!(sim.advance_to(100.0), 1.0);
    sim.start();
    assert!(!sim.is_running());
}

#[test]
fn crossing_a_moving_switch_derails() {
    let mut sim = Simulation::new(junction(), quiet());
    sim.start();
    sim.command_switch(0, SwitchPosition::Reverse);
    let id = sim.place_train(2, 5.0, Direction::Down).unwrap();
    sim.advance_to(30.0);

    let accident = sim.accident().unwrap();
    assert_eq!(accident.kind, AccidentKind::Derailment(CrossingFault::MovingSwitch));
    assert_eq!(accident.trains, vec![id]);
    assert_eq!(accident.switch, Some(0));
    assert!(accident.time < 10.0);
    let train = &sim.world.trains[&id];
    assert_eq!(train.track, 2);
    assert_eq!(train.position, 0.0);
    assert_eq!(train.speed, 0.0);
}

#[test]
fn crossing_a_settled_switch_on_the_matching_leg_is_safe() {
    let mut sim = Simulation::new(junction(), quiet());
    sim.start();
    sim.command_switch(0, SwitchPosition::Reverse);
    sim.advance_to(10.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Reverse);

    let id = sim.place_train(2, 5.0, Direction::Down).unwrap();
    sim.advance_to(120.0);

    assert!(sim.accident().is_none());
    let train = &sim.world.trains[&id];
    assert_eq!(train.track, 0);
    assert_eq!(train.direction, Direction::Down);
}

#[test]
fn trailing_through_a_switch_set_against_the_train_derails() {
    let mut sim = Simulation::new(junction(), quiet());
    sim.start();
    sim.place_train(2, 5.0, Direction::Down).unwrap();
    sim.advance_to(30.0);
    let accident = sim.accident().unwrap();
    assert_eq!(accident.kind, AccidentKind::Derailment(CrossingFault::TrailingPoint));
}

#[test]
fn switch_under_an_occupied_parent_derails() {
    let mut sim = Simulation::new(junction(), quiet());
    sim.start();
    sim.place_train(0, 100.0, Direction::Down).unwrap();
    sim.command_switch(0, SwitchPosition::Reverse);
    sim.advance_to(1.0);
    assert_eq!(sim.accident().unwrap().kind, AccidentKind::SwitchMovedUnderTrain);
}

#[test]
fn waiting_train_resumes_after_proceed_delay() {
    let mut b = TopologyBuilder::new();
    b.track("A", "a", 1000.0).signal("S", "A", Direction::Up, 500.0);
    let mut sim = Simulation::new(b.build().unwrap(), quiet());
    let (history, observer) = recorder();
    sim.subscribe(observer);

    sim.start();
    sim.request_aspect(0, Aspect::Stop);
    let id = sim.place_train(0, 495.0, Direction::Up).unwrap();
    sim.advance_to(0.0);
    assert_eq!(sim.world.signals[0].aspect, Aspect::Stop);
    assert_eq!(sim.world.signals[0].pending, None);

    sim.advance_to(1.0);
    assert_eq!(sim.world.trains[&id].waiting, Some(0));
    assert_eq!(sim.world.trains[&id].speed, 0.0);
    assert_eq!(sim.world.signals[0].pending, Some(Aspect::Proceed));

    sim.advance_to(1.999);
    assert_eq!(sim.world.trains[&id].waiting, Some(0));

    sim.advance_to(2.0);
    let train = &sim.world.trains[&id];
    assert_eq!(sim.world.signals[0].aspect, Aspect::Proceed);
    assert_eq!(train.waiting, None);
    assert_eq!(train.generation, 1);
    assert!(train.speed > 0.0);

    let h = history.borrow();
    let resumed: Vec<f64> = h.queue
        .iter()
        .filter(|e| e.op == QueueOp::Dequeue && e.kind == "TrainMove" && e.detail.ends_with("generation=1"))
        .map(|e| e.process_time)
        .collect();
    assert_eq!(resumed.first(), Some(&2.0));
}

#[test]
fn entering_twice_schedules_one_stop() {
    let mut b = TopologyBuilder::new();
    b.track("A", "a", 1000.0).signal("S", "A", Direction::Up, 900.0);
    let mut sim = Simulation::new(b.build().unwrap(), quiet());
    interlocking::train_entered(&mut sim, 0, 0, Direction::Up);
    interlocking::train_entered(&mut sim, 0, 0, Direction::Up);
    assert_eq!(sim.pending_events(), 1);
    assert_eq!(sim.world.signals[0].pending, Some(Aspect::Stop));

    // Facing the other way: nothing to protect.
    interlocking::train_entered(&mut sim, 0, 1, Direction::Down);
    assert_eq!(sim.pending_events(), 1);

    // Proceed is already shown, but a stop is pending, so it is queued.
    interlocking::request_aspect(&mut sim, 0, Aspect::Proceed, 0.0);
    assert_eq!(sim.pending_events(), 2);
    assert_eq!(sim.world.signals[0].pending, Some(Aspect::Proceed));
}

#[test]
fn switch_spends_the_transition_time_moving() {
    let mut sim = Simulation::new(junction(), quiet());
    sim.start();
    sim.command_switch(0, SwitchPosition::Reverse);
    sim.advance_to(9.99);
    assert_eq!(sim.world.switches[0].state, SwitchState::Moving);
    sim.advance_to(10.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Reverse);

    // Commanding the current position does nothing.
    sim.command_switch(0, SwitchPosition::Reverse);
    sim.advance_to(10.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Reverse);
}

#[test]
fn superseding_command_restarts_the_transition() {
    let mut sim = Simulation::new(junction(), quiet());
    sim.start();
    sim.command_switch(0, SwitchPosition::Reverse);
    sim.advance_to(4.0);
    sim.command_switch(0, SwitchPosition::Normal);
    sim.advance_to(10.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Moving);
    assert_eq!(sim.world.switches[0].target, SwitchPosition::Normal);
    sim.advance_to(13.9);
    assert_eq!(sim.world.switches[0].state, SwitchState::Moving);
    sim.advance_to(14.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Normal);
}

#[test]
fn idle_self_test_throws_switches_once() {
    let settings = Settings { self_test_interval: 60.0, ..quiet() };
    let mut sim = Simulation::new(junction(), settings);
    sim.start();
    sim.advance_to(59.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Normal);
    sim.advance_to(60.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Moving);
    sim.advance_to(70.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Reverse);
    sim.advance_to(300.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Reverse);
    assert!(sim.accident().is_none());
}

#[test]
fn self_test_runs_again_after_a_train_has_passed() {
    let settings = Settings { self_test_interval: 60.0, train_length: 10.0, ..quiet() };
    let mut sim = Simulation::new(junction(), settings);
    sim.start();
    sim.advance_to(70.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Reverse);

    // Arrives and leaves between two checks.
    sim.advance_to(76.0);
    sim.place_train(2, 290.0, Direction::Up).unwrap();
    sim.advance_to(110.0);
    assert!(sim.world.trains.is_empty());

    sim.advance_to(119.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Reverse);
    sim.advance_to(130.0);
    assert_eq!(sim.world.switches[0].state, SwitchState::Normal);
    assert!(sim.accident().is_none());
}

/// `A` then `B`, 1000 m each, with an up signal `S` on `B` showing stop.
/// A train on `A` at 990 m runs towards it at full speed.
fn run_towards_red(signal_pos: f64) -> (Simulation, TrainId, Rc<RefCell<crate::output::history::History>>) {
    let mut b = TopologyBuilder::new();
    b.track("A", "a", 1000.0)
        .track("B", "b", 1000.0)
        .link("A.end", "B.begin")
        .signal("S", "B", Direction::Up, signal_pos)
        .open_end("B", TrackSide::End);
    let mut sim = Simulation::new(b.build().unwrap(), quiet());
    let (history, observer) = recorder();
    sim.subscribe(observer);
    sim.start();
    sim.request_aspect(0, Aspect::Stop);
    let id = sim.place_train(0, 990.0, Direction::Up).unwrap();
    sim.world.trains.get_mut(&id).unwrap().speed = 20.0;
    sim.advance_to(0.0);
    assert_eq!(sim.world.signals[0].aspect, Aspect::Stop);
    (sim, id, history)
}

#[test]
fn stop_signal_inside_next_track_holds_train_at_boundary() {
    let (mut sim, id, history) = run_towards_red(3.0);
    sim.advance_to(1.0);
    {
        let train = &sim.world.trains[&id];
        assert_eq!((train.track, train.position, train.speed), (0, 1000.0, 0.0));
        assert_eq!(train.waiting, Some(0));
    }
    assert_eq!(sim.world.signals[0].pending, Some(Aspect::Proceed));
    assert!(history.borrow().trains[0]
        .events
        .iter()
        .any(|&(t, ref e)| t == 1.0 && *e == TrainLogEvent::Waiting(0)));

    sim.advance_to(2.0);
    assert_eq!(sim.world.signals[0].aspect, Aspect::Proceed);
    assert_eq!(sim.world.trains[&id].waiting, None);
}

#[test]
fn stop_signal_is_not_run_through_within_one_step() {
    // Within the distance covered past the boundary: held at the boundary.
    let (mut sim, id, _) = run_towards_red(8.0);
    sim.advance_to(1.0);
    let train = &sim.world.trains[&id];
    assert_eq!((train.track, train.position), (0, 1000.0));
    assert_eq!(train.waiting, Some(0));

    // Just beyond it: enters, then stops short of the signal next step.
    let (mut sim, id, _) = run_towards_red(12.0);
    sim.advance_to(1.0);
    assert_eq!(sim.world.trains[&id].track, 1);
    assert_eq!(sim.world.trains[&id].position, 10.0);
    sim.advance_to(2.0);
    let train = &sim.world.trains[&id];
    assert_eq!((train.track, train.position, train.speed), (1, 11.0, 0.0));
    assert_eq!(train.waiting, Some(0));
    assert!(sim.accident().is_none());
}

#[test]
fn approaching_a_stop_signal_brakes_at_signal_rate() {
    let mut b = TopologyBuilder::new();
    b.track("A", "a", 2000.0).signal("S", "A", Direction::Up, 1000.0);
    let mut sim = Simulation::new(b.build().unwrap(), quiet());
    let (history, observer) = recorder();
    sim.subscribe(observer);
    sim.start();
    sim.request_aspect(0, Aspect::Stop);
    let id = sim.place_train(0, 700.0, Direction::Up).unwrap();
    sim.world.trains.get_mut(&id).unwrap().speed = 20.0;

    sim.advance_to(1.0);
    let train = &sim.world.trains[&id];
    assert_eq!(train.position, 720.0);
    assert_eq!(train.speed, 20.0 - sim.settings.signal_braking_deceleration);

    sim.advance_to(60.0);
    let h = history.borrow();
    let events = &h.trains[0].events;
    match events.first() {
        Some(&(_, TrainLogEvent::Move { action, .. })) => assert_eq!(action, DriverAction::Brake),
        ref other => panic!("unexpected first event {:?}", other),
    }
    let waited = events.iter()
        .position(|&(_, ref e)| *e == TrainLogEvent::Waiting(0))
        .unwrap();
    for &(_, ref e) in &events[..waited] {
        if let TrainLogEvent::Move { position, .. } = *e {
            assert!(position < 1000.0);
        }
    }
}

#[test]
fn derailed_train_keeps_its_occupation() {
    let mut b = TopologyBuilder::new();
    b.track("A", "a", 500.0)
        .track("X", "x", 3.0)
        .track("B", "b", 300.0)
        .track("C", "c", 300.0)
        .link("A.end", "X.begin")
        .switch("SW", "X", 3.0, Orientation::Outgoing, "straight", &["straight", "left"])
        .link("SW.straight", "B.begin")
        .link("SW.left", "C.begin");
    let mut sim = Simulation::new(b.build().unwrap(), quiet());
    sim.start();
    let id = sim.place_train(0, 495.0, Direction::Up).unwrap();
    sim.world.trains.get_mut(&id).unwrap().speed = 20.0;
    sim.command_switch(0, SwitchPosition::Reverse);
    sim.advance_to(5.0);

    assert_eq!(sim.accident().unwrap().kind, AccidentKind::Derailment(CrossingFault::MovingSwitch));
    let train = &sim.world.trains[&id];
    assert_eq!((train.track, train.position), (1, 3.0));
    let physical: BTreeSet<TrackId> = train.physical.iter().cloned().collect();
    assert_eq!(physical, btreeset! {0, 1});
    assert_eq!(&sim.world.tracks[1].occupants[..], &[id]);
}

#[test]
fn advancing_to_a_non_finite_time_is_ignored() {
    let mut sim = Simulation::new(junction(), quiet());
    sim.start();
    assert_eq!(sim.advance_to(5.0), 5.0);
    assert_eq!(sim.advance_to(std::f64::NAN), 5.0);
    assert_eq!(sim.advance_to(std::f64::INFINITY), 5.0);
    assert_eq!(sim.advance_to(6.0), 6.0);
}

#[test]
fn train_leaves_through_an_open_end() {
    let topo = layouts::line(1, 300.0).unwrap();
    let settings = Settings { train_length: 50.0, ..quiet() };
    let mut sim = Simulation::new(topo, settings);
    let (history, observer) = recorder();
    sim.subscribe(observer);
    sim.start();
    let id = sim.place_train(0, 250.0, Direction::Up).unwrap();
    sim.advance_to(200.0);

    assert!(sim.world.trains.is_empty());
    assert!(!sim.world.any_track_occupied());
    let h = history.borrow();
    assert_eq!(h.trains.len(), 1);
    assert_eq!(h.trains[0].id, id);
    assert!(h.trains[0].removed.is_some());

    // Late steps for the removed train are ignored.
    driver::move_train(&mut sim, id, 0);
    assert!(sim.world.trains.is_empty());
}

#[test]
fn body_across_a_boundary_occupies_both_tracks() {
    let topo = layouts::line(2, 300.0).unwrap();
    let settings = Settings { train_length: 100.0, ..quiet() };
    let mut sim = Simulation::new(topo, settings);
    let id = sim.place_train(1, 40.0, Direction::Up).unwrap();
    let occupied: BTreeSet<TrackId> = sim.world.trains[&id].occupied.iter().cloned().collect();
    assert_eq!(occupied, btreeset! {0, 1});
    assert_eq!(&sim.world.tracks[0].occupants[..], &[id]);
    assert_eq!(&sim.world.tracks[1].occupants[..], &[id]);
}

#[test]
fn unknown_references_are_ignored() {
    let mut sim = Simulation::new(junction(), quiet());
    sim.start();
    sim.command_switch(7, SwitchPosition::Reverse);
    sim.request_aspect(7, Aspect::Stop);
    assert_eq!(sim.place_train(9, 0.0, Direction::Up), None);
    assert_eq!(sim.place_train(0, 600.0, Direction::Up), None);
    driver::move_train(&mut sim, 42, 0);
    assert_eq!(sim.pending_events(), 0);
    sim.advance_to(5.0);
    assert!(sim.accident().is_none());
}

#[test]
fn stopped_simulation_keeps_its_clock() {
    let mut sim = Simulation::new(junction(), quiet());
    assert_eq!(sim.advance_to(10.0), 0.0);
    sim.start();
    assert_eq!(sim.advance_to(10.0), 10.0);
    sim.stop();
    assert_eq!(sim.advance_by(5.0), 10.0);
}

fn run_loop(seed: u64, until: f64) -> (Simulation, Rc<RefCell<Vec<(f64, f64, f64)>>>, String) {
    let settings = Settings { seed: seed, mean_inter_arrival_time: 120.0, ..Settings::default() };
    let mut sim = Simulation::new(layouts::passing_loop().unwrap(), settings);
    let speeds = Rc::new(RefCell::new(Vec::new()));
    let log = speeds.clone();
    sim.subscribe(Box::new(move |n: &Notification| {
        if let Notification::Train { time, event: crate::output::history::TrainLogEvent::Move { speed, .. }, .. } = *n {
            log.borrow_mut().push((time, speed, 20.0));
        }
    }));
    let (history, observer) = recorder();
    sim.subscribe(observer);
    sim.start();
    sim.advance_to(until);
    let mut out = Vec::new();
    json_history(&sim.topology, &history.borrow(), &mut out).unwrap();
    (sim, speeds, String::from_utf8(out).unwrap())
}

#[test]
fn speeds_stay_within_bounds() {
    let (sim, speeds, _) = run_loop(42, 3600.0);
    let speeds = speeds.borrow();
    assert!(!speeds.is_empty());
    for &(_, v, max) in speeds.iter() {
        assert!(v >= 0.0 && v <= max, "speed {} out of bounds", v);
    }
    assert!(sim.time() <= 3600.0);
}

#[test]
fn processed_events_are_time_ordered() {
    let settings = Settings { mean_inter_arrival_time: 90.0, ..Settings::default() };
    let mut sim = Simulation::new(layouts::line(3, 1000.0).unwrap(), settings);
    let (history, observer) = recorder();
    sim.subscribe(observer);
    sim.start();
    sim.advance_to(1800.0);
    let h = history.borrow();
    let dequeued: Vec<f64> = h.queue
        .iter()
        .filter(|e| e.op == QueueOp::Dequeue)
        .map(|e| e.process_time)
        .collect();
    assert!(dequeued.len() > 10);
    assert!(dequeued.windows(2).all(|w| w[0] <= w[1]));
    assert!(h.queue.iter().all(|e| e.scheduled_time >= e.process_time));
}

#[test]
fn runs_are_reproducible_from_the_seed() {
    let (_, _, a) = run_loop(7, 1200.0);
    let (_, _, b) = run_loop(7, 1200.0);
    assert_eq!(a, b);
}

#[test]
fn scenario_script_drives_the_simulation() {
    let d = crate::input::dispatch::parse_dispatch(
        "start\nswitch SW1 reverse\nswitch SW2 reverse\nwait 10\ntrain W1 300 up\nadvance 200\nstop\n").unwrap();
    let settings = quiet();
    let (sim, history) = crate::evaluate(layouts::passing_loop().unwrap(), settings, &d).unwrap();
    assert_eq!(sim.world.switches[0].state, SwitchState::Reverse);
    assert!(sim.accident().is_none());
    assert!(!sim.is_running());
    assert_eq!(history.trains.len(), 1);
    assert_eq!(history.time, 200.0);

    let bad = crate::input::dispatch::parse_dispatch("switch NOPE normal\n").unwrap();
    assert!(crate::evaluate(layouts::passing_loop().unwrap(), quiet(), &bad).is_err());
}

proptest! {
    #[test]
    fn body_length_is_conserved(pos in 0.0f64..1000.0, length in 1.0f64..1000.0, up in any::<bool>()) {
        let topo = layouts::line(3, 1000.0).unwrap();
        let world = World::new(&topo);
        let dir = if up { Direction::Up } else { Direction::Down };
        let s = span(&topo, &world, 1, pos, dir, length);
        let total: f64 = s.iter().map(|seg| seg.len()).sum();
        prop_assert!((total - length).abs() < 1e-6);
        prop_assert_eq!(s[0].track, 1);
        for pair in s.windows(2) {
            prop_assert_eq!((pair[0].track as i64 - pair[1].track as i64).abs(), 1);
        }
    }
}
