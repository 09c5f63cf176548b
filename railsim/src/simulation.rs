//! Owner of the world and the event queue. Runs the event loop, dispatches
//! actions and fans notifications out to observers.

use crate::eventsim::{EventQueue, Time};
use crate::input::settings::Settings;
use crate::input::topology::StaticTopology;
use crate::output::history::{InfrastructureLogEvent, Notification};
use crate::railway::safety::{self, Accident};
use crate::railway::world::World;
use crate::railway::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub type Observer = Box<dyn FnMut(&Notification)>;

pub struct Simulation {
    pub topology: StaticTopology,
    pub settings: Settings,
    pub world: World,
    pub(crate) queue: EventQueue<Action>,
    pub(crate) rng: ChaCha8Rng,
    /// Set once the idle self test has toggled the switches, cleared when
    /// traffic returns.
    pub(crate) self_test_done: bool,
    observers: Vec<Observer>,
    running: bool,
    started: bool,
    accident: Option<Accident>,
}

impl Simulation {
    pub fn new(topology: StaticTopology, settings: Settings) -> Simulation {
        let world = World::new(&topology);
        let rng = ChaCha8Rng::seed_from_u64(settings.seed);
        Simulation {
            topology: topology,
            settings: settings,
            world: world,
            queue: EventQueue::new(),
            rng: rng,
            self_test_done: false,
            observers: Vec::new(),
            running: false,
            started: false,
            accident: None,
        }
    }

    pub fn time(&self) -> Time {
        self.queue.now()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_halted(&self) -> bool {
        self.accident.is_some()
    }

    /// The first accident detected, if any. The run halts on it.
    pub fn accident(&self) -> Option<&Accident> {
        self.accident.as_ref()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    /// Starts (or resumes) processing. The first start schedules train
    /// spawning and the idle switch self test.
    pub fn start(&mut self) {
        if self.is_halted() {
            log::warn!("simulation halted by an accident, not starting");
            return;
        }
        if self.running {
            return;
        }
        self.running = true;
        if !self.started {
            self.started = true;
            if self.settings.any_spawn_enabled() {
                let delay = self.settings.first_spawn_delay.max(0.0);
                self.schedule_in(delay, Action::Spawn);
            }
            if self.settings.self_test_enabled() {
                let interval = self.settings.self_test_interval;
                self.schedule_in(interval, Action::SelfTest);
            }
        }
        log::info!("simulation running at {}", self.time());
        self.flush_queue_log();
    }

    pub fn stop(&mut self) {
        if self.running {
            log::info!("simulation stopped at {}", self.time());
        }
        self.running = false;
    }

    /// Processes the earliest pending event. Returns false when nothing was
    /// processed.
    pub fn step(&mut self) -> bool {
        if !self.running {
            return false;
        }
        let action = match self.queue.pop_earliest() {
            Some((_, action)) => action,
            None => return false,
        };
        self.execute(action);
        safety::check(self);
        self.flush_queue_log();
        true
    }

    /// Processes every event due at or before `target` and moves the clock
    /// there. A stopped or halted simulation keeps its clock.
    pub fn advance_to(&mut self, target: Time) -> Time {
        if !target.is_finite() {
            log::warn!("ignoring advance to non-finite time {}", target);
            return self.time();
        }
        while self.running && self.queue.peek_time() <= target {
            self.step();
        }
        if self.running {
            self.queue.advance_time(target);
        }
        let time = self.time();
        self.notify(Notification::Updated { time: time });
        time
    }

    pub fn advance_by(&mut self, dt: Time) -> Time {
        let target = self.time() + dt;
        self.advance_to(target)
    }

    /// Puts a standing train on a track, head at `position`.
    pub fn place_train(&mut self, track: TrackId, position: f64, direction: Direction) -> Option<TrainId> {
        let length = match self.topology.tracks.get(track) {
            Some(t) => t.length,
            None => {
                log::debug!("cannot place train on unknown track {}", track);
                return None;
            }
        };
        if !(position >= 0.0 && position <= length) {
            log::warn!("position {} outside track {} (length {})", position,
                       self.topology.tracks[track].id, length);
            return None;
        }
        Some(crate::railway::driver::insert_train(self, None, track, position, direction))
    }

    pub fn command_switch(&mut self, switch: SwitchId, target: SwitchPosition) {
        if switch >= self.world.switches.len() {
            log::debug!("ignoring command for unknown switch {}", switch);
            return;
        }
        self.schedule_in(0.0, Action::SwitchMove { switch: switch, target: target });
        self.flush_queue_log();
    }

    pub fn request_aspect(&mut self, signal: SignalId, aspect: Aspect) {
        crate::railway::interlocking::request_aspect(self, signal, aspect, 0.0);
        self.flush_queue_log();
    }

    pub(crate) fn schedule_in(&mut self, dt: Time, action: Action) {
        self.queue.schedule_in(dt, action);
    }

    pub(crate) fn log_infrastructure(&mut self, event: InfrastructureLogEvent) {
        let time = self.time();
        self.notify(Notification::Infrastructure { time: time, event: event });
    }

    /// Records the accident and halts. Only the first accident is kept.
    pub(crate) fn report_accident(&mut self, accident: Accident) {
        if self.accident.is_some() {
            return;
        }
        log::warn!("{}", accident.description);
        self.running = false;
        self.accident = Some(accident.clone());
        self.notify(Notification::Accident(accident));
    }

    pub(crate) fn notify(&mut self, n: Notification) {
        self.flush_queue_log();
        for observer in self.observers.iter_mut() {
            observer(&n);
        }
    }

    fn flush_queue_log(&mut self) {
        for entry in self.queue.drain_log() {
            let n = Notification::Queue(entry);
            for observer in self.observers.iter_mut() {
                observer(&n);
            }
        }
    }

    fn execute(&mut self, action: Action) {
        use crate::railway::{driver, interlocking, switch};
        match action {
            Action::Spawn => driver::spawn(self),
            Action::Move { train, generation } => driver::move_train(self, train, generation),
            Action::SignalChange { signal, aspect } => interlocking::change_aspect(self, signal, aspect),
            Action::SwitchMove { switch: sw, target } => switch::begin_move(self, sw, target),
            Action::SwitchComplete { switch: sw, target } => switch::complete_move(self, sw, target),
            Action::SelfTest => interlocking::self_test(self),
        }
    }
}
