use crate::eventsim::QueueLogEntry;
use crate::railway::dynamics::DriverAction;
use crate::railway::safety::Accident;
use crate::railway::*;
use crate::simulation::Observer;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum InfrastructureLogEvent {
    Aspect(SignalId, Aspect),
    Switch(SwitchId, SwitchState),
    Occupied(TrackId, bool),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TrainLogEvent {
    Move { track: TrackId, position: f64, speed: f64, action: DriverAction },
    Waiting(SignalId),
    Derailed(SwitchId),
}

/// What observers of a simulation are told about.
#[derive(Clone, Debug, Serialize)]
pub enum Notification {
    TrainAdded { time: f64, train: TrainId, name: String },
    TrainRemoved { time: f64, train: TrainId, name: String },
    Train { time: f64, train: TrainId, event: TrainLogEvent },
    Infrastructure { time: f64, event: InfrastructureLogEvent },
    Accident(Accident),
    Queue(QueueLogEntry),
    /// The simulation clock was advanced by a command.
    Updated { time: f64 },
}

#[derive(Debug, Default, Serialize)]
pub struct TrainHistory {
    pub id: TrainId,
    pub name: String,
    pub added: f64,
    pub removed: Option<f64>,
    pub events: Vec<(f64, TrainLogEvent)>,
}

#[derive(Debug, Default, Serialize)]
pub struct History {
    pub inf: Vec<(f64, InfrastructureLogEvent)>,
    pub trains: Vec<TrainHistory>,
    pub queue: Vec<QueueLogEntry>,
    pub accident: Option<Accident>,
    pub time: f64,
}

impl History {
    pub fn record(&mut self, n: &Notification) {
        match *n {
            Notification::TrainAdded { time, train, ref name } => {
                self.trains.push(TrainHistory {
                    id: train,
                    name: name.clone(),
                    added: time,
                    removed: None,
                    events: Vec::new(),
                });
            }
            Notification::TrainRemoved { time, train, .. } => {
                if let Some(t) = self.train_mut(train) {
                    t.removed = Some(time);
                }
            }
            Notification::Train { time, train, ref event } => {
                if let Some(t) = self.train_mut(train) {
                    t.events.push((time, event.clone()));
                }
            }
            Notification::Infrastructure { time, ref event } => self.inf.push((time, event.clone())),
            Notification::Accident(ref a) => self.accident = Some(a.clone()),
            Notification::Queue(ref e) => self.queue.push(e.clone()),
            Notification::Updated { time } => self.time = time,
        }
    }

    fn train_mut(&mut self, id: TrainId) -> Option<&mut TrainHistory> {
        self.trains.iter_mut().rev().find(|t| t.id == id)
    }
}

/// An observer that records everything into a shared `History`.
pub fn recorder() -> (Rc<RefCell<History>>, Observer) {
    let history = Rc::new(RefCell::new(History::default()));
    let log = history.clone();
    let observer: Observer = Box::new(move |n: &Notification| log.borrow_mut().record(n));
    (history, observer)
}

/// `HH:MM:SS.mmm`, or `--:--:--.---` for times that are negative or not
/// finite.
pub fn format_time(t: f64) -> String {
    if !t.is_finite() || t < 0.0 {
        return "--:--:--.---".to_string();
    }
    let ms = (t * 1000.0).round() as u64;
    format!("{:02}:{:02}:{:02}.{:03}",
            ms / 3_600_000,
            (ms / 60_000) % 60,
            (ms / 1000) % 60,
            ms % 1000)
}

/// One train per line: `name added removed`, with `-` for trains still in
/// the model.
pub fn train_table(h: &History) -> Result<String, failure::Error> {
    use std::fmt::Write;
    let mut s = String::new();
    for t in &h.trains {
        let removed = t.removed.map(format_time).unwrap_or_else(|| "-".to_string());
        write!(s, "{} {} {}\n", t.name, format_time(t.added), removed)?;
    }
    Ok(s)
}
