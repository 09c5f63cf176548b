use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::INFINITY;
use std::fmt;
use std::mem;

pub type Time = f64;

/// Payload of a queue entry. The queue only needs to know how to order
/// entries scheduled for the same instant and how to describe them in the
/// activity log.
pub trait QueueItem: fmt::Display {
    fn kind(&self) -> &'static str;
    fn priority(&self) -> i32 {
        0
    }
    fn detail(&self) -> String {
        String::new()
    }
}

#[derive(Debug)]
pub struct QueuedEvent<A> {
    pub time: OrderedFloat<f64>,
    pub priority: i32,
    pub id: usize,
    pub action: A,
}

impl<A> Ord for QueuedEvent<A> {
    fn cmp(&self, other: &QueuedEvent<A>) -> Ordering {
        // Note that the order is flipped on purpose -- to turn
        // the (maximum) BinaryHeap into a minimum heap.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<A> PartialOrd for QueuedEvent<A> {
    fn partial_cmp(&self, other: &QueuedEvent<A>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A> PartialEq for QueuedEvent<A> {
    fn eq(&self, other: &QueuedEvent<A>) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<A> Eq for QueuedEvent<A> {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum QueueOp {
    Enqueue,
    Dequeue,
}

/// One line of the queue activity stream.
#[derive(Clone, Debug, Serialize)]
pub struct QueueLogEntry {
    pub process_time: Time,
    pub scheduled_time: Time,
    pub op: QueueOp,
    pub kind: &'static str,
    pub message: String,
    pub detail: String,
}

/// Time-ordered scheduler. Entries are ordered by (time, priority,
/// insertion), so equal-time entries pop in a reproducible order.
pub struct EventQueue<A> {
    time: OrderedFloat<f64>,
    queue: BinaryHeap<QueuedEvent<A>>,
    id_counter: usize,
    log: Vec<QueueLogEntry>,
}

impl<A: QueueItem> Default for EventQueue<A> {
    fn default() -> Self {
        EventQueue {
            time: OrderedFloat::from(0.0),
            queue: BinaryHeap::new(),
            id_counter: 0,
            log: Vec::new(),
        }
    }
}

impl<A: QueueItem> EventQueue<A> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn now(&self) -> Time {
        self.time.into_inner()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Execution time of the earliest entry, `INFINITY` when empty.
    pub fn peek_time(&self) -> Time {
        match self.queue.peek() {
            Some(ev) => ev.time.into_inner(),
            None => INFINITY,
        }
    }

    pub fn schedule(&mut self, time: Time, action: A) {
        let time = if time < self.now() || time.is_nan() {
            log::warn!(
                "{} scheduled at {} before current time {}, running it now",
                action,
                time,
                self.now()
            );
            self.now()
        } else {
            time
        };

        self.log.push(QueueLogEntry {
            process_time: self.now(),
            scheduled_time: time,
            op: QueueOp::Enqueue,
            kind: action.kind(),
            message: action.to_string(),
            detail: action.detail(),
        });
        log::trace!("enqueue @{} for {}: {}", self.now(), time, action);

        let qe = QueuedEvent {
            time: OrderedFloat::from(time),
            priority: action.priority(),
            id: self.id_counter,
            action: action,
        };
        self.id_counter += 1;
        self.queue.push(qe);
    }

    pub fn schedule_in(&mut self, dt: Time, action: A) {
        let time = self.now() + dt;
        self.schedule(time, action);
    }

    /// Removes the earliest entry and moves the clock to its time.
    pub fn pop_earliest(&mut self) -> Option<(Time, A)> {
        let ev = self.queue.pop()?;
        if ev.time > self.time {
            self.time = ev.time;
        }
        let time = ev.time.into_inner();
        self.log.push(QueueLogEntry {
            process_time: time,
            scheduled_time: time,
            op: QueueOp::Dequeue,
            kind: ev.action.kind(),
            message: ev.action.to_string(),
            detail: ev.action.detail(),
        });
        log::trace!("dequeue @{}: {}", time, ev.action);
        Some((time, ev.action))
    }

    /// Moves the clock forward without processing anything. Never moves it
    /// backwards.
    pub fn advance_time(&mut self, time: Time) {
        let time = OrderedFloat::from(time);
        if time > self.time {
            self.time = time;
        }
    }

    pub fn drain_log(&mut self) -> Vec<QueueLogEntry> {
        mem::replace(&mut self.log, Vec::new())
    }
}
