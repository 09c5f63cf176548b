//! Discrete event scheduling.

pub mod queue;

pub use self::queue::{EventQueue, QueueItem, QueueLogEntry, QueueOp, Time};
