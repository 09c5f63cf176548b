//! Loading topologies, settings and scenario scripts.

pub mod topology;
pub mod settings;
pub mod dispatch;
pub mod layouts;
