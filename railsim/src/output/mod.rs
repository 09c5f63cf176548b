//! Recording and exporting simulation results.

pub mod history;
pub mod json;
