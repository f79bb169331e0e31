//! Line drivers and chip backends.

pub mod output;
pub mod simulated;
