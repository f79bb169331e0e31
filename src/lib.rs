//! Greenhouse irrigation controller library.
//!
//! Exposes the watering core (scheduler, hardware controller, time
//! provider), its command layer and project persistence. Everything runs
//! on the host; hardware is reached only through the `BoardChip` port.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod project;
pub mod scheduler;
