//! Application core: watering domain logic behind port traits.
//!
//! Commands come in through [`commands`], events go out through
//! [`events`], and every piece of hardware or timing is reached via the
//! traits in [`ports`], so the whole layer runs on the host against the
//! simulated chip.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
