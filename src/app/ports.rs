//! Port traits: the hexagonal boundary between the watering core and the outside world.
//!
//! ```text
//!   BoardChip ──▶ WateringHardware ──▶ WateringScheduler ──▶ EventSink
//!                 TimeProvider      ──▶        ▲
//!                                              │
//!                                  WateringService (commands)
//! ```
//!
//! Driven adapters (chip backends, the hardware controller, the time
//! provider, event sinks) implement these traits. The scheduler holds them
//! as `Arc<dyn …>` handles so they can be swapped while it runs, and every
//! trait is `Send + Sync` because the worker thread and the command thread
//! use them concurrently.

use std::time::Duration;

use crate::error::{Error, HalError, ProjectError};
use crate::pins::{Direction, PinOffset, Polarity};
use crate::project::ProjectDocument;

use super::events::WateringEvent;

// ───────────────────────────────────────────────────────────────
// Device roles
// ───────────────────────────────────────────────────────────────

/// The two devices the daily cycle drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Valve,
    Pump,
}

impl DeviceRole {
    pub const ALL: [Self; 2] = [Self::Valve, Self::Pump];

    /// Device name used in project files.
    pub const fn project_name(self) -> &'static str {
        match self {
            Self::Valve => "waterValve",
            Self::Pump => "waterPump",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Valve => "water valve",
            Self::Pump => "water pump",
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Digital output (driven adapter: domain → one GPIO line)
// ───────────────────────────────────────────────────────────────

/// A single claimed output line.
///
/// `activate`/`deactivate` are idempotent and never fail: backend write
/// errors are logged by the implementation, not reported.
pub trait DigitalOutput: Send {
    fn activate(&mut self);

    fn deactivate(&mut self);

    /// Stable line identifier.
    fn offset(&self) -> PinOffset;

    fn direction(&self) -> Direction;

    fn polarity(&self) -> Polarity;

    /// Whether the line is currently driven to its active level.
    fn is_active(&self) -> bool;

    /// Human-readable line/direction description for diagnostics.
    fn status_line(&self) -> String;
}

// ───────────────────────────────────────────────────────────────
// Board chip (driven adapter: domain → GPIO chip)
// ───────────────────────────────────────────────────────────────

/// Hands out offset-addressed digital outputs.
pub trait BoardChip: Send + Sync {
    /// Claim the line at `offset` for `consumer`.
    fn request_output(
        &self,
        consumer: &str,
        offset: PinOffset,
        direction: Direction,
        polarity: Polarity,
    ) -> Result<Box<dyn DigitalOutput>, HalError>;

    /// Release the request holding exactly these offsets.
    /// Returns `false` if no such request exists.
    fn release(&self, offsets: &[PinOffset]) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Watering hardware (valve + pump ownership)
// ───────────────────────────────────────────────────────────────

/// Owns the valve and pump outputs.
///
/// # Locking
///
/// `rebind` and `set_output_offset` take the shared hardware-access lock
/// themselves. `with_output` does **not**: callers that activate or
/// deactivate outputs must hold the lock around the call, so a
/// reassignment can never interleave with an activation sequence.
pub trait WateringHardware: Send + Sync {
    /// Run `f` against the output currently bound to `role`.
    /// Returns `false` (without calling `f`) when the role is unbound.
    fn with_output(&self, role: DeviceRole, f: &mut dyn FnMut(&mut dyn DigitalOutput)) -> bool;

    fn with_valve_output(&self, f: &mut dyn FnMut(&mut dyn DigitalOutput)) -> bool {
        self.with_output(DeviceRole::Valve, f)
    }

    fn with_pump_output(&self, f: &mut dyn FnMut(&mut dyn DigitalOutput)) -> bool {
        self.with_output(DeviceRole::Pump, f)
    }

    /// Offset last assigned to `role`. Never blocks. Only meaningful while
    /// [`is_bound`](Self::is_bound) holds.
    fn output_offset(&self, role: DeviceRole) -> PinOffset;

    /// Whether `role` currently holds a line.
    fn is_bound(&self, role: DeviceRole) -> bool;

    /// Fixed active level of `role`.
    fn output_polarity(&self, role: DeviceRole) -> Polarity;

    /// Line/direction description of the output bound to `role`.
    fn output_status(&self, role: DeviceRole) -> Option<String>;

    /// Move both roles in one step. `None` keeps a role where it is.
    ///
    /// Every moving role is deactivated and released before any new line
    /// is requested, so the valve and pump may trade lines. If a request
    /// fails, both roles go back to their previous lines.
    fn rebind(&self, valve: Option<PinOffset>, pump: Option<PinOffset>) -> Result<(), HalError>;

    /// Deactivate, release, and re-acquire the output for `role` at `offset`.
    fn set_output_offset(&self, role: DeviceRole, offset: PinOffset) -> Result<(), HalError> {
        match role {
            DeviceRole::Valve => self.rebind(Some(offset), None),
            DeviceRole::Pump => self.rebind(None, Some(offset)),
        }
    }

    fn set_valve_output_id(&self, offset: PinOffset) -> Result<(), HalError> {
        self.set_output_offset(DeviceRole::Valve, offset)
    }

    fn set_pump_output_id(&self, offset: PinOffset) -> Result<(), HalError> {
        self.set_output_offset(DeviceRole::Pump, offset)
    }
}

// ───────────────────────────────────────────────────────────────
// Time provider (configurable cycle durations)
// ───────────────────────────────────────────────────────────────

/// Supplies the three cycle durations. Reads and writes are atomic per value.
pub trait TimeProvider: Send + Sync {
    fn activation_duration(&self) -> Duration;
    fn deactivation_duration(&self) -> Duration;
    fn valve_pump_separation(&self) -> Duration;

    fn set_activation_duration(&self, duration: Duration);
    fn set_deactivation_duration(&self, duration: Duration);
    fn set_valve_pump_separation(&self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: domain → operator display)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`WateringEvent`]s through this port.
/// Adapters decide where they go (terminal, test recorder, etc.).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WateringEvent);
}

// ───────────────────────────────────────────────────────────────
// Abort system
// ───────────────────────────────────────────────────────────────

/// A system that can be asked to shut down. May block until it has.
pub trait Terminable {
    fn request_shutdown(&self);
}

/// A system that must stop immediately when an emergency is raised.
pub trait EmergencyStoppable {
    fn emergency_abort(&self);
}

// ───────────────────────────────────────────────────────────────
// Project component (domain ↔ project document)
// ───────────────────────────────────────────────────────────────

/// Stateful components that persist their configuration in the project.
pub trait ProjectComponent {
    fn save_to_project(&self, project: &mut ProjectDocument) -> Result<(), ProjectError>;

    fn load_from_project(&self, project: &ProjectDocument) -> Result<(), Error>;
}
