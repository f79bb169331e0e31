//! Runtime diagnostics for the watering system.
//!
//! A point-in-time snapshot collected on demand. Taking one never waits
//! on the hardware lock, only briefly on a role's binding. The `Display`
//! impl is what the `status` command prints.

use core::fmt;
use std::time::Duration;

use crate::app::ports::DeviceRole;
use crate::pins::{PinOffset, Polarity};
use crate::scheduler::CycleState;

/// Per-device part of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub role: DeviceRole,
    pub enabled: bool,
    /// Bound line, reported only while the device is enabled and holds one.
    pub pin: Option<PinOffset>,
    pub polarity: Polarity,
    /// Output's own line/direction description, `None` when unbound.
    pub line: Option<String>,
}

/// Read-only snapshot of the scheduler and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WateringStatus {
    pub state: CycleState,
    pub running: bool,
    pub completed_cycles: u64,
    pub valve: DeviceStatus,
    pub pump: DeviceStatus,
    pub activation: Duration,
    pub deactivation: Duration,
    pub separation: Duration,
}

impl WateringStatus {
    pub fn device(&self, role: DeviceRole) -> &DeviceStatus {
        match role {
            DeviceRole::Valve => &self.valve,
            DeviceRole::Pump => &self.pump,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return write!(f, "{:<12} disabled", self.role.label());
        }
        match (self.pin, &self.line) {
            (Some(pin), Some(line)) => write!(
                f,
                "{:<12} enabled, line {} ({})\n    {}",
                self.role.label(),
                pin,
                self.polarity,
                line
            ),
            (Some(pin), None) => write!(
                f,
                "{:<12} enabled, line {} ({})",
                self.role.label(),
                pin,
                self.polarity
            ),
            (None, _) => write!(f, "{:<12} enabled, no line", self.role.label()),
        }
    }
}

impl fmt::Display for WateringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Automatic watering system")?;
        writeln!(
            f,
            "  state        {} ({})",
            self.state,
            if self.running { "running" } else { "stopped" }
        )?;
        writeln!(f, "  cycles       {}", self.completed_cycles)?;
        writeln!(f, "  {}", self.valve)?;
        writeln!(f, "  {}", self.pump)?;
        writeln!(f, "  activation   {} ms", self.activation.as_millis())?;
        writeln!(f, "  deactivation {} ms", self.deactivation.as_millis())?;
        write!(f, "  separation   {} ms", self.separation.as_millis())
    }
}
