//! System configuration parameters
//!
//! All tunable parameters for the irrigation controller. Values come from
//! defaults, optionally overridden by a JSON file given on the command line.
//! Durations are stored in milliseconds, matching the project file format.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ProjectError};
use crate::pins::{self, PinOffset, Polarity};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Hardware ---
    /// GPIO chip character device
    pub chip_path: String,
    /// Water valve line offset
    pub valve_pin: PinOffset,
    /// Water valve active level
    pub valve_polarity: Polarity,
    /// Water pump line offset
    pub pump_pin: PinOffset,
    /// Water pump active level
    pub pump_polarity: Polarity,

    // --- Devices ---
    pub valve_enabled: bool,
    pub pump_enabled: bool,

    // --- Timing ---
    /// How long valve and pump stay on per cycle (ms)
    pub activation_time_ms: u64,
    /// Idle time between two activations (ms)
    pub deactivation_time_ms: u64,
    /// Delay between closing the valve and stopping the pump (ms)
    pub deactivation_sep_time_ms: u64,

    // --- Command limits ---
    /// Upper clamp for any duration received from the command layer (ms)
    pub max_duration_ms: u64,
    /// Upper clamp for any pin offset received from the command layer
    pub max_pin_offset: PinOffset,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            chip_path: pins::DEFAULT_CHIP_PATH.to_owned(),
            valve_pin: pins::WATER_VALVE_OFFSET,
            valve_polarity: Polarity::ActiveLow,
            pump_pin: pins::WATER_PUMP_OFFSET,
            pump_polarity: Polarity::ActiveLow,

            valve_enabled: true,
            pump_enabled: true,

            activation_time_ms: 6_000,     // 6 s of water
            deactivation_time_ms: 600_000, // 10 min idle
            deactivation_sep_time_ms: 600, // pressure relief before pump stop

            max_duration_ms: 86_400_000, // one day
            max_pin_offset: pins::MAX_PIN_OFFSET,
        }
    }
}

impl SystemConfig {
    /// Read a configuration file. Absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(ProjectError::from)?;
        let config: Self = serde_json::from_str(&text).map_err(ProjectError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the hardware controller cannot honour.
    pub fn validate(&self) -> Result<(), Error> {
        if self.valve_pin == self.pump_pin {
            return Err(Error::Config("valve and pump cannot share one pin"));
        }
        if self.valve_pin > self.max_pin_offset || self.pump_pin > self.max_pin_offset {
            return Err(Error::Config("device pin exceeds max_pin_offset"));
        }
        Ok(())
    }

    pub fn activation_time(&self) -> Duration {
        Duration::from_millis(self.activation_time_ms)
    }

    pub fn deactivation_time(&self) -> Duration {
        Duration::from_millis(self.deactivation_time_ms)
    }

    pub fn deactivation_sep_time(&self) -> Duration {
        Duration::from_millis(self.deactivation_sep_time_ms)
    }
}
