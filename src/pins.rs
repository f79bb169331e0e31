//! GPIO line assignments for the greenhouse irrigation board.
//!
//! Single source of truth: the config defaults and the hardware controller
//! reference this module rather than hard-coding offsets. Offsets are
//! gpiochip line offsets (BCM numbering on a Raspberry Pi header).

use serde::{Deserialize, Serialize};

/// Numeric identifier of a line on a GPIO chip.
pub type PinOffset = u32;

/// Default character device of the main GPIO chip.
pub const DEFAULT_CHIP_PATH: &str = "/dev/gpiochip0";

/// Number of lines exposed by the simulated chip (matches the BCM2711 bank 0).
pub const SIMULATED_CHIP_LINES: u32 = 58;

/// Consumer label attached to every line request made by the controller.
pub const HARDWARE_CONTROLLER_CONSUMER: &str = "gh-daily-cycle-aws";

/// Kernel limit on consumer label length.
pub const CONSUMER_LABEL_CAP: usize = 32;

// ---------------------------------------------------------------------------
// Watering devices (relay board, active LOW inputs)
// ---------------------------------------------------------------------------

/// Relay channel driving the solenoid water valve.
pub const WATER_VALVE_OFFSET: PinOffset = 17;
/// Relay channel driving the water pump contactor.
pub const WATER_PUMP_OFFSET: PinOffset = 27;

/// Highest offset the command layer accepts for a device pin.
pub const MAX_PIN_OFFSET: PinOffset = SIMULATED_CHIP_LINES - 1;

// ---------------------------------------------------------------------------
// Line configuration
// ---------------------------------------------------------------------------

/// Direction of a line request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Which electrical level means "active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    #[serde(rename = "Active Low")]
    ActiveLow,
    #[serde(rename = "Active High")]
    ActiveHigh,
}

impl Polarity {
    /// Electrical level (true = high) that corresponds to `active`.
    pub const fn level_for(self, active: bool) -> bool {
        match self {
            Self::ActiveLow => !active,
            Self::ActiveHigh => active,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ActiveLow => "Active Low",
            Self::ActiveHigh => "Active High",
        }
    }
}

impl core::fmt::Display for Polarity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
