//! Digital output line driver.
//!
//! Wraps any [`embedded_hal::digital::OutputPin`] and adds the two things
//! the watering devices care about: a stable line offset and a polarity.
//! The relay board used for the valve and the pump switches on a LOW
//! input, so "activate" does not always mean "drive high".
//!
//! ## Failure contract
//!
//! `activate`/`deactivate` never report errors. A failed pin write is
//! logged and the cached state is left unchanged, so diagnostics show
//! what the line actually had last.

use embedded_hal::digital::{Error as _, OutputPin};
use log::warn;

use crate::app::ports::DigitalOutput;
use crate::pins::{Direction, PinOffset, Polarity};

pub struct LineOutput<P> {
    offset: PinOffset,
    direction: Direction,
    polarity: Polarity,
    pin: P,
    active: bool,
}

impl<P: OutputPin> LineOutput<P> {
    /// Take ownership of `pin` and drive it to its inactive level.
    pub fn new(offset: PinOffset, direction: Direction, polarity: Polarity, pin: P) -> Self {
        let mut out = Self {
            offset,
            direction,
            polarity,
            pin,
            active: false,
        };
        out.drive(false);
        out
    }

    fn drive(&mut self, active: bool) {
        if self.direction != Direction::Output {
            warn!("Output: line {} is not an output, ignoring write", self.offset);
            return;
        }

        let high = self.polarity.level_for(active);
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };

        match result {
            Ok(()) => self.active = active,
            Err(e) => warn!(
                "Output: line {} write failed ({:?}), state stays {}",
                self.offset,
                e.kind(),
                if self.active { "active" } else { "inactive" }
            ),
        }
    }
}

impl<P: OutputPin + Send> DigitalOutput for LineOutput<P> {
    fn activate(&mut self) {
        self.drive(true);
    }

    fn deactivate(&mut self) {
        self.drive(false);
    }

    fn offset(&self) -> PinOffset {
        self.offset
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn polarity(&self) -> Polarity {
        self.polarity
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn status_line(&self) -> String {
        format!(
            "line {} | {:?} | {} | {}",
            self.offset,
            self.direction,
            self.polarity,
            if self.active { "ACTIVE" } else { "inactive" }
        )
    }
}
