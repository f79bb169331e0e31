//! Simulated GPIO chip.
//!
//! Software-only stand-in for a gpiochip character device: performs no
//! system calls, but enforces the same request rules as the real thing
//! (one consumer per line, offsets bounded by the line count, nothing
//! after close). Line levels are kept in shared atomics so tests and
//! diagnostics can read what each output is driving.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::digital::{ErrorType, OutputPin};
use log::{debug, info};

use crate::app::ports::{BoardChip, DigitalOutput};
use crate::drivers::output::LineOutput;
use crate::error::HalError;
use crate::pins::{self, Direction, PinOffset, Polarity};

/// Bounded consumer label, as stored by the kernel.
pub type ConsumerLabel = heapless::String<{ pins::CONSUMER_LABEL_CAP }>;

/// One simulated line, handed to [`LineOutput`].
pub struct SimulatedLine {
    level: Arc<AtomicBool>,
}

impl ErrorType for SimulatedLine {
    type Error = Infallible;
}

impl OutputPin for SimulatedLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct ChipState {
    open: bool,
    claimed: HashMap<PinOffset, ConsumerLabel>,
}

pub struct SimulatedChip {
    path: String,
    levels: Vec<Arc<AtomicBool>>,
    state: Mutex<ChipState>,
}

impl SimulatedChip {
    pub fn open(path: impl Into<String>, line_count: u32) -> Self {
        let path = path.into();
        info!("Chip(sim): opened {} with {} lines", path, line_count);
        Self {
            path,
            levels: (0..line_count)
                .map(|_| Arc::new(AtomicBool::new(false)))
                .collect(),
            state: Mutex::new(ChipState {
                open: true,
                claimed: HashMap::new(),
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Drop every request. Further requests fail with [`HalError::ChipClosed`].
    pub fn close(&self) {
        let mut state = self.lock();
        state.open = false;
        state.claimed.clear();
        info!("Chip(sim): {} closed", self.path);
    }

    /// Electrical level of a line (true = high), `None` if out of range.
    pub fn line_level(&self, offset: PinOffset) -> Option<bool> {
        self.levels
            .get(offset as usize)
            .map(|l| l.load(Ordering::SeqCst))
    }

    pub fn is_requested(&self, offset: PinOffset) -> bool {
        self.lock().claimed.contains_key(&offset)
    }

    pub fn consumer_of(&self, offset: PinOffset) -> Option<String> {
        self.lock()
            .claimed
            .get(&offset)
            .map(|c| c.as_str().to_owned())
    }

    fn lock(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn consumer_label(consumer: &str) -> ConsumerLabel {
    let mut label = ConsumerLabel::new();
    for c in consumer.chars() {
        if label.push(c).is_err() {
            break;
        }
    }
    label
}

impl BoardChip for SimulatedChip {
    fn request_output(
        &self,
        consumer: &str,
        offset: PinOffset,
        direction: Direction,
        polarity: Polarity,
    ) -> Result<Box<dyn DigitalOutput>, HalError> {
        let mut state = self.lock();
        if !state.open {
            return Err(HalError::ChipClosed);
        }
        let level = self
            .levels
            .get(offset as usize)
            .ok_or(HalError::LineOutOfRange(offset))?;
        if state.claimed.contains_key(&offset) {
            return Err(HalError::LineBusy(offset));
        }

        state.claimed.insert(offset, consumer_label(consumer));
        debug!("Chip(sim): line {} requested by '{}'", offset, consumer);

        let line = SimulatedLine {
            level: Arc::clone(level),
        };
        Ok(Box::new(LineOutput::new(offset, direction, polarity, line)))
    }

    fn release(&self, offsets: &[PinOffset]) -> bool {
        let mut state = self.lock();
        if offsets.is_empty() || !offsets.iter().all(|o| state.claimed.contains_key(o)) {
            return false;
        }
        for offset in offsets {
            state.claimed.remove(offset);
        }
        debug!("Chip(sim): released {:?}", offsets);
        true
    }
}
