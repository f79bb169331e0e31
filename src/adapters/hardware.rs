//! Hardware adapter. Owns the water valve and water pump outputs.
//!
//! The only module that requests or releases GPIO lines. Each role holds
//! at most one claimed line at any time: a reassignment deactivates and
//! releases the old line before the new one is requested.
//!
//! ## Locking
//!
//! Two levels, always taken in this order:
//!
//! 1. [`HardwareLock`], shared with the scheduler. Held across a whole
//!    activation/deactivation sequence or a whole reassignment.
//! 2. The per-role binding mutex, held while one output is touched. A
//!    reassignment holds both, valve before pump.
//!
//! Bound offsets are mirrored in atomics so reading one never waits on
//! either lock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{Level, debug, info, warn};

use crate::app::events::WateringEvent;
use crate::app::ports::{BoardChip, DeviceRole, DigitalOutput, EventSink, WateringHardware};
use crate::config::SystemConfig;
use crate::error::HalError;
use crate::pins::{self, Direction, PinOffset, Polarity};

// ── Hardware access lock ──────────────────────────────────────

/// Capability serialising every pin activation, deactivation and
/// reassignment. Clone it into each component that touches the outputs.
#[derive(Clone, Default)]
pub struct HardwareLock(Arc<Mutex<()>>);

impl HardwareLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until exclusive hardware access is granted.
    ///
    /// A poisoned lock is recovered: switching outputs off after a panic
    /// elsewhere matters more than the panic.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Pin binding ───────────────────────────────────────────────

/// Offset and active level of a device line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSpec {
    pub offset: PinOffset,
    pub polarity: Polarity,
}

struct RoleSlot {
    role: DeviceRole,
    polarity: Polarity,
    offset: AtomicU32,
    output: Mutex<Option<Box<dyn DigitalOutput>>>,
}

impl RoleSlot {
    fn output(&self) -> MutexGuard<'_, Option<Box<dyn DigitalOutput>>> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Controller ────────────────────────────────────────────────

/// Concrete [`WateringHardware`] for the daily-cycle watering system.
pub struct DailyCycleHardwareController {
    access: HardwareLock,
    chip: Arc<dyn BoardChip>,
    valve: RoleSlot,
    pump: RoleSlot,
    sink: Option<Arc<dyn EventSink>>,
}

impl DailyCycleHardwareController {
    /// Request both lines. Fails if either line cannot be acquired; in
    /// that case nothing stays claimed.
    pub fn new(
        access: HardwareLock,
        chip: Arc<dyn BoardChip>,
        valve: PinSpec,
        pump: PinSpec,
    ) -> Result<Self, HalError> {
        if valve.offset == pump.offset {
            return Err(HalError::LineShared(valve.offset));
        }
        let valve_out = request(chip.as_ref(), valve)?;
        let pump_out = match request(chip.as_ref(), pump) {
            Ok(out) => out,
            Err(e) => {
                chip.release(&[valve.offset]);
                return Err(e);
            }
        };

        info!(
            "Hardware: valve on line {} ({}), pump on line {} ({})",
            valve.offset, valve.polarity, pump.offset, pump.polarity
        );

        Ok(Self {
            access,
            chip,
            valve: RoleSlot {
                role: DeviceRole::Valve,
                polarity: valve.polarity,
                offset: AtomicU32::new(valve.offset),
                output: Mutex::new(Some(valve_out)),
            },
            pump: RoleSlot {
                role: DeviceRole::Pump,
                polarity: pump.polarity,
                offset: AtomicU32::new(pump.offset),
                output: Mutex::new(Some(pump_out)),
            },
            sink: None,
        })
    }

    pub fn from_config(
        access: HardwareLock,
        chip: Arc<dyn BoardChip>,
        config: &SystemConfig,
    ) -> Result<Self, HalError> {
        Self::new(
            access,
            chip,
            PinSpec {
                offset: config.valve_pin,
                polarity: config.valve_polarity,
            },
            PinSpec {
                offset: config.pump_pin,
                polarity: config.pump_polarity,
            },
        )
    }

    /// Send problems the controller recovers from on its own (failed
    /// release, role left unbound) to the operator as well as the log.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn slot(&self, role: DeviceRole) -> &RoleSlot {
        match role {
            DeviceRole::Valve => &self.valve,
            DeviceRole::Pump => &self.pump,
        }
    }

    fn report(&self, level: Level, message: String) {
        log::log!(level, "Hardware: {message}");
        if let Some(sink) = &self.sink {
            sink.emit(&WateringEvent::notice(level, message));
        }
    }

    /// Deactivate and release whatever is bound to `slot`.
    fn unbind(&self, slot: &RoleSlot, output: &mut Option<Box<dyn DigitalOutput>>) {
        let Some(mut old) = output.take() else {
            return;
        };
        old.deactivate();
        let offset = slot.offset.load(Ordering::SeqCst);
        if !self.chip.release(&[offset]) {
            self.report(
                Level::Warn,
                format!("release of {} line {offset} failed, continuing", slot.role.label()),
            );
        }
    }
}

fn request(chip: &dyn BoardChip, spec: PinSpec) -> Result<Box<dyn DigitalOutput>, HalError> {
    chip.request_output(
        pins::HARDWARE_CONTROLLER_CONSUMER,
        spec.offset,
        Direction::Output,
        spec.polarity,
    )
}

impl WateringHardware for DailyCycleHardwareController {
    fn with_output(&self, role: DeviceRole, f: &mut dyn FnMut(&mut dyn DigitalOutput)) -> bool {
        match self.slot(role).output().as_mut() {
            Some(out) => {
                f(out.as_mut());
                true
            }
            None => false,
        }
    }

    fn output_offset(&self, role: DeviceRole) -> PinOffset {
        self.slot(role).offset.load(Ordering::SeqCst)
    }

    fn is_bound(&self, role: DeviceRole) -> bool {
        self.slot(role).output().is_some()
    }

    fn output_polarity(&self, role: DeviceRole) -> Polarity {
        self.slot(role).polarity
    }

    fn output_status(&self, role: DeviceRole) -> Option<String> {
        self.slot(role).output().as_ref().map(|o| o.status_line())
    }

    fn rebind(&self, valve: Option<PinOffset>, pump: Option<PinOffset>) -> Result<(), HalError> {
        let _access = self.access.acquire();
        let slots = [&self.valve, &self.pump];
        // Binding mutexes: valve before pump.
        let mut outputs = [self.valve.output(), self.pump.output()];
        let previous = slots.map(|slot| slot.offset.load(Ordering::SeqCst));
        let target = [valve.unwrap_or(previous[0]), pump.unwrap_or(previous[1])];

        if target[0] == target[1] {
            return Err(HalError::LineShared(target[0]));
        }
        let moving: Vec<usize> = (0..2)
            .filter(|&i| target[i] != previous[i] || outputs[i].is_none())
            .collect();
        if moving.is_empty() {
            debug!("Hardware: valve and pump already on lines {} and {}", target[0], target[1]);
            return Ok(());
        }

        for &i in &moving {
            self.unbind(slots[i], &mut outputs[i]);
        }

        let mut acquired = Vec::with_capacity(moving.len());
        let mut failure = None;
        for &i in &moving {
            let spec = PinSpec {
                offset: target[i],
                polarity: slots[i].polarity,
            };
            match request(self.chip.as_ref(), spec) {
                Ok(out) => acquired.push((i, out)),
                Err(e) => {
                    failure = Some((i, e));
                    break;
                }
            }
        }

        let Some((failed, err)) = failure else {
            for (i, out) in acquired {
                *outputs[i] = Some(out);
                slots[i].offset.store(target[i], Ordering::SeqCst);
                info!(
                    "Hardware: {} moved from line {} to line {}",
                    slots[i].role.label(),
                    previous[i],
                    target[i]
                );
            }
            return Ok(());
        };

        warn!(
            "Hardware: cannot request line {} for {}: {}",
            target[failed],
            slots[failed].role.label(),
            err
        );
        for (i, _) in acquired {
            self.chip.release(&[target[i]]);
        }
        for &i in &moving {
            let restore = PinSpec {
                offset: previous[i],
                polarity: slots[i].polarity,
            };
            match request(self.chip.as_ref(), restore) {
                Ok(out) => {
                    *outputs[i] = Some(out);
                    info!("Hardware: {} restored on line {}", slots[i].role.label(), previous[i]);
                }
                Err(restore_err) => self.report(
                    Level::Error,
                    format!(
                        "{} left unbound, line {} unavailable: {restore_err}",
                        slots[i].role.label(),
                        previous[i]
                    ),
                ),
            }
        }
        Err(err)
    }
}

impl Drop for DailyCycleHardwareController {
    fn drop(&mut self) {
        let _access = self.access.acquire();
        for slot in [&self.valve, &self.pump] {
            let mut output = slot.output();
            self.unbind(slot, &mut output);
        }
    }
}
