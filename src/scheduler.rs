//! Daily-cycle watering scheduler.
//!
//! One worker thread per run drives the valve and pump through a
//! repeating activation/idle cycle:
//!
//! ```text
//!              start_automatic_watering()
//!   Disabled ─────────────────────────────▶ Irrigating
//!      ▲                                    │        ▲
//!      │                      activation    │        │  deactivation
//!      │                      elapsed       ▼        │  elapsed (+1 cycle)
//!   TearingDown ◀──── stop / self-stop ─── Idling ───┘
//! ```
//!
//! Only the worker writes the cycle state; every other thread reads it
//! from an atomic. `start_automatic_watering` raises a separate running
//! flag before spawning, and the worker drops it as its last act. The worker sleeps solely inside [`StopSignal`] waits,
//! so a stop request wakes it immediately wherever it is.
//!
//! ## Hardware ordering
//!
//! Activation and deactivation run under the shared [`HardwareLock`].
//! The valve is always switched before the pump. On deactivation the
//! pump stays on for the configured separation after the valve closes
//! (pressure relief). A stop that arrives during the gap cuts it short; a
//! stop already pending when deactivation begins still gets the full gap.

pub mod stop;

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;

use log::{Level, debug, info};

use crate::adapters::hardware::HardwareLock;
use crate::app::events::WateringEvent;
use crate::app::ports::{
    DeviceRole, EmergencyStoppable, EventSink, Terminable, TimeProvider, WateringHardware,
};
use crate::diagnostics::{DeviceStatus, WateringStatus};
use stop::StopSignal;

/// Name of the only supported watering flow.
pub const CYCLED_FLOW: &str = "cycled";

const WORKER_THREAD_NAME: &str = "aws-daily-cycle";

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CycleState {
    Disabled = 0,
    Idling = 1,
    Irrigating = 2,
    TearingDown = 3,
}

impl CycleState {
    pub const COUNT: usize = 4;

    /// Convert a stored `u8` back to `CycleState`. Out-of-range values are
    /// a bug; release builds fall back to `Disabled`.
    pub fn from_index(idx: u8) -> Self {
        match idx {
            0 => Self::Disabled,
            1 => Self::Idling,
            2 => Self::Irrigating,
            3 => Self::TearingDown,
            _ => {
                debug_assert!(false, "invalid cycle state index: {idx}");
                Self::Disabled
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Idling => "Idling",
            Self::Irrigating => "Irrigating",
            Self::TearingDown => "TearingDown",
        }
    }
}

impl core::fmt::Display for CycleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Shared state (worker + callers)
// ---------------------------------------------------------------------------

struct Shared {
    state: AtomicU8,
    running: AtomicBool,
    cycles: AtomicU64,
    valve_enabled: AtomicBool,
    pump_enabled: AtomicBool,
    hardware: RwLock<Arc<dyn WateringHardware>>,
    timing: RwLock<Arc<dyn TimeProvider>>,
    access: HardwareLock,
    sink: Arc<dyn EventSink>,
}

/// Device flags captured at one point of an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Enabled {
    valve: bool,
    pump: bool,
}

impl Enabled {
    fn any(self) -> bool {
        self.valve || self.pump
    }

    fn both(self) -> bool {
        self.valve && self.pump
    }

    fn of(self, role: DeviceRole) -> bool {
        match role {
            DeviceRole::Valve => self.valve,
            DeviceRole::Pump => self.pump,
        }
    }
}

impl Shared {
    fn state(&self) -> CycleState {
        CycleState::from_index(self.state.load(Ordering::SeqCst))
    }

    fn enabled(&self) -> Enabled {
        Enabled {
            valve: self.valve_enabled.load(Ordering::SeqCst),
            pump: self.pump_enabled.load(Ordering::SeqCst),
        }
    }

    fn hardware(&self) -> Arc<dyn WateringHardware> {
        Arc::clone(&self.hardware.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn timing(&self) -> Arc<dyn TimeProvider> {
        Arc::clone(&self.timing.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn transition(&self, to: CycleState) {
        let from = CycleState::from_index(self.state.swap(to as u8, Ordering::SeqCst));
        if from != to {
            debug!("Watering: {from} -> {to}");
            self.sink.emit(&WateringEvent::StateChanged { from, to });
        }
    }

    /// Dual log: diagnostic log plus operator-facing notice.
    fn report(&self, level: Level, message: String) {
        log::log!(level, "Watering: {message}");
        self.sink.emit(&WateringEvent::notice(level, message));
    }

    /// Switch one output. Caller holds the hardware lock.
    fn switch(&self, hardware: &dyn WateringHardware, role: DeviceRole, on: bool) {
        let bound = hardware.with_output(role, &mut |out| {
            if on {
                out.activate();
            } else {
                out.deactivate();
            }
        });
        if !bound {
            self.report(
                Level::Warn,
                format!("{} has no bound line, skipped", role.label()),
            );
        }
    }

    fn activate(&self, hardware: &dyn WateringHardware, devices: Enabled) {
        let _access = self.access.acquire();
        for role in DeviceRole::ALL {
            if devices.of(role) {
                self.switch(hardware, role, true);
            }
        }
    }

    fn deactivate(
        &self,
        hardware: &dyn WateringHardware,
        timing: &dyn TimeProvider,
        devices: Enabled,
        stop: &StopSignal,
    ) {
        let _access = self.access.acquire();
        if devices.valve {
            self.switch(hardware, DeviceRole::Valve, false);
        }
        if devices.both() {
            let gap = timing.valve_pump_separation();
            if stop.is_requested() {
                std::thread::sleep(gap);
            } else if stop.wait_timeout(gap) {
                debug!("Watering: valve/pump separation cut short by stop");
            }
        }
        if devices.pump {
            self.switch(hardware, DeviceRole::Pump, false);
        }
    }

    /// The worker body. Returns once the run has reached `Disabled`.
    fn run_cycles(&self, stop: &StopSignal) {
        info!("Watering: worker started");
        while !stop.is_requested() {
            // Collaborators may be swapped between iterations; a stale
            // handle stays valid for the rest of this one.
            let hardware = self.hardware();
            let timing = self.timing();
            let at_start = self.enabled();

            let activation = timing.activation_duration();
            self.transition(CycleState::Irrigating);
            self.activate(hardware.as_ref(), at_start);

            let stopped = stop.wait_timeout(activation);
            self.transition(CycleState::Idling);

            if stopped {
                self.deactivate(hardware.as_ref(), timing.as_ref(), at_start, stop);
                break;
            }

            // Devices disabled while irrigating go off now, not at the
            // end of the cycle.
            let now = self.enabled();
            let mut still_on = at_start;
            for role in DeviceRole::ALL {
                if at_start.of(role) && !now.of(role) {
                    {
                        let _access = self.access.acquire();
                        self.switch(hardware.as_ref(), role, false);
                    }
                    match role {
                        DeviceRole::Valve => still_on.valve = false,
                        DeviceRole::Pump => still_on.pump = false,
                    }
                    self.report(
                        Level::Info,
                        format!("{} disabled during the cycle, switched off", role.label()),
                    );
                }
            }

            if !now.any() {
                self.report(
                    Level::Info,
                    "both devices disabled, watering job ends".to_owned(),
                );
                break;
            }

            let deactivation = timing.deactivation_duration();
            self.deactivate(hardware.as_ref(), timing.as_ref(), still_on, stop);
            if stop.wait_timeout(deactivation) {
                break;
            }

            let n = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("Watering: cycle {n} completed");
            self.sink.emit(&WateringEvent::CycleCompleted(n));
        }

        self.transition(CycleState::TearingDown);
        self.transition(CycleState::Disabled);
        let cycles = self.cycles.load(Ordering::SeqCst);
        info!("Watering: worker finished after {cycles} cycle(s)");
        self.sink.emit(&WateringEvent::Stopped { cycles });
        self.running.store(false, Ordering::SeqCst);
    }

    /// Last-resort cleanup after the worker died mid-cycle.
    fn force_off(&self) {
        let hardware = self.hardware();
        let _access = self.access.acquire();
        for role in DeviceRole::ALL {
            hardware.with_output(role, &mut |out| out.deactivate());
        }
        self.state
            .store(CycleState::Disabled as u8, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct RunHandle {
    stop: Arc<StopSignal>,
    thread: JoinHandle<()>,
}

/// Runs the daily watering cycle on a background thread.
///
/// All methods take `&self` and may be called from any thread. Start and
/// stop are serialised against each other; a second stop arriving while
/// one is in flight waits for it and then finds nothing to stop.
pub struct WateringScheduler {
    shared: Arc<Shared>,
    run: Mutex<Option<RunHandle>>,
}

impl WateringScheduler {
    pub fn new(
        access: HardwareLock,
        hardware: Arc<dyn WateringHardware>,
        timing: Arc<dyn TimeProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(CycleState::Disabled as u8),
                running: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
                valve_enabled: AtomicBool::new(true),
                pump_enabled: AtomicBool::new(true),
                hardware: RwLock::new(hardware),
                timing: RwLock::new(timing),
                access,
                sink,
            }),
            run: Mutex::new(None),
        }
    }

    /// Start a watering job. `flow` may be `None` or [`CYCLED_FLOW`].
    ///
    /// Returns `false` (with a warning, nothing spawned) when the job is
    /// already running, no device is enabled, or the flow is unknown.
    pub fn start_automatic_watering(&self, flow: Option<&str>) -> bool {
        let shared = &self.shared;
        if let Some(name) = flow.filter(|name| *name != CYCLED_FLOW) {
            shared.report(
                Level::Warn,
                format!("unknown watering flow '{name}', only '{CYCLED_FLOW}' is supported"),
            );
            return false;
        }

        let mut run = self.run_handle();
        if shared.running.load(Ordering::SeqCst) {
            shared.report(Level::Warn, "watering job is already running".to_owned());
            return false;
        }
        if !shared.enabled().any() {
            shared.report(
                Level::Warn,
                "no device enabled, watering job not started".to_owned(),
            );
            return false;
        }
        // A self-terminated worker leaves its handle behind.
        if let Some(previous) = run.take() {
            self.join(previous);
        }

        shared.cycles.store(0, Ordering::SeqCst);
        shared.running.store(true, Ordering::SeqCst);
        shared.sink.emit(&WateringEvent::Started { flow: CYCLED_FLOW });

        let stop = Arc::new(StopSignal::new());
        let spawned = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn({
                let shared = Arc::clone(shared);
                let stop = Arc::clone(&stop);
                move || shared.run_cycles(&stop)
            });

        match spawned {
            Ok(thread) => {
                info!("Watering: job started (flow '{CYCLED_FLOW}')");
                *run = Some(RunHandle { stop, thread });
                true
            }
            Err(e) => {
                shared.running.store(false, Ordering::SeqCst);
                shared.report(Level::Error, format!("cannot spawn watering worker: {e}"));
                false
            }
        }
    }

    /// Stop the running job and wait until it is `Disabled`.
    pub fn request_shutdown(&self) {
        self.stop_run("shutdown", true);
    }

    /// Same stop routine as [`request_shutdown`](Self::request_shutdown);
    /// outputs still go off valve-first.
    pub fn emergency_abort(&self) {
        self.stop_run("emergency abort", true);
    }

    pub fn set_water_valve_enabled(&self, enabled: bool) {
        self.shared.valve_enabled.store(enabled, Ordering::SeqCst);
        info!("Watering: water valve {}", enabled_word(enabled));
    }

    pub fn set_water_pump_enabled(&self, enabled: bool) {
        self.shared.pump_enabled.store(enabled, Ordering::SeqCst);
        info!("Watering: water pump {}", enabled_word(enabled));
    }

    pub fn is_water_valve_enabled(&self) -> bool {
        self.shared.valve_enabled.load(Ordering::SeqCst)
    }

    pub fn is_water_pump_enabled(&self) -> bool {
        self.shared.pump_enabled.load(Ordering::SeqCst)
    }

    /// True from a successful start until the worker has finished.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> CycleState {
        self.shared.state()
    }

    pub fn completed_cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::SeqCst)
    }

    pub fn hardware_controller(&self) -> Arc<dyn WateringHardware> {
        self.shared.hardware()
    }

    pub fn time_provider(&self) -> Arc<dyn TimeProvider> {
        self.shared.timing()
    }

    /// Replace the hardware controller. The worker picks it up at the
    /// start of its next iteration.
    pub fn set_hardware_controller(&self, hardware: Arc<dyn WateringHardware>) {
        *self
            .shared
            .hardware
            .write()
            .unwrap_or_else(PoisonError::into_inner) = hardware;
        info!("Watering: hardware controller replaced");
    }

    pub fn set_time_provider(&self, timing: Arc<dyn TimeProvider>) {
        *self
            .shared
            .timing
            .write()
            .unwrap_or_else(PoisonError::into_inner) = timing;
        info!("Watering: time provider replaced");
    }

    /// Dual-logged notice on behalf of code extending the scheduler.
    pub(crate) fn report(&self, level: Level, message: String) {
        self.shared.report(level, message);
    }

    /// Snapshot for display.
    pub fn status(&self) -> WateringStatus {
        let hardware = self.shared.hardware();
        let timing = self.shared.timing();
        let enabled = self.shared.enabled();
        let device = |role| {
            let line = hardware.output_status(role);
            DeviceStatus {
                role,
                enabled: enabled.of(role),
                pin: (enabled.of(role) && line.is_some()).then(|| hardware.output_offset(role)),
                polarity: hardware.output_polarity(role),
                line,
            }
        };
        WateringStatus {
            state: self.state(),
            running: self.is_running(),
            completed_cycles: self.completed_cycles(),
            valve: device(DeviceRole::Valve),
            pump: device(DeviceRole::Pump),
            activation: timing.activation_duration(),
            deactivation: timing.deactivation_duration(),
            separation: timing.valve_pump_separation(),
        }
    }

    fn run_handle(&self) -> MutexGuard<'_, Option<RunHandle>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_run(&self, origin: &str, report_idle: bool) {
        let mut run = self.run_handle();
        let handle = run.take();
        match handle {
            Some(handle) if self.is_running() => {
                info!("Watering: {origin} requested, waiting for the worker");
                handle.stop.request();
                self.join(handle);
                self.shared.cycles.store(0, Ordering::SeqCst);
                info!("Watering: {origin} complete");
            }
            leftover => {
                if let Some(handle) = leftover {
                    self.join(handle);
                }
                if report_idle {
                    self.shared.report(
                        Level::Warn,
                        format!("{origin} ignored, watering job is not running"),
                    );
                }
            }
        }
    }

    fn join(&self, handle: RunHandle) {
        if handle.thread.join().is_err() {
            self.shared.report(
                Level::Error,
                "watering worker panicked, forcing outputs off".to_owned(),
            );
            self.shared.force_off();
        }
    }
}

fn enabled_word(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

impl Terminable for WateringScheduler {
    fn request_shutdown(&self) {
        WateringScheduler::request_shutdown(self);
    }
}

impl EmergencyStoppable for WateringScheduler {
    fn emergency_abort(&self) {
        WateringScheduler::emergency_abort(self);
    }
}

impl Drop for WateringScheduler {
    fn drop(&mut self) {
        self.stop_run("teardown", false);
    }
}
