//! Application service, the command side of the watering core.
//!
//! [`WateringService`] turns typed commands into calls on the scheduler,
//! its hardware controller and its time provider. It owns the checks the
//! core components deliberately skip: numeric operator input is clamped to
//! `[0, max]` here, with a warning when a value had to be adjusted.
//!
//! ```text
//!  console ──▶ ConsoleCommand ──▶ ┌──────────────────┐ ──▶ EventSink
//!                                 │ WateringService   │
//!           WateringCommand ────▶ │ clamp · dispatch  │ ──▶ WateringScheduler
//!                                 └──────────────────┘ ──▶ ProjectDocument
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{Level, info};

use crate::config::SystemConfig;
use crate::diagnostics::WateringStatus;
use crate::error::Error;
use crate::pins::PinOffset;
use crate::project::{ProjectDocument, UNKNOWN_TITLE};
use crate::scheduler::WateringScheduler;

use super::commands::{ConsoleCommand, ProjectCommand, WateringCommand};
use super::events::WateringEvent;
use super::ports::{DeviceRole, EmergencyStoppable, EventSink, ProjectComponent, Terminable};

// ───────────────────────────────────────────────────────────────
// Limits
// ───────────────────────────────────────────────────────────────

/// Upper bounds for operator-supplied numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLimits {
    pub max_duration_ms: u64,
    pub max_pin_offset: PinOffset,
}

impl From<&SystemConfig> for CommandLimits {
    fn from(config: &SystemConfig) -> Self {
        Self {
            max_duration_ms: config.max_duration_ms,
            max_pin_offset: config.max_pin_offset,
        }
    }
}

/// Result of one console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutcome {
    Done,
    /// Text for the operator.
    Print(String),
    /// The console should stop reading input.
    Exit,
}

// ───────────────────────────────────────────────────────────────
// WateringService
// ───────────────────────────────────────────────────────────────

pub struct WateringService {
    scheduler: Arc<WateringScheduler>,
    limits: CommandLimits,
    sink: Arc<dyn EventSink>,
    components: Vec<Arc<dyn ProjectComponent + Send + Sync>>,
    stoppables: Vec<Arc<dyn EmergencyStoppable + Send + Sync>>,
    terminables: Vec<Arc<dyn Terminable + Send + Sync>>,
    project: Option<ProjectDocument>,
}

impl WateringService {
    /// The scheduler is registered as a project component, an
    /// emergency-stoppable system and a terminable system.
    pub fn new(
        scheduler: Arc<WateringScheduler>,
        limits: CommandLimits,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let component: Arc<dyn ProjectComponent + Send + Sync> = scheduler.clone();
        let stoppable: Arc<dyn EmergencyStoppable + Send + Sync> = scheduler.clone();
        let terminable: Arc<dyn Terminable + Send + Sync> = scheduler.clone();
        Self {
            components: vec![component],
            stoppables: vec![stoppable],
            terminables: vec![terminable],
            scheduler,
            limits,
            sink,
            project: None,
        }
    }

    pub fn scheduler(&self) -> &Arc<WateringScheduler> {
        &self.scheduler
    }

    pub fn project(&self) -> Option<&ProjectDocument> {
        self.project.as_ref()
    }

    pub fn status(&self) -> WateringStatus {
        self.scheduler.status()
    }

    // ── Watering commands ─────────────────────────────────────

    /// Apply one watering command. Only pin reassignment can fail.
    pub fn handle_command(&self, cmd: WateringCommand) -> Result<(), Error> {
        let timing = self.scheduler.time_provider();
        match cmd {
            WateringCommand::Start { flow } => {
                self.scheduler.start_automatic_watering(flow.as_deref());
            }
            WateringCommand::Stop => self.scheduler.request_shutdown(),
            WateringCommand::SetActivationTime(ms) => {
                let ms = self.clamp("activation time", ms, self.limits.max_duration_ms);
                timing.set_activation_duration(Duration::from_millis(ms));
                info!("Service: activation time set to {ms} ms");
            }
            WateringCommand::SetDeactivationTime(ms) => {
                let ms = self.clamp("deactivation time", ms, self.limits.max_duration_ms);
                timing.set_deactivation_duration(Duration::from_millis(ms));
                info!("Service: deactivation time set to {ms} ms");
            }
            WateringCommand::SetSeparationTime(ms) => {
                let ms = self.clamp("valve/pump separation", ms, self.limits.max_duration_ms);
                timing.set_valve_pump_separation(Duration::from_millis(ms));
                info!("Service: valve/pump separation set to {ms} ms");
            }
            WateringCommand::SetValvePin(pin) => self.move_pin(DeviceRole::Valve, pin)?,
            WateringCommand::SetPumpPin(pin) => self.move_pin(DeviceRole::Pump, pin)?,
            WateringCommand::EnableValve => self.scheduler.set_water_valve_enabled(true),
            WateringCommand::DisableValve => self.scheduler.set_water_valve_enabled(false),
            WateringCommand::EnablePump => self.scheduler.set_water_pump_enabled(true),
            WateringCommand::DisablePump => self.scheduler.set_water_pump_enabled(false),
        }
        Ok(())
    }

    fn move_pin(&self, role: DeviceRole, requested: i64) -> Result<(), Error> {
        let max = u64::from(self.limits.max_pin_offset);
        let pin = self.clamp(role.label(), requested, max);
        // `pin <= max_pin_offset`, so the conversion cannot fail.
        let pin = PinOffset::try_from(pin).unwrap_or(self.limits.max_pin_offset);
        let hardware = self.scheduler.hardware_controller();
        if let Err(e) = hardware.set_output_offset(role, pin) {
            self.report(
                Level::Error,
                format!("cannot move the {} to line {pin}: {e}", role.label()),
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Clamp `value` into `[0, max]`, warning when it had to move.
    fn clamp(&self, what: &str, value: i64, max: u64) -> u64 {
        let clamped = u64::try_from(value).unwrap_or(0).min(max);
        if i128::from(value) != i128::from(clamped) {
            self.report(
                Level::Warn,
                format!("{what} {value} out of range [0, {max}], using {clamped}"),
            );
        }
        clamped
    }

    fn report(&self, level: Level, message: String) {
        log::log!(level, "Service: {message}");
        self.sink.emit(&WateringEvent::notice(level, message));
    }

    // ── Application commands ──────────────────────────────────

    /// Stop every registered system as fast as possible.
    pub fn abort(&self) {
        self.report(Level::Warn, "ABORT COMMAND ISSUED, starting emergency abort".to_owned());
        for system in &self.stoppables {
            system.emergency_abort();
        }
        self.report(Level::Warn, "emergency abort finished".to_owned());
    }

    /// Orderly stop of every registered system.
    pub fn shutdown(&self) {
        info!("Service: tearing down");
        for system in &self.terminables {
            system.request_shutdown();
        }
    }

    /// Read a project file and hand it to every component.
    pub fn load_project(&mut self, path: &Path) -> Result<(), Error> {
        let doc = ProjectDocument::read(path)?;
        for component in &self.components {
            component.load_from_project(&doc)?;
        }
        info!(
            "Service: project '{}' loaded",
            doc.title().unwrap_or(UNKNOWN_TITLE)
        );
        self.project = Some(doc);
        Ok(())
    }

    /// Collect every component into the current project (or a new one)
    /// and write it to `path`, by default `<title>.json`.
    pub fn save_project(&mut self, path: Option<&Path>) -> Result<(), Error> {
        let doc = self
            .project
            .get_or_insert_with(|| ProjectDocument::new(UNKNOWN_TITLE));
        for component in &self.components {
            component.save_to_project(doc)?;
        }
        let target = path.map_or_else(|| doc.default_path(), Path::to_path_buf);
        doc.write(&target)?;
        Ok(())
    }

    /// Dispatch one parsed console command.
    pub fn execute(&mut self, cmd: ConsoleCommand) -> Result<ConsoleOutcome, Error> {
        match cmd {
            ConsoleCommand::AutoWatering(options) => {
                for c in options.into_commands() {
                    self.handle_command(c)?;
                }
                Ok(ConsoleOutcome::Done)
            }
            ConsoleCommand::Status => Ok(ConsoleOutcome::Print(self.status().to_string())),
            ConsoleCommand::Abort => {
                self.abort();
                Ok(ConsoleOutcome::Done)
            }
            ConsoleCommand::Project(options) => {
                match options.into_command() {
                    Some(ProjectCommand::Load(path)) => self.load_project(&path)?,
                    Some(ProjectCommand::Save(path)) => self.save_project(path.as_deref())?,
                    None => {}
                }
                Ok(ConsoleOutcome::Done)
            }
            ConsoleCommand::Version => Ok(ConsoleOutcome::Print(format!(
                "{} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))),
            ConsoleCommand::Exit => {
                self.shutdown();
                Ok(ConsoleOutcome::Exit)
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Unit tests
// ───────────────────────────────────────────────────────────────
