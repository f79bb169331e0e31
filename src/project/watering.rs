//! `automaticWateringSystem` project section.
//!
//! ```json
//! "automaticWateringSystem": {
//!   "mode": "cycled",
//!   "flow": {
//!     "activationTime": 6000, "deactivationTime": 600000, "deactivationSepTime": 600,
//!     "devices": [
//!       { "name": "waterValve", "pinID": 17, "activationState": "Active Low", "enabled": true },
//!       { "name": "waterPump",  "pinID": 27, "activationState": "Active Low", "enabled": true }
//!     ]
//!   }
//! }
//! ```

use std::time::Duration;

use log::{Level, info};
use serde::{Deserialize, Serialize};

use crate::app::ports::{DeviceRole, ProjectComponent};
use crate::error::{Error, ProjectError};
use crate::pins::{PinOffset, Polarity};
use crate::scheduler::{CYCLED_FLOW, WateringScheduler};

use super::ProjectDocument;

pub const AWS_SECTION: &str = "automaticWateringSystem";
pub const FLOW_KEY: &str = "flow";
pub const DEVICES_KEY: &str = "devices";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticWateringSection {
    pub mode: String,
    pub flow: FlowSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSection {
    pub activation_time: u64,
    pub deactivation_time: u64,
    pub deactivation_sep_time: u64,
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    pub name: String,
    #[serde(rename = "pinID")]
    pub pin_id: u64,
    pub activation_state: Polarity,
    pub enabled: bool,
}

impl FlowSection {
    pub fn device(&self, role: DeviceRole) -> Option<&DeviceEntry> {
        self.devices.iter().find(|d| d.name == role.project_name())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl WateringScheduler {
    /// Current settings as a project section.
    pub fn config_section(&self) -> AutomaticWateringSection {
        let hardware = self.hardware_controller();
        let timing = self.time_provider();
        let devices = DeviceRole::ALL
            .into_iter()
            .map(|role| {
                let enabled = match role {
                    DeviceRole::Valve => self.is_water_valve_enabled(),
                    DeviceRole::Pump => self.is_water_pump_enabled(),
                };
                let bound = hardware.is_bound(role);
                if enabled && !bound {
                    self.report(
                        Level::Warn,
                        format!("{} has no bound line, saved without a pin", role.label()),
                    );
                }
                DeviceEntry {
                    name: role.project_name().to_owned(),
                    pin_id: if enabled && bound {
                        u64::from(hardware.output_offset(role))
                    } else {
                        0
                    },
                    activation_state: hardware.output_polarity(role),
                    enabled,
                }
            })
            .collect();

        AutomaticWateringSection {
            mode: CYCLED_FLOW.to_owned(),
            flow: FlowSection {
                activation_time: millis(timing.activation_duration()),
                deactivation_time: millis(timing.deactivation_duration()),
                deactivation_sep_time: millis(timing.valve_pump_separation()),
                devices,
            },
        }
    }

    pub fn save_config(&self, project: &mut ProjectDocument) -> Result<(), ProjectError> {
        let section = serde_json::to_value(self.config_section())?;
        project.set_section(AWS_SECTION, section);
        info!("Project: automatic watering settings saved");
        Ok(())
    }

    /// Apply a stored section. Pins are reassigned only for enabled
    /// devices; a disabled device keeps whatever line it has. Both pins
    /// move in one [`rebind`](crate::app::ports::WateringHardware::rebind), so a project may
    /// swap the valve and pump lines.
    pub fn load_config(&self, project: &ProjectDocument) -> Result<(), Error> {
        let Some(raw) = project.section(AWS_SECTION) else {
            info!("Project: no automatic watering section, keeping current settings");
            return Ok(());
        };
        let section: AutomaticWateringSection = serde_json::from_value(raw.clone())
            .map_err(|e| ProjectError::Malformed(format!("{AWS_SECTION}: {e}")))?;
        if section.mode != CYCLED_FLOW {
            return Err(ProjectError::UnsupportedMode(section.mode).into());
        }
        if self.is_running() {
            self.report(
                Level::Warn,
                "loading watering settings while a job is running".to_owned(),
            );
        }

        let hardware = self.hardware_controller();
        let mut pins: [Option<PinOffset>; 2] = [None, None];
        let mut flags: [Option<bool>; 2] = [None, None];
        for (i, role) in DeviceRole::ALL.into_iter().enumerate() {
            let Some(entry) = section.flow.device(role) else {
                self.report(
                    Level::Warn,
                    format!("project has no '{}' entry, left unchanged", role.project_name()),
                );
                continue;
            };
            let wired = hardware.output_polarity(role);
            if entry.activation_state != wired {
                self.report(
                    Level::Warn,
                    format!(
                        "{} stored as {}, wired as {wired}; keeping wiring",
                        role.label(),
                        entry.activation_state
                    ),
                );
            }
            if entry.enabled {
                let pin = PinOffset::try_from(entry.pin_id).map_err(|_| {
                    ProjectError::Malformed(format!("pinID {} out of range", entry.pin_id))
                })?;
                pins[i] = Some(pin);
            }
            flags[i] = Some(entry.enabled);
        }

        hardware.rebind(pins[0], pins[1])?;
        if let Some(enabled) = flags[0] {
            self.set_water_valve_enabled(enabled);
        }
        if let Some(enabled) = flags[1] {
            self.set_water_pump_enabled(enabled);
        }

        let timing = self.time_provider();
        timing.set_activation_duration(Duration::from_millis(section.flow.activation_time));
        timing.set_deactivation_duration(Duration::from_millis(section.flow.deactivation_time));
        timing.set_valve_pump_separation(Duration::from_millis(section.flow.deactivation_sep_time));
        info!("Project: automatic watering settings loaded");
        Ok(())
    }
}

impl ProjectComponent for WateringScheduler {
    fn save_to_project(&self, project: &mut ProjectDocument) -> Result<(), ProjectError> {
        self.save_config(project)
    }

    fn load_from_project(&self, project: &ProjectDocument) -> Result<(), Error> {
        self.load_config(project)
    }
}
