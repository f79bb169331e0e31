//! Legacy automatic-watering layout upgrade.
//!
//! Older projects stored the devices as four flat values under `flow`:
//!
//! ```json
//! "flow": { "isWaterValveEnabled": true, "valvePinID": 17,
//!           "isWaterPumpEnabled": true,  "pumpPinID": 27, ... }
//! ```
//!
//! The current layout has a `devices` array with one object per device.
//! Legacy boards were wired active-low, so that is the polarity written.

use serde_json::{Map, Value, json};

use crate::app::ports::DeviceRole;
use crate::error::ProjectError;
use crate::pins::Polarity;

use super::ProjectDocument;
use super::watering::{AWS_SECTION, DEVICES_KEY, FLOW_KEY};

const LEGACY_VALVE_ENABLED: &str = "isWaterValveEnabled";
const LEGACY_PUMP_ENABLED: &str = "isWaterPumpEnabled";
const LEGACY_VALVE_PIN: &str = "valvePinID";
const LEGACY_PUMP_PIN: &str = "pumpPinID";

const LEGACY_KEYS: [&str; 4] = [
    LEGACY_VALVE_ENABLED,
    LEGACY_PUMP_ENABLED,
    LEGACY_VALVE_PIN,
    LEGACY_PUMP_PIN,
];

/// Rewrite a legacy `flow` into the `devices` layout.
///
/// Returns `Ok(true)` when the document changed. Documents without a
/// watering section, or already in the current layout, are left alone,
/// so running this twice is harmless.
pub fn upgrade_legacy_flow(project: &mut ProjectDocument) -> Result<bool, ProjectError> {
    let Some(section) = project.section_mut(AWS_SECTION) else {
        return Ok(false);
    };
    let flow = section
        .get_mut(FLOW_KEY)
        .and_then(Value::as_object_mut)
        .ok_or(ProjectError::Missing(FLOW_KEY))?;

    if flow.contains_key(DEVICES_KEY) || !LEGACY_KEYS.iter().any(|k| flow.contains_key(*k)) {
        return Ok(false);
    }

    let valve = legacy_device(flow, DeviceRole::Valve, LEGACY_VALVE_ENABLED, LEGACY_VALVE_PIN)?;
    let pump = legacy_device(flow, DeviceRole::Pump, LEGACY_PUMP_ENABLED, LEGACY_PUMP_PIN)?;

    for key in LEGACY_KEYS {
        flow.remove(key);
    }
    flow.insert(DEVICES_KEY.to_owned(), Value::Array(vec![valve, pump]));
    Ok(true)
}

fn legacy_device(
    flow: &Map<String, Value>,
    role: DeviceRole,
    enabled_key: &'static str,
    pin_key: &'static str,
) -> Result<Value, ProjectError> {
    let enabled = flow
        .get(enabled_key)
        .and_then(Value::as_bool)
        .ok_or(ProjectError::Missing(enabled_key))?;
    // Pins of disabled devices were never meaningful; store 0.
    let pin = if enabled {
        flow.get(pin_key)
            .and_then(Value::as_u64)
            .ok_or(ProjectError::Missing(pin_key))?
    } else {
        0
    };
    Ok(json!({
        "name": role.project_name(),
        "pinID": pin,
        "activationState": Polarity::ActiveLow.label(),
        "enabled": enabled,
    }))
}
