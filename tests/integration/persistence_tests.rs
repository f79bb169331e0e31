//! Integration tests for saving and loading watering settings.

use std::sync::Arc;
use std::time::Duration;

use greenhouse::app::ports::{DeviceRole, ProjectComponent, TimeProvider};
use greenhouse::app::service::{CommandLimits, WateringService};
use greenhouse::config::SystemConfig;
use greenhouse::error::{Error, ProjectError};
use greenhouse::project::ProjectDocument;
use greenhouse::project::watering::AWS_SECTION;
use serde_json::json;

use crate::mock_hw::{PUMP, Rig, VALVE};

fn configured_rig() -> Rig {
    let rig = Rig::new(1500, 90_000, 250);
    let hw = rig.scheduler.hardware_controller();
    hw.set_valve_output_id(5).unwrap();
    hw.set_pump_output_id(6).unwrap();
    rig
}

#[test]
fn save_then_load_reproduces_settings() {
    let source = configured_rig();
    let mut doc = ProjectDocument::new("round-trip");
    source.scheduler.save_to_project(&mut doc).unwrap();

    let target = Rig::new(1, 1, 1);
    target.scheduler.load_from_project(&doc).unwrap();

    assert_eq!(target.scheduler.config_section(), source.scheduler.config_section());
    let st = target.scheduler.status();
    assert_eq!(st.valve.pin, Some(5));
    assert_eq!(st.pump.pin, Some(6));
    assert_eq!(st.activation, Duration::from_millis(1500));
    assert_eq!(st.deactivation, Duration::from_millis(90_000));
    assert_eq!(st.separation, Duration::from_millis(250));
    assert!(target.chip.is_claimed(5));
    assert!(!target.chip.is_claimed(VALVE));
}

#[test]
fn swapped_pins_survive_a_round_trip() {
    let source = Rig::new(10, 10, 10);
    source.scheduler.hardware_controller().rebind(Some(PUMP), Some(VALVE)).unwrap();
    let mut doc = ProjectDocument::new("swapped");
    source.scheduler.save_to_project(&mut doc).unwrap();

    let target = Rig::new(1, 1, 1);
    target.scheduler.load_from_project(&doc).unwrap();

    let st = target.scheduler.status();
    assert_eq!(st.valve.pin, Some(PUMP));
    assert_eq!(st.pump.pin, Some(VALVE));
    assert!(target.chip.is_claimed(VALVE));
    assert!(target.chip.is_claimed(PUMP));
    assert_eq!(target.scheduler.config_section(), source.scheduler.config_section());
}

#[test]
fn load_warnings_reach_the_operator() {
    let mut doc = ProjectDocument::new("mismatch");
    doc.set_section(
        AWS_SECTION,
        json!({
            "mode": "cycled",
            "flow": {
                "activationTime": 1, "deactivationTime": 1, "deactivationSepTime": 1,
                "devices": [
                    { "name": "waterValve", "pinID": 3, "activationState": "Active High", "enabled": true }
                ]
            }
        }),
    );
    let rig = Rig::new(1, 1, 1);
    rig.scheduler.load_config(&doc).unwrap();

    let warnings = rig.sink.notices(log::Level::Warn);
    assert!(warnings.iter().any(|m| m.contains("water valve stored as Active High")));
    assert!(warnings.iter().any(|m| m.contains("no 'waterPump' entry")));
    assert_eq!(rig.scheduler.status().valve.pin, Some(3));
}

#[test]
fn saved_section_has_the_project_shape() {
    let rig = configured_rig();
    rig.scheduler.set_water_pump_enabled(false);
    let mut doc = ProjectDocument::new("shape");
    rig.scheduler.save_config(&mut doc).unwrap();

    assert_eq!(
        doc.section(AWS_SECTION).unwrap(),
        &json!({
            "mode": "cycled",
            "flow": {
                "activationTime": 1500,
                "deactivationTime": 90000,
                "deactivationSepTime": 250,
                "devices": [
                    { "name": "waterValve", "pinID": 5, "activationState": "Active Low", "enabled": true },
                    { "name": "waterPump", "pinID": 0, "activationState": "Active Low", "enabled": false }
                ]
            }
        })
    );
}

#[test]
fn disabled_device_keeps_its_line_on_load() {
    let source = configured_rig();
    source.scheduler.set_water_pump_enabled(false);
    let mut doc = ProjectDocument::new("partial");
    source.scheduler.save_config(&mut doc).unwrap();

    let target = Rig::new(1, 1, 1);
    target.scheduler.load_config(&doc).unwrap();
    assert!(!target.scheduler.is_water_pump_enabled());
    assert_eq!(
        target
            .scheduler
            .hardware_controller()
            .output_offset(DeviceRole::Pump),
        PUMP
    );
}

#[test]
fn legacy_project_upgrades_then_loads() {
    let mut doc = ProjectDocument::from_value(json!({
        "title": "greenhouse-2022",
        "version": "1.1.0",
        "automaticWateringSystem": {
            "mode": "cycled",
            "flow": {
                "activationTime": 4000,
                "deactivationTime": 300000,
                "deactivationSepTime": 700,
                "isWaterValveEnabled": true,
                "isWaterPumpEnabled": false,
                "valvePinID": 12,
                "pumpPinID": 13
            }
        }
    }))
    .unwrap();
    doc.apply_integrity_fixes().unwrap();

    let rig = Rig::new(1, 1, 1);
    rig.scheduler.load_config(&doc).unwrap();
    let st = rig.scheduler.status();
    assert_eq!(st.valve.pin, Some(12));
    assert!(!st.pump.enabled);
    assert_eq!(st.activation, Duration::from_millis(4000));
    assert_eq!(rig.timing.valve_pump_separation(), Duration::from_millis(700));
}

#[test]
fn unsupported_mode_is_rejected() {
    let doc = ProjectDocument::from_value(json!({
        "title": "weekly",
        "automaticWateringSystem": {
            "mode": "weekly",
            "flow": {
                "activationTime": 1, "deactivationTime": 1, "deactivationSepTime": 1,
                "devices": []
            }
        }
    }))
    .unwrap();
    let rig = Rig::new(1, 1, 1);
    let r = rig.scheduler.load_config(&doc);
    assert!(matches!(
        r,
        Err(Error::Project(ProjectError::UnsupportedMode(m))) if m == "weekly"
    ));
}

#[test]
fn project_without_watering_section_changes_nothing() {
    let rig = Rig::new(42, 43, 44);
    rig.scheduler
        .load_config(&ProjectDocument::new("empty"))
        .unwrap();
    assert_eq!(rig.scheduler.status().activation, Duration::from_millis(42));
}

#[test]
fn service_saves_and_reloads_a_project_file() {
    let path = std::env::temp_dir().join(format!("gh-service-{}.json", std::process::id()));

    let source = configured_rig();
    let mut service = WateringService::new(
        Arc::new(source.scheduler),
        CommandLimits::from(&SystemConfig::default()),
        source.sink.clone(),
    );
    service.save_project(Some(&path)).unwrap();

    let target = Rig::new(1, 1, 1);
    let mut reloaded = WateringService::new(
        Arc::new(target.scheduler),
        CommandLimits::from(&SystemConfig::default()),
        target.sink.clone(),
    );
    reloaded.load_project(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(reloaded.status().valve.pin, Some(5));
    assert_eq!(reloaded.status().activation, Duration::from_millis(1500));
    assert_eq!(reloaded.project().and_then(|p| p.title()), Some("unknown-project"));
}
