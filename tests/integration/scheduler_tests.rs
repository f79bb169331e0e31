//! Integration tests for the watering scheduler against recording hardware.
//!
//! Timing assertions use generous upper bounds; lower bounds (the
//! valve/pump gap) are exact because the worker sleeps at least as long
//! as asked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use greenhouse::adapters::time::ConfigurableTimeProvider;
use greenhouse::app::events::WateringEvent;
use greenhouse::app::ports::{TimeProvider, WateringHardware};
use greenhouse::scheduler::CycleState;

use crate::mock_hw::{Call, PUMP, Rig, VALVE, wait_for};

// ── Ordering ──────────────────────────────────────────────────

#[test]
fn valve_activates_before_pump() {
    let rig = Rig::new(50, 1000, 0);
    assert!(rig.scheduler.start_automatic_watering(None));
    wait_for("pump activation", || rig.chip.journal.count(Call::Activate(PUMP)) == 1);

    let valve = rig.chip.journal.position(Call::Activate(VALVE)).unwrap();
    let pump = rig.chip.journal.position(Call::Activate(PUMP)).unwrap();
    assert!(valve < pump);
    rig.scheduler.request_shutdown();
}

#[test]
fn valve_closes_first_and_pump_waits_the_separation() {
    let rig = Rig::new(20, 1000, 80);
    rig.scheduler.start_automatic_watering(None);
    wait_for("pump deactivation", || {
        rig.chip.journal.count(Call::Deactivate(PUMP)) >= 1
    });

    let (vi, vt) = rig.chip.journal.first_at(Call::Deactivate(VALVE), 0).unwrap();
    let (pi, pt) = rig.chip.journal.first_at(Call::Deactivate(PUMP), vi).unwrap();
    assert!(vi < pi);
    assert!(
        pt.duration_since(vt) >= Duration::from_millis(80),
        "gap was {:?}",
        pt.duration_since(vt)
    );
    rig.scheduler.request_shutdown();
}

#[test]
fn single_device_never_touches_the_other() {
    let rig = Rig::new(20, 1000, 500);
    rig.scheduler.set_water_pump_enabled(false);
    rig.scheduler.start_automatic_watering(None);
    wait_for("valve deactivation", || {
        rig.chip.journal.count(Call::Deactivate(VALVE)) >= 1
    });
    let t0 = Instant::now();
    rig.scheduler.request_shutdown();
    assert!(t0.elapsed() < Duration::from_millis(400));
    assert_eq!(rig.chip.journal.count(Call::Activate(PUMP)), 0);
}

// ── Enable flags ──────────────────────────────────────────────

#[test]
fn device_disabled_mid_cycle_goes_off_before_next_activation() {
    let rig = Rig::new(150, 150, 0);
    rig.scheduler.start_automatic_watering(None);
    wait_for("first activation", || {
        rig.chip.journal.count(Call::Activate(PUMP)) == 1
    });
    assert_eq!(rig.scheduler.state(), CycleState::Irrigating);
    rig.scheduler.set_water_pump_enabled(false);

    wait_for("second valve activation", || {
        rig.chip.journal.count(Call::Activate(VALVE)) >= 2
    });
    rig.scheduler.request_shutdown();

    let (second, _) = rig
        .chip
        .journal
        .first_at(Call::Activate(VALVE), 1 + rig.chip.journal.position(Call::Activate(VALVE)).unwrap())
        .unwrap();
    let pump_off = rig.chip.journal.position(Call::Deactivate(PUMP)).unwrap();
    assert!(pump_off < second);
    assert_eq!(rig.chip.journal.count(Call::Activate(PUMP)), 1);
    assert!(
        rig.sink
            .notices(log::Level::Info)
            .iter()
            .any(|m| m.contains("water pump disabled during the cycle"))
    );
}

#[test]
fn disabling_both_devices_ends_the_job() {
    let rig = Rig::new(100, 100, 0);
    rig.scheduler.start_automatic_watering(None);
    wait_for("activation", || rig.chip.journal.count(Call::Activate(PUMP)) == 1);

    rig.scheduler.set_water_valve_enabled(false);
    rig.scheduler.set_water_pump_enabled(false);
    wait_for("self termination", || !rig.scheduler.is_running());

    assert_eq!(rig.scheduler.state(), CycleState::Disabled);
    assert_eq!(rig.chip.journal.count(Call::Deactivate(VALVE)), 1);
    assert_eq!(rig.chip.journal.count(Call::Deactivate(PUMP)), 1);
    assert!(
        rig.sink
            .notices(log::Level::Info)
            .iter()
            .any(|m| m.contains("both devices disabled"))
    );
}

#[test]
fn restart_after_self_termination_resets_the_counter() {
    let rig = Rig::new(5, 5, 0);
    rig.scheduler.start_automatic_watering(None);
    wait_for("two cycles", || rig.scheduler.completed_cycles() >= 2);
    rig.scheduler.set_water_valve_enabled(false);
    rig.scheduler.set_water_pump_enabled(false);
    wait_for("self termination", || !rig.scheduler.is_running());
    assert!(rig.scheduler.completed_cycles() >= 2);

    rig.timing.set_activation_duration(Duration::from_secs(10));
    rig.scheduler.set_water_valve_enabled(true);
    assert!(rig.scheduler.start_automatic_watering(None));
    assert_eq!(rig.scheduler.completed_cycles(), 0);
    rig.scheduler.request_shutdown();
}

// ── Start/stop guards ─────────────────────────────────────────

#[test]
fn second_start_is_a_no_op() {
    let rig = Rig::new(500, 500, 0);
    assert!(rig.scheduler.start_automatic_watering(None));
    wait_for("activation", || rig.chip.journal.count(Call::Activate(PUMP)) == 1);

    assert!(!rig.scheduler.start_automatic_watering(None));
    assert_eq!(rig.chip.journal.count(Call::Activate(VALVE)), 1);
    assert_eq!(rig.scheduler.completed_cycles(), 0);
    assert_eq!(
        rig.sink.notices(log::Level::Warn),
        vec!["watering job is already running".to_owned()]
    );
    rig.scheduler.request_shutdown();
}

#[test]
fn shutdown_during_irrigation_is_prompt() {
    let rig = Rig::new(60_000, 60_000, 0);
    rig.scheduler.start_automatic_watering(None);
    wait_for("activation", || rig.chip.journal.count(Call::Activate(PUMP)) == 1);

    let t0 = Instant::now();
    rig.scheduler.request_shutdown();
    assert!(t0.elapsed() < Duration::from_secs(1));
    assert_eq!(rig.scheduler.state(), CycleState::Disabled);
    assert_eq!(rig.chip.journal.count(Call::Deactivate(PUMP)), 1);
}

#[test]
fn shutdown_during_idle_is_prompt() {
    let rig = Rig::new(10, 60_000, 0);
    rig.scheduler.start_automatic_watering(None);
    wait_for("idle", || {
        rig.chip.journal.count(Call::Deactivate(PUMP)) == 1
    });
    assert_eq!(rig.scheduler.state(), CycleState::Idling);

    let t0 = Instant::now();
    rig.scheduler.request_shutdown();
    assert!(t0.elapsed() < Duration::from_secs(1));
    assert!(!rig.scheduler.is_running());
    assert_eq!(rig.scheduler.completed_cycles(), 0);
}

#[test]
fn long_separation_does_not_delay_shutdown() {
    let rig = Rig::new(60, 200, 5000);
    rig.scheduler.start_automatic_watering(None);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(rig.scheduler.state(), CycleState::Idling);

    let t0 = Instant::now();
    rig.scheduler.request_shutdown();
    assert!(t0.elapsed() < Duration::from_millis(1000));
    assert_eq!(rig.scheduler.state(), CycleState::Disabled);
    assert!(!rig.scheduler.is_running());

    // Cut short, but still valve first.
    let valve_off = rig.chip.journal.position(Call::Deactivate(VALVE)).unwrap();
    let pump_off = rig.chip.journal.position(Call::Deactivate(PUMP)).unwrap();
    assert!(valve_off < pump_off);
}

#[test]
fn stop_during_irrigation_still_waits_the_separation() {
    let rig = Rig::new(60_000, 60_000, 120);
    rig.scheduler.start_automatic_watering(None);
    wait_for("activation", || rig.chip.journal.count(Call::Activate(PUMP)) == 1);

    let t0 = Instant::now();
    rig.scheduler.request_shutdown();
    assert!(t0.elapsed() < Duration::from_secs(1));

    let (vi, vt) = rig.chip.journal.first_at(Call::Deactivate(VALVE), 0).unwrap();
    let (_, pt) = rig.chip.journal.first_at(Call::Deactivate(PUMP), vi).unwrap();
    assert!(
        pt.duration_since(vt) >= Duration::from_millis(120),
        "gap was {:?}",
        pt.duration_since(vt)
    );
}

#[test]
fn event_stream_brackets_a_run() {
    let rig = Rig::new(5, 5, 0);
    rig.scheduler.start_automatic_watering(Some("cycled"));
    wait_for("one cycle", || rig.scheduler.completed_cycles() >= 1);
    rig.scheduler.request_shutdown();

    let events = rig.sink.events();
    assert_eq!(events[0], WateringEvent::Started { flow: "cycled" });
    assert_eq!(
        events[1],
        WateringEvent::StateChanged {
            from: CycleState::Disabled,
            to: CycleState::Irrigating
        }
    );
    assert!(events.contains(&WateringEvent::CycleCompleted(1)));
    let n = events.len();
    assert_eq!(
        events[n - 2],
        WateringEvent::StateChanged {
            from: CycleState::TearingDown,
            to: CycleState::Disabled
        }
    );
    assert!(matches!(events[n - 1], WateringEvent::Stopped { .. }));
}

// ── Hardware reassignment ─────────────────────────────────────

#[test]
fn valve_moved_mid_irrigation_is_released_before_the_new_request() {
    let rig = Rig::new(300, 1000, 0);
    rig.scheduler.start_automatic_watering(None);
    wait_for("activation", || rig.chip.journal.count(Call::Activate(PUMP)) == 1);
    let mark = rig.chip.journal.calls().len();

    rig.scheduler
        .hardware_controller()
        .set_valve_output_id(5)
        .unwrap();

    let after: Vec<Call> = rig.chip.journal.calls().split_off(mark);
    let release = after.iter().position(|c| *c == Call::Release(VALVE)).unwrap();
    let request = after.iter().position(|c| *c == Call::Request(5)).unwrap();
    let deactivations = after[..release]
        .iter()
        .filter(|c| **c == Call::Deactivate(VALVE))
        .count();
    assert_eq!(deactivations, 1);
    assert!(release < request);
    assert!(!rig.chip.is_claimed(VALVE));
    assert!(rig.chip.is_claimed(5));
    rig.scheduler.request_shutdown();
}

#[test]
fn reassignment_waits_for_an_in_flight_deactivation() {
    let rig = Rig::new(20, 1000, 300);
    rig.scheduler.start_automatic_watering(None);
    wait_for("valve closed", || {
        rig.chip.journal.count(Call::Deactivate(VALVE)) == 1
    });

    // The worker holds the hardware lock through the separation gap.
    rig.scheduler
        .hardware_controller()
        .set_pump_output_id(6)
        .unwrap();

    let pump_off = rig.chip.journal.position(Call::Deactivate(PUMP)).unwrap();
    let request = rig.chip.journal.position(Call::Request(6)).unwrap();
    assert!(pump_off < request);
    rig.scheduler.request_shutdown();
}

#[test]
fn failed_release_still_moves_the_device() {
    let rig = Rig::new(1000, 1000, 0);
    rig.chip.fail_releases(true);
    let hw = rig.scheduler.hardware_controller();
    hw.set_valve_output_id(4).unwrap();
    assert_eq!(hw.output_offset(greenhouse::app::ports::DeviceRole::Valve), 4);
    assert!(rig.chip.is_claimed(4));
    assert_eq!(rig.chip.journal.count(Call::Deactivate(VALVE)), 1);
    assert!(
        rig.sink
            .notices(log::Level::Warn)
            .iter()
            .any(|m| m.contains("release of water valve line 17 failed"))
    );
}

// ── Collaborator swap ─────────────────────────────────────────

#[test]
fn swapped_time_provider_is_used() {
    let rig = Rig::new(1000, 1000, 0);
    let faster = Arc::new(ConfigurableTimeProvider::new(
        Duration::from_millis(5),
        Duration::from_millis(5),
        Duration::ZERO,
    ));
    rig.scheduler.set_time_provider(faster);
    assert_eq!(rig.scheduler.status().activation, Duration::from_millis(5));

    rig.scheduler.start_automatic_watering(None);
    wait_for("fast cycles", || rig.scheduler.completed_cycles() >= 3);
    rig.scheduler.request_shutdown();
}
