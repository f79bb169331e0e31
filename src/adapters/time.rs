//! Configurable cycle-duration provider.
//!
//! Each duration is an `AtomicU64` of milliseconds, so the command thread
//! can retune the cycle while the watering worker reads it, and neither
//! side ever observes a torn value. No range checks here: clamping is the
//! command layer's job.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::app::ports::TimeProvider;
use crate::config::SystemConfig;

pub struct ConfigurableTimeProvider {
    activation_ms: AtomicU64,
    deactivation_ms: AtomicU64,
    separation_ms: AtomicU64,
}

impl Default for ConfigurableTimeProvider {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

impl ConfigurableTimeProvider {
    pub fn new(activation: Duration, deactivation: Duration, separation: Duration) -> Self {
        Self {
            activation_ms: AtomicU64::new(to_millis(activation)),
            deactivation_ms: AtomicU64::new(to_millis(deactivation)),
            separation_ms: AtomicU64::new(to_millis(separation)),
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            config.activation_time(),
            config.deactivation_time(),
            config.deactivation_sep_time(),
        )
    }
}

/// Saturating conversion; anything past `u64::MAX` ms is "forever" anyway.
fn to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl TimeProvider for ConfigurableTimeProvider {
    fn activation_duration(&self) -> Duration {
        Duration::from_millis(self.activation_ms.load(Ordering::Relaxed))
    }

    fn deactivation_duration(&self) -> Duration {
        Duration::from_millis(self.deactivation_ms.load(Ordering::Relaxed))
    }

    fn valve_pump_separation(&self) -> Duration {
        Duration::from_millis(self.separation_ms.load(Ordering::Relaxed))
    }

    fn set_activation_duration(&self, duration: Duration) {
        self.activation_ms.store(to_millis(duration), Ordering::Relaxed);
    }

    fn set_deactivation_duration(&self, duration: Duration) {
        self.deactivation_ms.store(to_millis(duration), Ordering::Relaxed);
    }

    fn set_valve_pump_separation(&self, duration: Duration) {
        self.separation_ms.store(to_millis(duration), Ordering::Relaxed);
    }
}
