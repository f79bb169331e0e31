//! Outbound watering events.
//!
//! The scheduler and the command service emit these through the
//! [`EventSink`](super::ports::EventSink) port. The console adapter prints
//! them for the operator; tests record them.

use log::Level;

use crate::scheduler::CycleState;

/// Structured events emitted by the watering core.
#[derive(Debug, Clone, PartialEq)]
pub enum WateringEvent {
    /// A watering job started with the given flow.
    Started { flow: &'static str },

    /// The worker moved between cycle states.
    StateChanged { from: CycleState, to: CycleState },

    /// An activation/deactivation cycle completed (running total).
    CycleCompleted(u64),

    /// The worker exited; carries the number of completed cycles.
    Stopped { cycles: u64 },

    /// Operator-facing message mirroring a diagnostic log line.
    Notice { level: Level, message: String },
}

impl WateringEvent {
    pub fn notice(level: Level, message: impl Into<String>) -> Self {
        Self::Notice {
            level,
            message: message.into(),
        }
    }
}
