//! Stop signal for the watering worker.
//!
//! A latched flag paired with a condition variable. The worker only ever
//! sleeps inside [`StopSignal::wait_timeout`], so a single `request()`
//! wakes it no matter which wait it is in.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct StopSignal {
    requested: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the flag and wake every waiter. Idempotent.
    pub fn request(&self) {
        *self.flag() = true;
        self.wake.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.flag()
    }

    /// Sleep for `timeout` unless a stop is requested first.
    ///
    /// Returns `true` when the wait ended because of a stop (including one
    /// that was already pending), `false` when the full duration elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut requested = self.flag();
        loop {
            if *requested {
                return true;
            }
            let remaining = match deadline {
                Some(at) => at.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining.is_zero() {
                return false;
            }
            // Spurious wakeups loop back with the remaining time.
            requested = match self.wake.wait_timeout(requested, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
