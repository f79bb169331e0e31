//! Recording hardware for integration tests.
//!
//! `RecordingChip` implements `BoardChip` and hands out outputs that log
//! every call, with a timestamp, into one shared journal. Tests assert on
//! ordering and timing across the whole sequence.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use greenhouse::adapters::hardware::{DailyCycleHardwareController, HardwareLock, PinSpec};
use greenhouse::adapters::time::ConfigurableTimeProvider;
use greenhouse::app::events::WateringEvent;
use greenhouse::app::ports::{BoardChip, DigitalOutput, EventSink};
use greenhouse::error::HalError;
use greenhouse::pins::{Direction, PinOffset, Polarity};
use greenhouse::scheduler::WateringScheduler;

pub const VALVE: PinOffset = 17;
pub const PUMP: PinOffset = 27;

// ── Journal ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Request(PinOffset),
    Release(PinOffset),
    Activate(PinOffset),
    Deactivate(PinOffset),
}

#[derive(Default)]
pub struct Journal(Mutex<Vec<(Instant, Call)>>);

#[allow(dead_code)]
impl Journal {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push((Instant::now(), call));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().iter().map(|(_, c)| *c).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, Call)> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: Call) -> Option<usize> {
        self.calls().into_iter().position(|c| c == call)
    }

    /// First time `call` appears at or after `from`.
    pub fn first_at(&self, call: Call, from: usize) -> Option<(usize, Instant)> {
        self.timed()
            .into_iter()
            .enumerate()
            .skip(from)
            .find(|(_, (_, c))| *c == call)
            .map(|(i, (t, _))| (i, t))
    }
}

// ── Recording chip ────────────────────────────────────────────

struct RecordingOutput {
    offset: PinOffset,
    polarity: Polarity,
    active: bool,
    journal: Arc<Journal>,
}

impl DigitalOutput for RecordingOutput {
    fn activate(&mut self) {
        self.active = true;
        self.journal.push(Call::Activate(self.offset));
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.journal.push(Call::Deactivate(self.offset));
    }

    fn offset(&self) -> PinOffset {
        self.offset
    }

    fn direction(&self) -> Direction {
        Direction::Output
    }

    fn polarity(&self) -> Polarity {
        self.polarity
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn status_line(&self) -> String {
        format!("recorded line {}", self.offset)
    }
}

#[derive(Default)]
pub struct RecordingChip {
    pub journal: Arc<Journal>,
    claimed: Mutex<HashSet<PinOffset>>,
    fail_release: AtomicBool,
}

#[allow(dead_code)]
impl RecordingChip {
    pub fn is_claimed(&self, offset: PinOffset) -> bool {
        self.claimed.lock().unwrap().contains(&offset)
    }

    /// Make every release report failure (the line stays claimed).
    pub fn fail_releases(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }
}

impl BoardChip for RecordingChip {
    fn request_output(
        &self,
        _consumer: &str,
        offset: PinOffset,
        _direction: Direction,
        polarity: Polarity,
    ) -> Result<Box<dyn DigitalOutput>, HalError> {
        if !self.claimed.lock().unwrap().insert(offset) {
            return Err(HalError::LineBusy(offset));
        }
        self.journal.push(Call::Request(offset));
        Ok(Box::new(RecordingOutput {
            offset,
            polarity,
            active: false,
            journal: Arc::clone(&self.journal),
        }))
    }

    fn release(&self, offsets: &[PinOffset]) -> bool {
        if self.fail_release.load(Ordering::SeqCst) {
            return false;
        }
        let mut claimed = self.claimed.lock().unwrap();
        for offset in offsets {
            claimed.remove(offset);
            self.journal.push(Call::Release(*offset));
        }
        true
    }
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<WateringEvent>>);

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<WateringEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn notices(&self, level: log::Level) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WateringEvent::Notice { level: l, message } if l == level => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &WateringEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A scheduler wired to a recording chip.
pub struct Rig {
    pub chip: Arc<RecordingChip>,
    pub sink: Arc<RecordingSink>,
    pub timing: Arc<ConfigurableTimeProvider>,
    pub scheduler: WateringScheduler,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(activation_ms: u64, deactivation_ms: u64, separation_ms: u64) -> Self {
        let chip = Arc::new(RecordingChip::default());
        let sink = Arc::new(RecordingSink::default());
        let access = HardwareLock::new();
        let hardware = DailyCycleHardwareController::new(
            access.clone(),
            chip.clone(),
            PinSpec {
                offset: VALVE,
                polarity: Polarity::ActiveLow,
            },
            PinSpec {
                offset: PUMP,
                polarity: Polarity::ActiveLow,
            },
        )
        .unwrap()
        .with_event_sink(sink.clone());
        let timing = Arc::new(ConfigurableTimeProvider::new(
            Duration::from_millis(activation_ms),
            Duration::from_millis(deactivation_ms),
            Duration::from_millis(separation_ms),
        ));
        let scheduler =
            WateringScheduler::new(access, Arc::new(hardware), timing.clone(), sink.clone());
        chip.journal.clear();
        Self {
            chip,
            sink,
            timing,
            scheduler,
        }
    }
}

/// Poll `cond` every 2 ms for up to 5 s.
#[allow(dead_code)]
pub fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}
