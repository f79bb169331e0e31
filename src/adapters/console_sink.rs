//! Console event sink adapter.
//!
//! Implements [`EventSink`] by writing operator-facing lines to a terminal
//! (or any `Write`). The diagnostic log goes through the `log` facade
//! separately; this is the second, human-facing channel.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use log::Level;

use crate::app::events::WateringEvent;
use crate::app::ports::EventSink;

/// Adapter that prints every [`WateringEvent`] as one line.
pub struct ConsoleEventSink<W> {
    out: Mutex<W>,
}

impl ConsoleEventSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleEventSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render an event the way the operator sees it.
pub fn render(event: &WateringEvent) -> String {
    match event {
        WateringEvent::Started { flow } => format!("START | watering job started (flow '{flow}')"),
        WateringEvent::StateChanged { from, to } => format!("STATE | {from} -> {to}"),
        WateringEvent::CycleCompleted(n) => format!("CYCLE | {n} completed"),
        WateringEvent::Stopped { cycles } => {
            format!("STOP  | watering job ended after {cycles} cycle(s)")
        }
        WateringEvent::Notice { level, message } => {
            let tag = match level {
                Level::Error => "ERROR",
                Level::Warn => "WARN ",
                _ => "INFO ",
            };
            format!("{tag} | {message}")
        }
    }
}

impl<W: Write + Send> EventSink for ConsoleEventSink<W> {
    fn emit(&self, event: &WateringEvent) {
        let line = render(event);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // A closed terminal must not take the scheduler down with it.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}
