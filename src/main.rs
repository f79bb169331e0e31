//! Greenhouse controller main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  SimulatedChip ─▶ DailyCycleHardwareController               │
//! │  ConfigurableTimeProvider      ConsoleEventSink              │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ───────────────         │
//! │                                                              │
//! │   WateringScheduler (worker thread) ◀── WateringService      │
//! │                                          ▲                   │
//! │                               stdin console (clap)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use greenhouse::adapters::console_sink::ConsoleEventSink;
use greenhouse::adapters::hardware::{DailyCycleHardwareController, HardwareLock};
use greenhouse::adapters::time::ConfigurableTimeProvider;
use greenhouse::app::commands::ConsoleLine;
use greenhouse::app::events::WateringEvent;
use greenhouse::app::ports::EventSink;
use greenhouse::app::service::{CommandLimits, ConsoleOutcome, WateringService};
use greenhouse::config::SystemConfig;
use greenhouse::drivers::simulated::SimulatedChip;
use greenhouse::pins;
use greenhouse::scheduler::WateringScheduler;

#[derive(Debug, Parser)]
#[command(name = "greenhouse", version, about = "Greenhouse irrigation controller")]
struct Cli {
    /// JSON file overriding the built-in configuration
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Project file to load at startup
    #[arg(long, value_name = "PATH")]
    project: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    info!("greenhouse v{}", env!("CARGO_PKG_VERSION"));

    // ── Configuration ─────────────────────────────────────────
    let config = match &cli.config {
        Some(path) => SystemConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => SystemConfig::default(),
    };

    // ── Hardware ──────────────────────────────────────────────
    let chip = Arc::new(SimulatedChip::open(
        config.chip_path.clone(),
        pins::SIMULATED_CHIP_LINES,
    ));
    let sink: Arc<dyn EventSink> = Arc::new(ConsoleEventSink::stdout());
    let access = HardwareLock::new();
    let hardware = DailyCycleHardwareController::from_config(access.clone(), chip, &config)
        .context("requesting the valve and pump lines")?
        .with_event_sink(Arc::clone(&sink));

    // ── Core ──────────────────────────────────────────────────
    let scheduler = Arc::new(WateringScheduler::new(
        access,
        Arc::new(hardware),
        Arc::new(ConfigurableTimeProvider::from_config(&config)),
        Arc::clone(&sink),
    ));
    scheduler.set_water_valve_enabled(config.valve_enabled);
    scheduler.set_water_pump_enabled(config.pump_enabled);

    let mut service = WateringService::new(scheduler, CommandLimits::from(&config), Arc::clone(&sink));

    if let Some(path) = &cli.project {
        service
            .load_project(path)
            .with_context(|| format!("loading project {}", path.display()))?;
    }

    run_console(&mut service, sink.as_ref())
}

/// Read commands from stdin until `exit` or end of input.
fn run_console(service: &mut WateringService, sink: &dyn EventSink) -> Result<()> {
    println!("Type 'help' for a list of the available commands.");
    for line in std::io::stdin().lock().lines() {
        let line = line.context("reading console input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match ConsoleLine::parse_line(line) {
            Ok(command) => command,
            Err(e) => {
                // clap renders help and usage errors itself.
                let _ = e.print();
                continue;
            }
        };

        match service.execute(command) {
            Ok(ConsoleOutcome::Done) => {}
            Ok(ConsoleOutcome::Print(text)) => println!("{text}"),
            Ok(ConsoleOutcome::Exit) => {
                println!("Goodbye.");
                return Ok(());
            }
            Err(e) => {
                error!("Console: {e}");
                sink.emit(&WateringEvent::notice(log::Level::Error, e.to_string()));
            }
        }
    }

    info!("Console: end of input, tearing down");
    service.shutdown();
    Ok(())
}
