//! Inbound commands to the watering service.
//!
//! Console input is parsed with clap into [`ConsoleCommand`]; the
//! `auto-watering` options are then flattened into an ordered list of
//! typed [`WateringCommand`]s, so the service never inspects raw option
//! strings.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// One watering action, already typed. Numeric payloads are raw operator
/// input; the service clamps them before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WateringCommand {
    Start { flow: Option<String> },
    Stop,
    SetActivationTime(i64),
    SetDeactivationTime(i64),
    SetSeparationTime(i64),
    SetValvePin(i64),
    SetPumpPin(i64),
    EnableValve,
    DisableValve,
    EnablePump,
    DisablePump,
}

/// Options of the `auto-watering` console command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct AutoWateringOptions {
    /// Start the automatic watering job, optionally naming the flow
    #[arg(long, value_name = "FLOW", num_args = 0..=1, default_missing_value = "")]
    pub start: Option<String>,

    /// Stop the automatic watering job
    #[arg(long)]
    pub stop: bool,

    /// Time the devices stay active per cycle (ms)
    #[arg(long, value_name = "MS", allow_negative_numbers = true)]
    pub activation_time: Option<i64>,

    /// Idle time between two activations (ms)
    #[arg(long, value_name = "MS", allow_negative_numbers = true)]
    pub deactivation_time: Option<i64>,

    /// Delay between closing the valve and stopping the pump (ms)
    #[arg(long = "pumpvalve-deactsep-time", value_name = "MS", allow_negative_numbers = true)]
    pub separation_time: Option<i64>,

    /// Move the water valve to another line
    #[arg(long, value_name = "LINE", allow_negative_numbers = true)]
    pub valve_pin_id: Option<i64>,

    /// Move the water pump to another line
    #[arg(long, value_name = "LINE", allow_negative_numbers = true)]
    pub pump_pin_id: Option<i64>,

    #[arg(long, conflicts_with = "disable_valve")]
    pub enable_valve: bool,

    #[arg(long)]
    pub disable_valve: bool,

    #[arg(long, conflicts_with = "disable_pump")]
    pub enable_pump: bool,

    #[arg(long)]
    pub disable_pump: bool,
}

impl AutoWateringOptions {
    /// Flatten into execution order: stop, pins, enable flags, durations,
    /// start. A stop therefore never cancels a start given on the same line,
    /// and a start always sees the new settings.
    pub fn into_commands(self) -> Vec<WateringCommand> {
        let mut cmds = Vec::new();
        if self.stop {
            cmds.push(WateringCommand::Stop);
        }

        if let Some(pin) = self.valve_pin_id {
            cmds.push(WateringCommand::SetValvePin(pin));
        }
        if let Some(pin) = self.pump_pin_id {
            cmds.push(WateringCommand::SetPumpPin(pin));
        }

        if self.enable_valve {
            cmds.push(WateringCommand::EnableValve);
        }
        if self.disable_valve {
            cmds.push(WateringCommand::DisableValve);
        }
        if self.enable_pump {
            cmds.push(WateringCommand::EnablePump);
        }
        if self.disable_pump {
            cmds.push(WateringCommand::DisablePump);
        }

        if let Some(ms) = self.activation_time {
            cmds.push(WateringCommand::SetActivationTime(ms));
        }
        if let Some(ms) = self.deactivation_time {
            cmds.push(WateringCommand::SetDeactivationTime(ms));
        }
        if let Some(ms) = self.separation_time {
            cmds.push(WateringCommand::SetSeparationTime(ms));
        }

        if let Some(flow) = self.start {
            cmds.push(WateringCommand::Start {
                flow: (!flow.is_empty()).then_some(flow),
            });
        }
        cmds
    }
}

/// Options of the `project` console command.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
#[group(required = true, multiple = false)]
pub struct ProjectOptions {
    /// Load a project file and apply it
    #[arg(long, value_name = "PATH")]
    pub load: Option<PathBuf>,

    /// Save the current settings, by default to `<title>.json`
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    pub save: Option<String>,
}

/// Project file operation requested from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectCommand {
    Load(PathBuf),
    Save(Option<PathBuf>),
}

impl ProjectOptions {
    pub fn into_command(self) -> Option<ProjectCommand> {
        match (self.load, self.save) {
            (Some(path), _) => Some(ProjectCommand::Load(path)),
            (None, Some(path)) => Some(ProjectCommand::Save(
                (!path.is_empty()).then(|| PathBuf::from(path)),
            )),
            (None, None) => None,
        }
    }
}

/// Commands accepted on the interactive console.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ConsoleCommand {
    /// Manage the automatic irrigation of the greenhouse
    #[command(name = "auto-watering", visible_alias = "aws")]
    AutoWatering(AutoWateringOptions),

    /// Print the watering system status
    Status,

    /// Emergency stop of every running system
    Abort,

    /// Load or save the project file
    Project(ProjectOptions),

    /// Print the controller version
    Version,

    /// Stop everything and leave
    Exit,
}

/// One console line.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ConsoleLine {
    #[command(subcommand)]
    pub command: ConsoleCommand,
}

impl ConsoleLine {
    /// Parse one whitespace-separated console line.
    pub fn parse_line(line: &str) -> Result<ConsoleCommand, clap::Error> {
        Self::try_parse_from(line.split_whitespace()).map(|l| l.command)
    }
}
