//! Unified error types for the greenhouse controller.
//!
//! A single `Error` enum that every subsystem converts into, so the command
//! layer can report any failure the same way. Hardware errors are `Copy`
//! so they can be handed through the controller without allocation.

use core::fmt;

use crate::pins::PinOffset;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug)]
pub enum Error {
    /// A GPIO line could not be acquired.
    Hal(HalError),
    /// The project document could not be read, written, or understood.
    Project(ProjectError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hal(e) => write!(f, "hardware: {e}"),
            Self::Project(e) => write!(f, "project: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Hal(e) => Some(e),
            Self::Project(e) => Some(e),
            Self::Config(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The line is already claimed by another request.
    LineBusy(PinOffset),
    /// The chip has no line at this offset.
    LineOutOfRange(PinOffset),
    /// The chip was closed; no further requests are possible.
    ChipClosed,
    /// Valve and pump cannot share one line.
    LineShared(PinOffset),
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineBusy(offset) => write!(f, "line {offset} is already requested"),
            Self::LineOutOfRange(offset) => write!(f, "line {offset} does not exist on this chip"),
            Self::ChipClosed => write!(f, "chip is closed"),
            Self::LineShared(offset) => {
                write!(f, "line {offset} cannot drive both the valve and the pump")
            }
        }
    }
}

impl std::error::Error for HalError {}

impl From<HalError> for Error {
    fn from(e: HalError) -> Self {
        Self::Hal(e)
    }
}

// ---------------------------------------------------------------------------
// Project errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ProjectError {
    /// A required object or value is absent.
    Missing(&'static str),
    /// The section exists but does not match the expected shape.
    Malformed(String),
    /// The stored watering mode is not one this controller runs.
    UnsupportedMode(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(what) => write!(f, "missing '{what}'"),
            Self::Malformed(msg) => write!(f, "malformed section: {msg}"),
            Self::UnsupportedMode(mode) => write!(f, "unsupported watering mode '{mode}'"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ProjectError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<ProjectError> for Error {
    fn from(e: ProjectError) -> Self {
        Self::Project(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
