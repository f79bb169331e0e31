//! Project document: the on-disk JSON tree components persist into.
//!
//! The document is an object with a `title`, a `version` and one
//! top-level section per component. Sections are opaque to the document;
//! each [`ProjectComponent`](crate::app::ports::ProjectComponent) reads and
//! writes its own.
//!
//! Loading runs the integrity fixes in order: missing title, legacy
//! watering layout, version stamp.

pub mod upgrade;
pub mod watering;

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::{Map, Value};

use crate::error::ProjectError;

/// Version written into every saved document.
pub const PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Title given to documents that arrive without one.
pub const UNKNOWN_TITLE: &str = "unknown-project";

const TITLE_KEY: &str = "title";
const VERSION_KEY: &str = "version";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDocument {
    root: Map<String, Value>,
}

impl ProjectDocument {
    pub fn new(title: &str) -> Self {
        let mut root = Map::new();
        root.insert(TITLE_KEY.to_owned(), Value::from(title));
        root.insert(VERSION_KEY.to_owned(), Value::from(PROJECT_VERSION));
        Self { root }
    }

    /// Wrap a parsed JSON value. The top level must be an object.
    pub fn from_value(value: Value) -> Result<Self, ProjectError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(ProjectError::Malformed(format!(
                "project root must be an object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ProjectError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Read a project file and bring it up to the current layout.
    pub fn read(path: &Path) -> Result<Self, ProjectError> {
        info!("Project: loading {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let mut doc = Self::from_json_str(&text)?;
        doc.apply_integrity_fixes()?;
        Ok(doc)
    }

    pub fn write(&self, path: &Path) -> Result<(), ProjectError> {
        let text = serde_json::to_string_pretty(&self.root)?;
        std::fs::write(path, text)?;
        info!("Project: saved {}", path.display());
        Ok(())
    }

    /// Title fix, legacy layout upgrade, version stamp.
    pub fn apply_integrity_fixes(&mut self) -> Result<(), ProjectError> {
        if self.title().is_none() {
            warn!("Project: document has no title, using '{UNKNOWN_TITLE}'");
            self.root
                .insert(TITLE_KEY.to_owned(), Value::from(UNKNOWN_TITLE));
        }
        if upgrade::upgrade_legacy_flow(self)? {
            info!("Project: upgraded legacy automatic watering layout");
        }
        if self.version() != Some(PROJECT_VERSION) {
            self.root
                .insert(VERSION_KEY.to_owned(), Value::from(PROJECT_VERSION));
        }
        Ok(())
    }

    pub fn title(&self) -> Option<&str> {
        self.root.get(TITLE_KEY).and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.root.get(VERSION_KEY).and_then(Value::as_str)
    }

    /// Default file name for saving: `<title>.json`.
    pub fn default_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.json", self.title().unwrap_or(UNKNOWN_TITLE)))
    }

    pub fn section(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn section_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.root.get_mut(key)
    }

    pub fn set_section(&mut self, key: &str, value: Value) {
        self.root.insert(key.to_owned(), value);
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
