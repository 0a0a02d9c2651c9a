// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debugger configuration, stored as RON.

use crate::demo::Demo;
use flowstep_graph::{ProcessorSettings, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "flowstep.ron";

/// Debugger session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerConfig {
    /// Demo graph to load
    pub demo: Demo,
    /// Processor settings
    pub processor: ProcessorSettings,
    /// Values placed in the global scope on every reset
    pub globals: IndexMap<String, Value>,
    /// Echo every step event while running
    pub trace_steps: bool,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            demo: Demo::Arithmetic,
            processor: ProcessorSettings::default(),
            globals: IndexMap::new(),
            trace_steps: false,
        }
    }
}

impl DebuggerConfig {
    /// Parse a configuration from RON text
    pub fn from_ron(content: &str) -> std::io::Result<Self> {
        ron::from_str(content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save the configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);

        let content = ron::ser::to_string_pretty(self, config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(path, content)
    }
}
