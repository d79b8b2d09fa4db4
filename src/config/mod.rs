// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Port configuration.
//!
//! Buffer sizes, latency, timer resolution and preferred devices, loaded
//! from YAML or TOML. Every field has a default, so an empty file is valid.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::device::{DeviceId, Direction, PortMidi};
use crate::error::{DeviceErrorKind, Error};
use crate::native::{Backend, DEFAULT_BUFFER_SIZE};

/// Stream and timer settings for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortConfig {
    /// Events buffered per input stream
    pub input_buffer_size: usize,
    /// Events buffered per output stream
    pub output_buffer_size: usize,
    /// Output latency in ms; 0 sends immediately and ignores timestamps
    pub latency_ms: i32,
    /// Timer tick in ms
    pub timer_resolution_ms: u32,
    /// Input device name, matched as a case-insensitive substring
    pub input_device: Option<String>,
    /// Output device name, matched as a case-insensitive substring
    pub output_device: Option<String>,
    /// Events requested per read while monitoring
    pub monitor_chunk: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            input_buffer_size: DEFAULT_BUFFER_SIZE as usize,
            output_buffer_size: DEFAULT_BUFFER_SIZE as usize,
            latency_ms: 0,
            timer_resolution_ms: 1,
            input_device: None,
            output_device: None,
            monitor_chunk: 32,
        }
    }
}

impl PortConfig {
    /// Load from a file, picking the format from its extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            Some("toml") => Self::from_toml(&contents),
            _ => bail!("Unsupported config format: {:?}", path),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document parses as unit, not as an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML configuration")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// The configured input device, or the system default when none is named.
    pub fn resolve_input<B: Backend>(&self, pm: &PortMidi<B>) -> crate::Result<DeviceId> {
        resolve(pm, self.input_device.as_deref(), Direction::Input)
    }

    /// The configured output device, or the system default when none is named.
    pub fn resolve_output<B: Backend>(&self, pm: &PortMidi<B>) -> crate::Result<DeviceId> {
        resolve(pm, self.output_device.as_deref(), Direction::Output)
    }
}

fn resolve<B: Backend>(
    pm: &PortMidi<B>,
    name: Option<&str>,
    direction: Direction,
) -> crate::Result<DeviceId> {
    let found = match name {
        Some(name) => pm.find_device(name, direction)?,
        None => match direction {
            Direction::Input => pm.default_input_device_id()?,
            Direction::Output => pm.default_output_device_id()?,
        },
    };
    found.ok_or_else(|| Error::device_kind(DeviceErrorKind::InvalidDeviceId))
}
