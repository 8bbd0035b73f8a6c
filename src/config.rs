// SPDX-FileCopyrightText: Copyright (c) 2026 modsim contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading for the simulator binary.
//!
//! The file format is a thin YAML wrapper: default endpoint parameters plus
//! the register list consumed by [`crate::register::RegisterTable::load`].
//! Unlike the schema-validated configuration this module's pattern is
//! drawn from, there is no JSON Schema here — `RegisterTable::load` itself
//! is the validation pass.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::register::RegisterSpec;

/// Default endpoint parameters for the one instance launched at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5020
}
fn default_slave_id() -> u8 {
    1
}
fn default_tick_ms() -> u64 {
    300
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            slave_id: default_slave_id(),
            tick_ms: default_tick_ms(),
        }
    }
}

/// Root configuration structure, deserialized from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub defaults: Defaults,
    pub registers: Vec<RegisterSpec>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            registers: vec![RegisterSpec {
                address: 0,
                name: "temperature".to_string(),
                description: "Ambient temperature".to_string(),
                reg_type: crate::codec::RegisterType::F32,
                scale: 10.0,
                base_value: 21.5,
                randomize: true,
                fluctuation: Some(0.05),
                accumulate: false,
                source: None,
                expression: None,
                writable: false,
                variable_name: None,
                min_value: None,
                max_value: None,
            }],
        }
    }
}

impl SimConfig {
    /// Load from `path`, writing out a default/sample file first if it
    /// doesn't exist yet, mirroring the teacher's `Config::from_file`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("configuration file not found at {path:?}, creating default");
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("loading configuration from {path:?}");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file at {path:?}"))?;
        let config: SimConfig = serde_yml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML configuration from {path:?}"))?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("failed to serialize configuration to YAML")?;
        let mut file = File::create(path.as_ref())
            .with_context(|| format!("failed to create config file at {:?}", path.as_ref()))?;
        file.write_all(yaml.as_bytes())
            .with_context(|| format!("failed to write configuration to {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Apply CLI overrides on top of the loaded configuration.
    pub fn apply_args(
        &mut self,
        ip: Option<String>,
        port: Option<u16>,
        slave_id: Option<u8>,
        tick_ms: Option<u64>,
    ) {
        if let Some(ip) = ip {
            self.defaults.ip = ip;
        }
        if let Some(port) = port {
            self.defaults.port = port;
        }
        if let Some(slave_id) = slave_id {
            self.defaults.slave_id = slave_id;
        }
        if let Some(tick_ms) = tick_ms {
            self.defaults.tick_ms = tick_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let config = SimConfig::default();
        config.save_to_file(&path).unwrap();
        let loaded = SimConfig::from_file(&path).unwrap();

        assert_eq!(loaded.defaults.port, config.defaults.port);
        assert_eq!(loaded.registers.len(), config.registers.len());
    }

    #[test]
    fn missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        assert!(!path.exists());

        let config = SimConfig::from_file(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.defaults.ip, "127.0.0.1");
    }

    #[test]
    fn apply_args_overrides_only_provided_fields() {
        let mut config = SimConfig::default();
        let original_ip = config.defaults.ip.clone();
        config.apply_args(None, Some(1502), None, None);
        assert_eq!(config.defaults.ip, original_ip);
        assert_eq!(config.defaults.port, 1502);
    }
}
