// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process configuration.
//!
//! Settings are assembled once at startup from built-in defaults, an
//! optional YAML file and environment variables (highest priority), and
//! then handed to the units and the server explicitly.
//!
//! | Variable            | Setting                  | Default |
//! |---------------------|--------------------------|---------|
//! | `CONFIG_FILE`       | path of the YAML file    | -       |
//! | `DEBUG`             | `general.debug`          | `false` |
//! | `PORT`              | `server.port`            | `1502`  |
//! | `SLAVE_QUANTITY`    | `slave.quantity`         | `1`     |
//! | `RANDOM_SIMULATION` | `slave.random_simulation`| `false` |

use std::{fs, path::PathBuf, str::FromStr};

use serde::Deserialize;

use crate::{error::ConfigError, slave::Slave};

pub const CONFIG_FILE_VAR: &str = "CONFIG_FILE";
pub const DEBUG_VAR: &str = "DEBUG";
pub const PORT_VAR: &str = "PORT";
pub const SLAVE_QUANTITY_VAR: &str = "SLAVE_QUANTITY";
pub const RANDOM_SIMULATION_VAR: &str = "RANDOM_SIMULATION";

pub const DEFAULT_PORT: u16 = 1502;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub slave: SlaveSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralSettings {
    /// Relax strict frame checks and log more verbosely.
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// TCP port to listen on, bound to all interfaces.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlaveSettings {
    /// Number of units, addressed `1..=quantity`.
    pub quantity: u8,
    /// Serve pseudorandom values for unset inputs.
    pub random_simulation: bool,
}

impl Default for SlaveSettings {
    fn default() -> Self {
        Self {
            quantity: 1,
            random_simulation: false,
        }
    }
}

impl Settings {
    /// Load the settings of the current process.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the settings with `lookup` resolving environment variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match lookup(CONFIG_FILE_VAR) {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(&lookup)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let yaml = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        log::debug!("Loaded configuration file {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to `()`, not to the defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(debug) = parse_var(lookup, DEBUG_VAR, parse_bool)? {
            self.general.debug = debug;
        }
        if let Some(port) = parse_var(lookup, PORT_VAR, u16::from_str)? {
            self.server.port = port;
        }
        if let Some(quantity) = parse_var(lookup, SLAVE_QUANTITY_VAR, u8::from_str)? {
            self.slave.quantity = quantity;
        }
        if let Some(simulation) = parse_var(lookup, RANDOM_SIMULATION_VAR, parse_bool)? {
            self.slave.random_simulation = simulation;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let quantity = self.slave.quantity;
        if !Slave(quantity).is_single_device() {
            return Err(ConfigError::InvalidSlaveQuantity(quantity));
        }
        Ok(())
    }
}

fn parse_var<F, T, E>(
    lookup: &F,
    name: &'static str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    match parse(value.trim()) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ConfigError::InvalidVariable { name, value }),
    }
}

fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(()),
    }
}
