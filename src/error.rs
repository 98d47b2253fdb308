// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::{frame::tcp::UnitId, slave::Slave};

/// Startup errors, the only errors that terminate the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Units are addressed `1..=247`.
    #[error("invalid unit id: {0}")]
    InvalidUnitId(Slave),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {name}: {value:?}")]
    InvalidVariable { name: &'static str, value: String },

    #[error("slave quantity must be within 1..=247, got {0}")]
    InvalidSlaveQuantity(u8),
}

/// A unit failed internally and cannot produce any response.
#[derive(Debug, Error)]
pub enum UnitFault {
    /// A previous request panicked while holding the register store.
    #[error("register store of unit {0} is poisoned")]
    Poisoned(Slave),
}

/// Reasons for closing a client connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Transport failure or malformed MBAP frame.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// No unit is configured for this unit id.
    #[error("unaddressable unit id: {0}")]
    UnaddressableUnit(UnitId),

    #[error(transparent)]
    Fault(#[from] UnitFault),
}
