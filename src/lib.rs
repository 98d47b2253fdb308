// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [Modbus TCP](https://en.wikipedia.org/wiki/Modbus) slave emulator
//! based on [tokio](https://tokio.rs).
//!
//! The emulator serves one or more slave units on a single TCP port. Each
//! unit owns an independent, in-memory register store with coils, discrete
//! inputs, input registers and holding registers. Clients address a unit
//! by the unit id `1..=N` of the MBAP header.
//!
//! Supported functions:
//!
//! - `0x01` Read Coils
//! - `0x02` Read Discrete Inputs
//! - `0x03` Read Holding Registers
//! - `0x04` Read Input Registers
//! - `0x05` Write Single Coil
//! - `0x06` Write Single Register
//! - `0x0F` Write Multiple Coils
//! - `0x10` Write Multiple Registers
//!
//! All other function codes are answered with an *Illegal Function*
//! exception.
//!
//! With random simulation enabled unset inputs are served with
//! pseudorandom values, which is useful for exercising clients without
//! any real device.
//!
//! # Embedding
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use modbus_slave::{config::SlaveSettings, server::tcp::Server, Units};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let units = Arc::new(Units::new(&SlaveSettings::default())?);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:5502").await?;
//!     Server::new(listener).serve(units).await;
//!     Ok(())
//! }
//! ```

extern crate bytes;

pub mod config;
pub mod error;
pub mod server;

mod codec;
mod frame;
mod slave;
mod store;
mod unit;

use std::sync::Arc;

pub use self::{
    config::Settings,
    error::{ConfigError, ConnectionError, Error, UnitFault},
    frame::{
        tcp::{Header, ProtocolId, TransactionId, UnitId},
        Address, Coil, DataSpace, ExceptionCode, ExceptionResponse, FunctionCode, Quantity,
        RequestPdu, Response, ResponsePdu, Word,
    },
    slave::{Slave, SlaveId},
    store::Registers,
    unit::{Unit, Units},
};

/// Create all configured units and serve them on the configured port.
///
/// Only returns on startup failures.
pub async fn serve(settings: &Settings) -> Result<(), Error> {
    let units = Arc::new(Units::new(&settings.slave)?);
    let server = server::tcp::Server::bind(settings)?;
    log::info!(
        "Serving {} unit(s) on {}, random simulation {}",
        units.len(),
        server.local_addr()?,
        if settings.slave.random_simulation {
            "enabled"
        } else {
            "disabled"
        }
    );
    if settings.general.debug {
        log::warn!("Debug mode: frames with a non-zero protocol id are accepted");
    }
    let terminated = server.serve(units).await;
    log::info!("Server terminated: {terminated:?}");
    Ok(())
}
