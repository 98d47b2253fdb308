// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP slave emulator
//!
//! Configured through `CONFIG_FILE`, `DEBUG`, `PORT`, `SLAVE_QUANTITY` and
//! `RANDOM_SIMULATION`. `RUST_LOG` overrides the default log level.

use std::process::ExitCode;

use env_logger::Env;

use modbus_slave::{Error, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = Settings::load();

    let debug = settings
        .as_ref()
        .map_or(false, |settings| settings.general.debug);
    env_logger::Builder::from_env(Env::default().default_filter_or(if debug {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp_millis()
    .init();

    let result = match settings {
        Ok(settings) => {
            log::debug!("{settings:?}");
            modbus_slave::serve(&settings).await
        }
        Err(err) => Err(Error::from(err)),
    };
    if let Err(err) = result {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
