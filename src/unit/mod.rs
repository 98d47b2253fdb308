// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emulated slave units.
//!
//! A [`Unit`] owns one register store and a dispatch table that maps each
//! supported function code to its handler. [`Units`] holds all units of the
//! process, addressed by unit id `1..=N`.

mod function;

use std::{
    collections::HashMap,
    fmt, future,
    sync::{Mutex, MutexGuard},
};

use crate::{
    config::SlaveSettings,
    error::{Error, UnitFault},
    frame::{tcp::UnitId, RequestPdu, ResponsePdu},
    server::Service,
    slave::Slave,
    store::Registers,
    ExceptionCode, ExceptionResponse, FunctionCode,
};

use self::function::Handler;

const FUNCTIONS: [(FunctionCode, Handler); 8] = [
    (FunctionCode::ReadCoils, function::read_coils as Handler),
    (
        FunctionCode::ReadDiscreteInputs,
        function::read_discrete_inputs as Handler,
    ),
    (
        FunctionCode::ReadHoldingRegisters,
        function::read_holding_registers as Handler,
    ),
    (
        FunctionCode::ReadInputRegisters,
        function::read_input_registers as Handler,
    ),
    (
        FunctionCode::WriteSingleCoil,
        function::write_single_coil as Handler,
    ),
    (
        FunctionCode::WriteSingleRegister,
        function::write_single_register as Handler,
    ),
    (
        FunctionCode::WriteMultipleCoils,
        function::write_multiple_coils as Handler,
    ),
    (
        FunctionCode::WriteMultipleRegisters,
        function::write_multiple_registers as Handler,
    ),
];

/// A single emulated slave device.
pub struct Unit {
    slave: Slave,
    registers: Mutex<Registers>,
    functions: HashMap<FunctionCode, Handler>,
}

impl Unit {
    /// Create a unit with an empty register store.
    pub fn new(slave: Slave, settings: &SlaveSettings) -> Result<Self, Error> {
        Self::with_registers(slave, Registers::new(settings))
    }

    /// Create a unit serving the given register store.
    pub fn with_registers(slave: Slave, registers: Registers) -> Result<Self, Error> {
        if !slave.is_single_device() {
            return Err(Error::InvalidUnitId(slave));
        }
        Ok(Self {
            slave,
            registers: Mutex::new(registers),
            functions: FUNCTIONS.into_iter().collect(),
        })
    }

    pub fn slave(&self) -> Slave {
        self.slave
    }

    /// Exclusive access to the register store, e.g. for presetting inputs.
    pub fn registers(&self) -> Result<MutexGuard<'_, Registers>, UnitFault> {
        self.registers
            .lock()
            .map_err(|_| UnitFault::Poisoned(self.slave))
    }

    /// Handle a single request.
    ///
    /// Every request is answered with either a response or an exception
    /// response. Only a fault of the unit itself yields an error, in which
    /// case no response must be sent.
    pub fn handle(&self, pdu: &RequestPdu) -> Result<ResponsePdu, UnitFault> {
        let function = pdu.function_code();
        let Some(handler) = self.functions.get(&function) else {
            log::warn!("Unit {}: unsupported function {function}", self.slave);
            return Ok(ExceptionResponse {
                function,
                exception: ExceptionCode::IllegalFunction,
            }
            .into());
        };
        let result = {
            let mut registers = self.registers()?;
            handler(&mut registers, pdu.payload())
        };
        match result {
            Ok(response) => Ok(response.into()),
            Err(exception) => {
                log::warn!("Unit {}: function {function} failed: {exception}", self.slave);
                Ok(ExceptionResponse {
                    function,
                    exception,
                }
                .into())
            }
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().map(|f| f.value()).collect();
        functions.sort_unstable();
        f.debug_struct("Unit")
            .field("slave", &self.slave)
            .field("registers", &self.registers)
            .field("functions", &functions)
            .finish()
    }
}

impl Service for Unit {
    type Request = RequestPdu;
    type Response = ResponsePdu;
    type Error = UnitFault;
    type Future = future::Ready<Result<Self::Response, Self::Error>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        future::ready(self.handle(&req))
    }
}

/// All units served by the process.
#[derive(Debug)]
pub struct Units(Vec<Unit>);

impl Units {
    /// Create the units `1..=settings.quantity`.
    pub fn new(settings: &SlaveSettings) -> Result<Self, Error> {
        (1..=settings.quantity)
            .map(|id| Unit::new(Slave(id), settings))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Look up the unit addressed by `unit_id`.
    pub fn get(&self, unit_id: UnitId) -> Option<&Unit> {
        Slave(unit_id).index().and_then(|index| self.0.get(index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.0.iter()
    }
}
