// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers, one per supported function code.
//!
//! Every handler decodes the payload that follows the function code,
//! validates it and then reads or mutates the register store. All
//! failures are reported as exception codes:
//!
//! - malformed payloads, bad quantities, byte counts and coil values
//!   are [`ExceptionCode::IllegalDataValue`],
//! - windows leaving the `1..=9999` reference range of a data space
//!   are [`ExceptionCode::IllegalDataAddress`].

use std::io;

use crate::{
    codec::{
        coil_to_bool, decode_address_quantity, decode_address_quantity_values,
        decode_address_word, decode_packed_coils, decode_words, packed_coils_size,
    },
    frame::{Address, DataSpace, Quantity, MAX_ITEMS},
    store::Registers,
    ExceptionCode, Response,
};

pub(crate) type Handler = fn(&mut Registers, &[u8]) -> Result<Response, ExceptionCode>;

/// Packed bits that fit into the one byte byte-count of a read response.
const MAX_READ_BITS: Quantity = 255 * 8;

/// Registers that fit into the one byte byte-count of a read response.
const MAX_READ_WORDS: Quantity = 255 / 2;

fn malformed(err: io::Error) -> ExceptionCode {
    log::debug!("Malformed request payload: {err}");
    ExceptionCode::IllegalDataValue
}

/// Quantities must lie within `1..=9999` and must not exceed `max`.
///
/// Reads pass the largest quantity whose response still fits the one
/// byte byte-count field, which is stricter than the `9999` item window.
fn check_quantity(quantity: Quantity, max: Quantity) -> Result<(), ExceptionCode> {
    if quantity == 0 || quantity > MAX_ITEMS.min(max) {
        log::debug!("Invalid quantity: {quantity}");
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}

fn check_byte_count(byte_count: usize, expected: usize) -> Result<(), ExceptionCode> {
    if byte_count != expected {
        log::debug!("Invalid byte count: {byte_count}, expected {expected}");
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}

/// Decode and validate the window of a read request.
fn read_window(
    space: DataSpace,
    payload: &[u8],
    max: Quantity,
) -> Result<(Address, Quantity), ExceptionCode> {
    let (address, quantity) = decode_address_quantity(payload).map_err(malformed)?;
    check_quantity(quantity, max)?;
    space.check_range(address, quantity)?;
    log::trace!(
        "Read {quantity} {space}(s) from {}",
        space.reference(address)
    );
    Ok((address, quantity))
}

pub(crate) fn read_coils(
    registers: &mut Registers,
    payload: &[u8],
) -> Result<Response, ExceptionCode> {
    let (address, quantity) = read_window(DataSpace::Coils, payload, MAX_READ_BITS)?;
    Ok(Response::ReadCoils(registers.read_coils(address, quantity)))
}

pub(crate) fn read_discrete_inputs(
    registers: &mut Registers,
    payload: &[u8],
) -> Result<Response, ExceptionCode> {
    let (address, quantity) = read_window(DataSpace::DiscreteInputs, payload, MAX_READ_BITS)?;
    Ok(Response::ReadDiscreteInputs(
        registers.read_discrete_inputs(address, quantity),
    ))
}

pub(crate) fn read_holding_registers(
    registers: &mut Registers,
    payload: &[u8],
) -> Result<Response, ExceptionCode> {
    let (address, quantity) = read_window(DataSpace::HoldingRegisters, payload, MAX_READ_WORDS)?;
    Ok(Response::ReadHoldingRegisters(
        registers.read_holding_registers(address, quantity),
    ))
}

pub(crate) fn read_input_registers(
    registers: &mut Registers,
    payload: &[u8],
) -> Result<Response, ExceptionCode> {
    let (address, quantity) = read_window(DataSpace::InputRegisters, payload, MAX_READ_WORDS)?;
    Ok(Response::ReadInputRegisters(
        registers.read_input_registers(address, quantity),
    ))
}

pub(crate) fn write_single_coil(
    registers: &mut Registers,
    payload: &[u8],
) -> Result<Response, ExceptionCode> {
    let (address, value) = decode_address_word(payload).map_err(malformed)?;
    DataSpace::Coils.check_range(address, 1)?;
    let coil = coil_to_bool(value).map_err(malformed)?;
    log::debug!(
        "Write {} {} = {coil}",
        DataSpace::Coils,
        DataSpace::Coils.reference(address)
    );
    registers.write_coil(address, coil);
    Ok(Response::WriteSingleCoil(address, coil))
}

pub(crate) fn write_single_register(
    registers: &mut Registers,
    payload: &[u8],
) -> Result<Response, ExceptionCode> {
    let (address, word) = decode_address_word(payload).map_err(malformed)?;
    DataSpace::HoldingRegisters.check_range(address, 1)?;
    log::debug!(
        "Write {} {} = 0x{word:04X}",
        DataSpace::HoldingRegisters,
        DataSpace::HoldingRegisters.reference(address)
    );
    registers.write_holding_register(address, word);
    Ok(Response::WriteSingleRegister(address, word))
}

pub(crate) fn write_multiple_coils(
    registers: &mut Registers,
    payload: &[u8],
) -> Result<Response, ExceptionCode> {
    let (address, quantity, values) = decode_address_quantity_values(payload).map_err(malformed)?;
    check_quantity(quantity, MAX_ITEMS)?;
    check_byte_count(values.len(), packed_coils_size(quantity.into()))?;
    DataSpace::Coils.check_range(address, quantity)?;
    log::debug!(
        "Write {quantity} {}(s) from {}",
        DataSpace::Coils,
        DataSpace::Coils.reference(address)
    );
    registers.write_coils(address, &decode_packed_coils(values, quantity));
    Ok(Response::WriteMultipleCoils(address, quantity))
}

pub(crate) fn write_multiple_registers(
    registers: &mut Registers,
    payload: &[u8],
) -> Result<Response, ExceptionCode> {
    let (address, quantity, values) = decode_address_quantity_values(payload).map_err(malformed)?;
    check_quantity(quantity, MAX_ITEMS)?;
    check_byte_count(values.len(), usize::from(quantity) * 2)?;
    DataSpace::HoldingRegisters.check_range(address, quantity)?;
    log::debug!(
        "Write {quantity} {}(s) from {}",
        DataSpace::HoldingRegisters,
        DataSpace::HoldingRegisters.reference(address)
    );
    registers.write_holding_registers(address, &decode_words(values));
    Ok(Response::WriteMultipleRegisters(address, quantity))
}
