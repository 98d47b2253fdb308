// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{self, Cursor, Error, ErrorKind};

use byteorder::{BigEndian, ReadBytesExt as _};

use crate::{
    bytes::{BufMut as _, BytesMut},
    frame::{Address, Coil, Quantity, Word},
    ExceptionResponse, Response,
};

pub(crate) mod tcp;

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u16_len(len: usize) -> u16 {
    // This type conversion should always be safe, because either
    // the caller is responsible to pass a valid usize or the
    // possible values are limited by the protocol.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    // This type conversion should always be safe, because either
    // the caller is responsible to pass a valid usize or the
    // possible values are limited by the protocol.
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

pub(crate) fn encode_response_pdu(buf: &mut BytesMut, rsp: &Response) {
    use crate::frame::Response::*;
    buf.put_u8(rsp.function_code().value());
    match rsp {
        ReadCoils(coils) | ReadDiscreteInputs(coils) => {
            buf.put_u8(u8_len(packed_coils_size(coils.len())));
            encode_packed_coils(buf, coils);
        }
        ReadInputRegisters(registers) | ReadHoldingRegisters(registers) => {
            buf.put_u8(u8_len(registers.len() * 2));
            for r in registers {
                buf.put_u16(*r);
            }
        }
        WriteSingleCoil(address, state) => {
            buf.put_u16(*address);
            buf.put_u16(bool_to_coil(*state));
        }
        WriteMultipleCoils(address, quantity) | WriteMultipleRegisters(address, quantity) => {
            buf.put_u16(*address);
            buf.put_u16(*quantity);
        }
        WriteSingleRegister(address, word) => {
            buf.put_u16(*address);
            buf.put_u16(*word);
        }
    }
}

/// Exceptions always set the high bit of the function code, even for
/// function codes that already carry it.
pub(crate) fn encode_exception_response_pdu(buf: &mut BytesMut, rsp: ExceptionResponse) {
    buf.put_u8(rsp.function.value() | 0x80);
    buf.put_u8(rsp.exception.into());
}

pub(crate) fn encode_response_result_pdu(
    buf: &mut BytesMut,
    res: &Result<Response, ExceptionResponse>,
) {
    match res {
        Ok(rsp) => encode_response_pdu(buf, rsp),
        Err(rsp) => encode_exception_response_pdu(buf, *rsp),
    }
}

pub(crate) fn response_pdu_size(rsp: &Response) -> usize {
    use crate::frame::Response::*;
    match rsp {
        ReadCoils(coils) | ReadDiscreteInputs(coils) => 2 + packed_coils_size(coils.len()),
        WriteSingleCoil(_, _)
        | WriteMultipleCoils(_, _)
        | WriteMultipleRegisters(_, _)
        | WriteSingleRegister(_, _) => 5,
        ReadInputRegisters(data) | ReadHoldingRegisters(data) => 2 + data.len() * 2,
    }
}

pub(crate) fn response_result_pdu_size(res: &Result<Response, ExceptionResponse>) -> usize {
    match res {
        Ok(rsp) => response_pdu_size(rsp),
        Err(_) => 2,
    }
}

fn read_u16_be(reader: &mut impl io::Read) -> io::Result<u16> {
    reader.read_u16::<BigEndian>()
}

fn ensure_consumed(rdr: &Cursor<&[u8]>) -> io::Result<()> {
    // Verify that all data has been consumed and decoded.
    if rdr.position() != rdr.get_ref().len() as u64 {
        return Err(Error::new(ErrorKind::InvalidData, "undecoded request data"));
    }
    Ok(())
}

/// Decode the `address, quantity` payload of the read functions.
pub(crate) fn decode_address_quantity(payload: &[u8]) -> io::Result<(Address, Quantity)> {
    let rdr = &mut Cursor::new(payload);
    let address = read_u16_be(rdr)?;
    let quantity = read_u16_be(rdr)?;
    ensure_consumed(rdr)?;
    Ok((address, quantity))
}

/// Decode the `address, value` payload of the single write functions.
pub(crate) fn decode_address_word(payload: &[u8]) -> io::Result<(Address, Word)> {
    let rdr = &mut Cursor::new(payload);
    let address = read_u16_be(rdr)?;
    let word = read_u16_be(rdr)?;
    ensure_consumed(rdr)?;
    Ok((address, word))
}

/// Decode the `address, quantity, byte count, values` payload of the
/// multiple write functions.
///
/// Only the frame shape is checked here: the byte count must match the
/// number of value bytes that actually follow. Whether it also matches
/// the quantity is up to the function.
pub(crate) fn decode_address_quantity_values(
    payload: &[u8],
) -> io::Result<(Address, Quantity, &[u8])> {
    let rdr = &mut Cursor::new(payload);
    let address = read_u16_be(rdr)?;
    let quantity = read_u16_be(rdr)?;
    let byte_count = usize::from(rdr.read_u8()?);
    let values = &payload[5..];
    if values.len() != byte_count {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!(
                "byte count {byte_count} does not match {} value bytes",
                values.len()
            ),
        ));
    }
    Ok((address, quantity, values))
}

pub(crate) fn decode_words(bytes: &[u8]) -> Vec<Word> {
    bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
        .collect()
}

fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

pub(crate) fn coil_to_bool(coil: u16) -> io::Result<bool> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(Error::new(
            ErrorKind::InvalidData,
            format!("Invalid coil value: 0x{coil:04X}"),
        )),
    }
}

pub(crate) fn packed_coils_size(count: usize) -> usize {
    (count + 7) / 8
}

fn encode_packed_coils(buf: &mut BytesMut, coils: &[Coil]) -> usize {
    let packed_coils_size = packed_coils_size(coils.len());
    let offset = buf.len();
    buf.resize(offset + packed_coils_size, 0);
    let buf = &mut buf[offset..];
    for (i, b) in coils.iter().enumerate() {
        let v = u8::from(*b); // 0 or 1
        buf[i / 8] |= v << (i % 8);
    }
    packed_coils_size
}

pub(crate) fn decode_packed_coils(bytes: &[u8], count: u16) -> Vec<Coil> {
    let mut res = Vec::with_capacity(count.into());
    for i in 0usize..count.into() {
        res.push((bytes[i / 8] >> (i % 8)) & 0b1 > 0);
    }
    res
}

#[cfg(test)]
mod tests {

    use crate::{ExceptionCode, FunctionCode};

    use super::*;

    fn encode_response_pdu_to_bytes(response: &Response) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_response_pdu(&mut buf, response);
        buf
    }

    fn encode_exception_response_pdu_to_bytes(response: ExceptionResponse) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_exception_response_pdu(&mut buf, response);
        buf
    }

    fn encode_packed_coils_to_bytes(coils: &[Coil]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_packed_coils(&mut buf, coils);
        buf
    }

    #[test]
    fn convert_bool_to_coil() {
        assert_eq!(bool_to_coil(true), 0xFF00);
        assert_eq!(bool_to_coil(false), 0x0000);
    }

    #[test]
    fn convert_coil_to_bool() {
        assert!(coil_to_bool(0xFF00).unwrap());
        assert!(!coil_to_bool(0x0000).unwrap());
        assert!(coil_to_bool(0x00FF).is_err());
        assert!(coil_to_bool(0x0001).is_err());
        assert!(coil_to_bool(0xFFFF).is_err());
    }

    #[test]
    fn convert_booleans_to_bytes() {
        assert_eq!(&encode_packed_coils_to_bytes(&[])[..], &[]);
        assert_eq!(&encode_packed_coils_to_bytes(&[true])[..], &[0b1]);
        assert_eq!(&encode_packed_coils_to_bytes(&[false])[..], &[0b0]);
        assert_eq!(&encode_packed_coils_to_bytes(&[true, false])[..], &[0b_01]);
        assert_eq!(&encode_packed_coils_to_bytes(&[false, true])[..], &[0b_10]);
        assert_eq!(&encode_packed_coils_to_bytes(&[true, true])[..], &[0b_11]);
        assert_eq!(
            &encode_packed_coils_to_bytes(&[true; 8])[..],
            &[0b_1111_1111]
        );
        assert_eq!(&encode_packed_coils_to_bytes(&[true; 9])[..], &[255, 1]);
        assert_eq!(&encode_packed_coils_to_bytes(&[false; 8])[..], &[0]);
        assert_eq!(&encode_packed_coils_to_bytes(&[false; 9])[..], &[0, 0]);
    }

    #[test]
    fn test_unpack_bits() {
        assert_eq!(decode_packed_coils(&[], 0), &[]);
        assert_eq!(decode_packed_coils(&[0, 0], 0), &[]);
        assert_eq!(decode_packed_coils(&[0b1], 1), &[true]);
        assert_eq!(decode_packed_coils(&[0b01], 2), &[true, false]);
        assert_eq!(decode_packed_coils(&[0b10], 2), &[false, true]);
        assert_eq!(decode_packed_coils(&[0b101], 3), &[true, false, true]);
        assert_eq!(decode_packed_coils(&[0xff, 0b11], 10), &[true; 10]);
    }

    #[test]
    fn exception_response_into_bytes() {
        let bytes = encode_exception_response_pdu_to_bytes(ExceptionResponse {
            function: FunctionCode::ReadHoldingRegisters,
            exception: ExceptionCode::IllegalDataAddress,
        });
        assert_eq!(&bytes[..], &[0x83, 0x02]);
    }

    #[test]
    fn exception_response_keeps_high_bit_function_code() {
        let bytes = encode_exception_response_pdu_to_bytes(ExceptionResponse {
            function: FunctionCode::new(0x99),
            exception: ExceptionCode::IllegalFunction,
        });
        assert_eq!(&bytes[..], &[0x99, 0x01]);
    }

    #[test]
    fn response_sizes_match_encoding() {
        let responses = [
            Response::ReadCoils(vec![true; 11]),
            Response::ReadDiscreteInputs(vec![false; 8]),
            Response::ReadHoldingRegisters(vec![1, 2, 3]),
            Response::ReadInputRegisters(vec![]),
            Response::WriteSingleCoil(7, true),
            Response::WriteSingleRegister(7, 0xABCD),
            Response::WriteMultipleCoils(1, 10),
            Response::WriteMultipleRegisters(1, 2),
        ];
        for rsp in &responses {
            assert_eq!(
                encode_response_pdu_to_bytes(rsp).len(),
                response_pdu_size(rsp),
                "{rsp:?}"
            );
        }
    }

    mod decode_requests {

        use super::*;

        #[test]
        fn address_quantity() {
            assert_eq!(
                decode_address_quantity(&[0x00, 0x12, 0x00, 0x04]).unwrap(),
                (0x12, 4)
            );
            assert!(decode_address_quantity(&[]).is_err());
            assert!(decode_address_quantity(&[0x00, 0x12, 0x00]).is_err());
            assert!(decode_address_quantity(&[0x00, 0x12, 0x00, 0x04, 0x00]).is_err());
        }

        #[test]
        fn address_word() {
            assert_eq!(
                decode_address_word(&[0x12, 0x34, 0xFF, 0x00]).unwrap(),
                (0x1234, 0xFF00)
            );
            assert!(decode_address_word(&[0x12, 0x34, 0xFF]).is_err());
        }

        #[test]
        fn address_quantity_values() {
            let payload = [0x33, 0x11, 0x00, 0x04, 0x01, 0b_0000_1101];
            let (address, quantity, values) = decode_address_quantity_values(&payload).unwrap();
            assert_eq!(address, 0x3311);
            assert_eq!(quantity, 4);
            assert_eq!(values, &[0b_0000_1101]);
            assert_eq!(
                decode_packed_coils(values, quantity),
                &[true, false, true, true]
            );

            // byte count claims more bytes than present
            assert!(decode_address_quantity_values(&[0x33, 0x11, 0x00, 0x04, 0x02, 0x0D]).is_err());
            // trailing garbage
            assert!(
                decode_address_quantity_values(&[0x33, 0x11, 0x00, 0x04, 0x01, 0x0D, 0x00])
                    .is_err()
            );
            assert!(decode_address_quantity_values(&[0x33, 0x11, 0x00, 0x04]).is_err());
        }

        #[test]
        fn words() {
            assert_eq!(decode_words(&[0xAB, 0xCD, 0xEF, 0x12]), &[0xABCD, 0xEF12]);
            assert!(decode_words(&[]).is_empty());
        }
    }

    mod serialize_responses {

        use super::*;

        #[test]
        fn read_coils() {
            let bytes = encode_response_pdu_to_bytes(&Response::ReadCoils(vec![
                true, false, false, true, false,
            ]));
            assert_eq!(&bytes[..], &[1, 1, 0b_0000_1001]);
        }

        #[test]
        fn read_discrete_inputs() {
            let bytes = encode_response_pdu_to_bytes(&Response::ReadDiscreteInputs(vec![
                true, false, true, true,
            ]));
            assert_eq!(&bytes[..], &[2, 1, 0b_0000_1101]);
        }

        #[test]
        fn write_single_coil() {
            let bytes = encode_response_pdu_to_bytes(&Response::WriteSingleCoil(0x33, true));
            assert_eq!(&bytes[..], &[5, 0x00, 0x33, 0xFF, 0x00]);
        }

        #[test]
        fn write_multiple_coils() {
            let bytes = encode_response_pdu_to_bytes(&Response::WriteMultipleCoils(0x3311, 5));
            assert_eq!(&bytes[..], &[0x0F, 0x33, 0x11, 0x00, 0x05]);
        }

        #[test]
        fn read_input_registers() {
            let bytes = encode_response_pdu_to_bytes(&Response::ReadInputRegisters(vec![
                0xAA00, 0xCCBB, 0xEEDD,
            ]));
            assert_eq!(&bytes[..], &[4, 0x06, 0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD]);
        }

        #[test]
        fn read_holding_registers() {
            let bytes =
                encode_response_pdu_to_bytes(&Response::ReadHoldingRegisters(vec![0xAA00, 0x1111]));
            assert_eq!(&bytes[..], &[3, 0x04, 0xAA, 0x00, 0x11, 0x11]);
        }

        #[test]
        fn write_single_register() {
            let bytes = encode_response_pdu_to_bytes(&Response::WriteSingleRegister(0x07, 0xABCD));
            assert_eq!(&bytes[..], &[6, 0x00, 0x07, 0xAB, 0xCD]);
        }

        #[test]
        fn write_multiple_registers() {
            let bytes = encode_response_pdu_to_bytes(&Response::WriteMultipleRegisters(0x06, 2));
            assert_eq!(&bytes[..], &[0x10, 0x00, 0x06, 0x00, 0x02]);
        }
    }
}
