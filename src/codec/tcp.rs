// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use byteorder::{BigEndian, ByteOrder as _};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    bytes::{BufMut as _, BytesMut},
    frame::tcp::*,
    frame::RequestPdu,
};

use super::{encode_response_result_pdu, response_result_pdu_size, u16_len};

/// Transaction id, protocol id and length field.
const PREFIX_LEN: usize = 6;

/// Unit id and function code are mandatory after the prefix.
const MIN_LENGTH_FIELD: usize = 2;

/// MBAP framing on the server side of a connection.
#[derive(Debug, Default)]
pub(crate) struct ServerCodec {
    /// Accept frames with a non-zero protocol id.
    lenient: bool,
}

impl ServerCodec {
    pub(crate) const fn new(lenient: bool) -> Self {
        Self { lenient }
    }
}

impl Decoder for ServerCodec {
    type Item = RequestAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RequestAdu>> {
        if buf.len() < PREFIX_LEN {
            return Ok(None);
        }

        // len = bytes of PDU + one byte (unit ID)
        let len = usize::from(BigEndian::read_u16(&buf[4..6]));
        if len < MIN_LENGTH_FIELD {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Invalid MBAP length field: {len}"),
            ));
        }

        if buf.len() < PREFIX_LEN + len {
            buf.reserve(PREFIX_LEN + len - buf.len());
            return Ok(None);
        }

        let prefix = buf.split_to(PREFIX_LEN);
        let mut data = buf.split_to(len).freeze();

        let transaction_id = BigEndian::read_u16(&prefix[0..2]);
        let protocol_id = BigEndian::read_u16(&prefix[2..4]);
        let unit_id = data[0];

        if protocol_id != PROTOCOL_ID {
            if !self.lenient {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("Invalid protocol ID: 0x{protocol_id:04X}"),
                ));
            }
            log::warn!("Accepting frame with protocol ID 0x{protocol_id:04X}");
        }

        let hdr = Header {
            transaction_id,
            protocol_id,
            unit_id,
        };
        let pdu = RequestPdu(data.split_off(1));

        Ok(Some(RequestAdu { hdr, pdu }))
    }
}

impl Encoder<ResponseAdu> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: ResponseAdu, buf: &mut BytesMut) -> Result<()> {
        let ResponseAdu { hdr, pdu } = adu;
        let pdu = pdu.into();
        let pdu_len = response_result_pdu_size(&pdu);
        buf.reserve(PREFIX_LEN + 1 + pdu_len);
        buf.put_u16(hdr.transaction_id);
        buf.put_u16(hdr.protocol_id);
        buf.put_u16(u16_len(pdu_len + 1));
        buf.put_u8(hdr.unit_id);
        encode_response_result_pdu(buf, &pdu);
        Ok(())
    }
}
