use crate::apdu::pdu::{check_first_octet, ApduType};
use crate::encoding::{reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconfirmedRequest {
    pub service_choice: u8,
    pub service_data: Vec<u8>,
}

impl UnconfirmedRequest {
    pub fn new(service_choice: u8, service_data: Vec<u8>) -> Self {
        Self {
            service_choice,
            service_data,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::UnconfirmedRequest.header_octet())?;
        w.write_u8(self.service_choice)?;
        w.write_all(&self.service_data)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        check_first_octet(r.read_u8()?, ApduType::UnconfirmedRequest, 0x0F)?;
        Ok(Self {
            service_choice: r.read_u8()?,
            service_data: r.rest().to_vec(),
        })
    }
}
