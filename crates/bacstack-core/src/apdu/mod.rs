/// Confirmed-service request/response PDUs, Segment-ACK, Error, Reject and Abort.
pub mod confirmed;
/// APDU type discriminant and segmentation header.
pub mod pdu;
/// Unconfirmed-service request PDU.
pub mod unconfirmed;

pub use confirmed::{
    AbortPdu, ComplexAck, ConfirmedRequest, ErrorPdu, RejectPdu, SegmentAck, SimpleAck,
};
pub use pdu::{ApduType, SegmentHeader};
pub use unconfirmed::UnconfirmedRequest;

use crate::encoding::{encode_to_vec, reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

/// Any application-layer PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Apdu {
    ConfirmedRequest(ConfirmedRequest),
    UnconfirmedRequest(UnconfirmedRequest),
    SimpleAck(SimpleAck),
    ComplexAck(ComplexAck),
    SegmentAck(SegmentAck),
    Error(ErrorPdu),
    Reject(RejectPdu),
    Abort(AbortPdu),
}

impl Apdu {
    pub fn apdu_type(&self) -> ApduType {
        match self {
            Self::ConfirmedRequest(_) => ApduType::ConfirmedRequest,
            Self::UnconfirmedRequest(_) => ApduType::UnconfirmedRequest,
            Self::SimpleAck(_) => ApduType::SimpleAck,
            Self::ComplexAck(_) => ApduType::ComplexAck,
            Self::SegmentAck(_) => ApduType::SegmentAck,
            Self::Error(_) => ApduType::Error,
            Self::Reject(_) => ApduType::Reject,
            Self::Abort(_) => ApduType::Abort,
        }
    }

    /// The invoke id, for every kind except Unconfirmed-Request.
    pub fn invoke_id(&self) -> Option<u8> {
        match self {
            Self::ConfirmedRequest(p) => Some(p.invoke_id),
            Self::UnconfirmedRequest(_) => None,
            Self::SimpleAck(p) => Some(p.invoke_id),
            Self::ComplexAck(p) => Some(p.invoke_id),
            Self::SegmentAck(p) => Some(p.invoke_id),
            Self::Error(p) => Some(p.invoke_id),
            Self::Reject(p) => Some(p.invoke_id),
            Self::Abort(p) => Some(p.invoke_id),
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::ConfirmedRequest(p) => p.encode(w),
            Self::UnconfirmedRequest(p) => p.encode(w),
            Self::SimpleAck(p) => p.encode(w),
            Self::ComplexAck(p) => p.encode(w),
            Self::SegmentAck(p) => p.encode(w),
            Self::Error(p) => p.encode(w),
            Self::Reject(p) => p.encode(w),
            Self::Abort(p) => p.encode(w),
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let b0 = r.peek_u8()?;
        let kind = ApduType::from_u8(b0 >> 4).ok_or(DecodeError::UnsupportedPduType {
            offset: r.position(),
        })?;
        Ok(match kind {
            ApduType::ConfirmedRequest => Self::ConfirmedRequest(ConfirmedRequest::decode(r)?),
            ApduType::UnconfirmedRequest => {
                Self::UnconfirmedRequest(UnconfirmedRequest::decode(r)?)
            }
            ApduType::SimpleAck => Self::SimpleAck(SimpleAck::decode(r)?),
            ApduType::ComplexAck => Self::ComplexAck(ComplexAck::decode(r)?),
            ApduType::SegmentAck => Self::SegmentAck(SegmentAck::decode(r)?),
            ApduType::Error => Self::Error(ErrorPdu::decode(r)?),
            ApduType::Reject => Self::Reject(RejectPdu::decode(r)?),
            ApduType::Abort => Self::Abort(AbortPdu::decode(r)?),
        })
    }
}

pub fn encode_apdu(apdu: &Apdu) -> Result<Vec<u8>, EncodeError> {
    encode_to_vec(|w| apdu.encode(w))
}

pub fn decode_apdu(buf: &[u8]) -> Result<Apdu, DecodeError> {
    Apdu::decode(&mut Reader::new(buf))
}
