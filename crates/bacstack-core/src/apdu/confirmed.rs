use crate::apdu::pdu::{check_first_octet, ApduType, SegmentHeader};
use crate::encoding::{
    primitives::{decode_unsigned, encode_app_enumerated},
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::types::{ErrorClass, ErrorCode, MaxApdu, MaxSegments};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

const SEGMENTED: u8 = 0b0000_1000;
const MORE_FOLLOWS: u8 = 0b0000_0100;
const SEGMENTED_RESPONSE_ACCEPTED: u8 = 0b0000_0010;
const SEGMENT_ACK_NEGATIVE: u8 = 0b0000_0010;
const FROM_SERVER: u8 = 0b0000_0001;

fn encode_segment_flags(segment: Option<&SegmentHeader>) -> Result<u8, EncodeError> {
    match segment {
        None => Ok(0),
        Some(seg) if !seg.window_in_range() => Err(EncodeError::ValueOutOfRange),
        Some(seg) if seg.more_follows => Ok(SEGMENTED | MORE_FOLLOWS),
        Some(_) => Ok(SEGMENTED),
    }
}

fn decode_segment(r: &mut Reader<'_>, b0: u8) -> Result<Option<SegmentHeader>, DecodeError> {
    if b0 & SEGMENTED == 0 {
        if b0 & MORE_FOLLOWS != 0 {
            return Err(DecodeError::ReservedFieldNonzero { offset: 0 });
        }
        return Ok(None);
    }
    Ok(Some(SegmentHeader {
        sequence_number: r.read_u8()?,
        window_size: r.read_u8()?,
        more_follows: b0 & MORE_FOLLOWS != 0,
    }))
}

fn encode_segment(w: &mut Writer<'_>, segment: Option<&SegmentHeader>) -> Result<(), EncodeError> {
    if let Some(seg) = segment {
        w.write_u8(seg.sequence_number)?;
        w.write_u8(seg.window_size)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedRequest {
    pub segmented_response_accepted: bool,
    pub max_segments: MaxSegments,
    pub max_apdu: MaxApdu,
    pub invoke_id: u8,
    pub segment: Option<SegmentHeader>,
    pub service_choice: u8,
    pub service_data: Vec<u8>,
}

impl ConfirmedRequest {
    /// Octets before the service data: 4, or 6 when segmented.
    pub const fn header_len(segmented: bool) -> usize {
        if segmented {
            6
        } else {
            4
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let mut b0 = ApduType::ConfirmedRequest.header_octet()
            | encode_segment_flags(self.segment.as_ref())?;
        if self.segmented_response_accepted {
            b0 |= SEGMENTED_RESPONSE_ACCEPTED;
        }
        w.write_u8(b0)?;
        w.write_u8((self.max_segments.to_u8() << 4) | self.max_apdu.to_u8())?;
        w.write_u8(self.invoke_id)?;
        encode_segment(w, self.segment.as_ref())?;
        w.write_u8(self.service_choice)?;
        w.write_all(&self.service_data)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let b0 = r.read_u8()?;
        check_first_octet(b0, ApduType::ConfirmedRequest, 0b0000_0001)?;
        let limits_at = r.position();
        let limits = r.read_u8()?;
        if limits & 0x80 != 0 {
            return Err(DecodeError::ReservedFieldNonzero { offset: limits_at });
        }
        let max_segments = MaxSegments::from_u8((limits >> 4) & 0x07)
            .ok_or(DecodeError::InvalidLength { offset: limits_at })?;
        let max_apdu = MaxApdu::from_u8(limits & 0x0F)
            .ok_or(DecodeError::InvalidLength { offset: limits_at })?;
        let invoke_id = r.read_u8()?;
        let segment = decode_segment(r, b0)?;
        let service_choice = r.read_u8()?;
        Ok(Self {
            segmented_response_accepted: b0 & SEGMENTED_RESPONSE_ACCEPTED != 0,
            max_segments,
            max_apdu,
            invoke_id,
            segment,
            service_choice,
            service_data: r.rest().to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexAck {
    pub invoke_id: u8,
    pub segment: Option<SegmentHeader>,
    pub service_choice: u8,
    pub service_data: Vec<u8>,
}

impl ComplexAck {
    /// Octets before the service data: 3, or 5 when segmented.
    pub const fn header_len(segmented: bool) -> usize {
        if segmented {
            5
        } else {
            3
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let b0 = ApduType::ComplexAck.header_octet() | encode_segment_flags(self.segment.as_ref())?;
        w.write_u8(b0)?;
        w.write_u8(self.invoke_id)?;
        encode_segment(w, self.segment.as_ref())?;
        w.write_u8(self.service_choice)?;
        w.write_all(&self.service_data)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let b0 = r.read_u8()?;
        check_first_octet(b0, ApduType::ComplexAck, 0b0000_0011)?;
        let invoke_id = r.read_u8()?;
        let segment = decode_segment(r, b0)?;
        let service_choice = r.read_u8()?;
        Ok(Self {
            invoke_id,
            segment,
            service_choice,
            service_data: r.rest().to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleAck {
    pub invoke_id: u8,
    pub service_choice: u8,
}

impl SimpleAck {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::SimpleAck.header_octet())?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.service_choice)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        check_first_octet(r.read_u8()?, ApduType::SimpleAck, 0x0F)?;
        Ok(Self {
            invoke_id: r.read_u8()?,
            service_choice: r.read_u8()?,
        })
    }
}

/// Acknowledges receipt of segments up to and including `sequence_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentAck {
    /// Set when a segment was missed and the sender should resume after
    /// `sequence_number`.
    pub negative: bool,
    /// Set when the acknowledging side is the server of the transaction.
    pub server: bool,
    pub invoke_id: u8,
    pub sequence_number: u8,
    pub actual_window_size: u8,
}

impl SegmentAck {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let mut b0 = ApduType::SegmentAck.header_octet();
        if self.negative {
            b0 |= SEGMENT_ACK_NEGATIVE;
        }
        if self.server {
            b0 |= FROM_SERVER;
        }
        w.write_u8(b0)?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.sequence_number)?;
        w.write_u8(self.actual_window_size)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let b0 = r.read_u8()?;
        check_first_octet(b0, ApduType::SegmentAck, 0b0000_1100)?;
        Ok(Self {
            negative: b0 & SEGMENT_ACK_NEGATIVE != 0,
            server: b0 & FROM_SERVER != 0,
            invoke_id: r.read_u8()?,
            sequence_number: r.read_u8()?,
            actual_window_size: r.read_u8()?,
        })
    }
}

/// Error PDU carrying a raw error class and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPdu {
    pub invoke_id: u8,
    pub service_choice: u8,
    pub error_class: u32,
    pub error_code: u32,
}

impl ErrorPdu {
    pub fn new(invoke_id: u8, service_choice: u8, class: ErrorClass, code: ErrorCode) -> Self {
        Self {
            invoke_id,
            service_choice,
            error_class: class.to_u32(),
            error_code: code.to_u32(),
        }
    }

    pub fn class(&self) -> Option<ErrorClass> {
        ErrorClass::from_u32(self.error_class)
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_u32(self.error_code)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::Error.header_octet())?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.service_choice)?;
        encode_app_enumerated(w, self.error_class)?;
        encode_app_enumerated(w, self.error_code)
    }

    /// Accepts the plain application-enumerated pair, the same pair wrapped
    /// in opening/closing tag 0, and context-tagged class/code. Octets after
    /// the pair belong to service-specific error extensions and are skipped.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        check_first_octet(r.read_u8()?, ApduType::Error, 0x0F)?;
        let invoke_id = r.read_u8()?;
        let service_choice = r.read_u8()?;

        let wrapped = r.peek_u8()? == 0x0E;
        if wrapped {
            r.skip(1)?;
        }
        let error_class = decode_error_value(r, 0)?;
        let error_code = decode_error_value(r, 1)?;
        if wrapped {
            let at = r.position();
            if Tag::decode(r)? != (Tag::Closing { tag_num: 0 }) {
                return Err(DecodeError::InvalidTag { offset: at });
            }
        }
        Ok(Self {
            invoke_id,
            service_choice,
            error_class,
            error_code,
        })
    }
}

fn decode_error_value(r: &mut Reader<'_>, context_tag: u8) -> Result<u32, DecodeError> {
    let at = r.position();
    match Tag::decode(r)? {
        Tag::Application {
            tag: AppTag::Enumerated,
            len,
        } => decode_unsigned(r, len as usize),
        Tag::Context { tag_num, len } if tag_num == context_tag => {
            decode_unsigned(r, len as usize)
        }
        _ => Err(DecodeError::InvalidTag { offset: at }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectPdu {
    pub invoke_id: u8,
    pub reason: u8,
}

impl RejectPdu {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(ApduType::Reject.header_octet())?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.reason)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        check_first_octet(r.read_u8()?, ApduType::Reject, 0x0F)?;
        Ok(Self {
            invoke_id: r.read_u8()?,
            reason: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortPdu {
    pub server: bool,
    pub invoke_id: u8,
    pub reason: u8,
}

impl AbortPdu {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let mut b0 = ApduType::Abort.header_octet();
        if self.server {
            b0 |= FROM_SERVER;
        }
        w.write_u8(b0)?;
        w.write_u8(self.invoke_id)?;
        w.write_u8(self.reason)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let b0 = r.read_u8()?;
        check_first_octet(b0, ApduType::Abort, 0b0000_1110)?;
        Ok(Self {
            server: b0 & FROM_SERVER != 0,
            invoke_id: r.read_u8()?,
            reason: r.read_u8()?,
        })
    }
}
