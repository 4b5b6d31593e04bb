use crate::DecodeError;

/// The 4-bit PDU type in the high nibble of the first APDU octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ApduType {
    ConfirmedRequest = 0,
    UnconfirmedRequest = 1,
    SimpleAck = 2,
    ComplexAck = 3,
    SegmentAck = 4,
    Error = 5,
    Reject = 6,
    Abort = 7,
}

impl ApduType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ConfirmedRequest),
            1 => Some(Self::UnconfirmedRequest),
            2 => Some(Self::SimpleAck),
            3 => Some(Self::ComplexAck),
            4 => Some(Self::SegmentAck),
            5 => Some(Self::Error),
            6 => Some(Self::Reject),
            7 => Some(Self::Abort),
            _ => None,
        }
    }

    pub(crate) const fn header_octet(self) -> u8 {
        (self as u8) << 4
    }
}

/// Checks the PDU type nibble of `b0` and that none of `reserved` is set.
pub(crate) fn check_first_octet(
    b0: u8,
    expected: ApduType,
    reserved: u8,
) -> Result<(), DecodeError> {
    if b0 >> 4 != expected as u8 {
        return Err(DecodeError::UnsupportedPduType { offset: 0 });
    }
    if b0 & reserved != 0 {
        return Err(DecodeError::ReservedFieldNonzero { offset: 0 });
    }
    Ok(())
}

/// Segmentation fields of a segmented Confirmed-Request or Complex-ACK.
///
/// `window_size` is the proposed window size (1 to 127).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentHeader {
    pub sequence_number: u8,
    pub window_size: u8,
    pub more_follows: bool,
}

impl SegmentHeader {
    pub const MAX_WINDOW_SIZE: u8 = 127;

    pub const fn window_in_range(&self) -> bool {
        self.window_size >= 1 && self.window_size <= Self::MAX_WINDOW_SIZE
    }
}
