use crate::encoding::primitives::{
    decode_optional_ctx_unsigned, encode_ctx_unsigned, is_context_tag,
};
use crate::encoding::{reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};

pub const SERVICE_WHO_IS: u8 = 0x08;

/// Who-Is, either global or restricted to an inclusive device-instance range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WhoIsRequest {
    pub low_limit: Option<u32>,
    pub high_limit: Option<u32>,
}

impl WhoIsRequest {
    pub const fn global() -> Self {
        Self {
            low_limit: None,
            high_limit: None,
        }
    }

    pub const fn range(low: u32, high: u32) -> Self {
        Self {
            low_limit: Some(low),
            high_limit: Some(high),
        }
    }

    pub fn matches(&self, device_instance: u32) -> bool {
        match (self.low_limit, self.high_limit) {
            (Some(low), Some(high)) => (low..=high).contains(&device_instance),
            _ => true,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match (self.low_limit, self.high_limit) {
            (Some(low), Some(high)) => {
                encode_ctx_unsigned(w, 0, low)?;
                encode_ctx_unsigned(w, 1, high)
            }
            (None, None) => Ok(()),
            _ => Err(EncodeError::Message("who-is limits must be given together")),
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let at = r.position();
        let low_limit = decode_optional_ctx_unsigned(r, 0)?;
        let high_limit = if low_limit.is_some() || is_context_tag(r, 1)? {
            decode_optional_ctx_unsigned(r, 1)?
        } else {
            None
        };
        if low_limit.is_some() != high_limit.is_some() {
            return Err(DecodeError::InvalidTag { offset: at });
        }
        Ok(Self {
            low_limit,
            high_limit,
        })
    }
}
