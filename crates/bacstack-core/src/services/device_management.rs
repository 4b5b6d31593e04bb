use crate::encoding::{
    primitives::{
        decode_ctx_character_string, decode_ctx_enumerated, decode_optional_ctx_unsigned,
        encode_ctx_character_string, encode_ctx_enumerated, encode_ctx_unsigned, is_context_tag,
    },
    reader::Reader,
    writer::Writer,
};
use crate::{DecodeError, EncodeError};
use alloc::string::String;

pub const SERVICE_DEVICE_COMMUNICATION_CONTROL: u8 = 0x11;

/// Passwords longer than this are not accepted by the service.
pub const MAX_PASSWORD_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum DeviceCommunicationState {
    Enable = 0,
    Disable = 1,
    DisableInitiation = 2,
}

impl DeviceCommunicationState {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Enable),
            1 => Some(Self::Disable),
            2 => Some(Self::DisableInitiation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommunicationControlRequest {
    pub time_duration_minutes: Option<u16>,
    pub enable_disable: DeviceCommunicationState,
    pub password: Option<String>,
}

impl DeviceCommunicationControlRequest {
    pub fn new(enable_disable: DeviceCommunicationState) -> Self {
        Self {
            time_duration_minutes: None,
            enable_disable,
            password: None,
        }
    }

    pub fn with_duration_minutes(mut self, minutes: u16) -> Self {
        self.time_duration_minutes = Some(minutes);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if let Some(minutes) = self.time_duration_minutes {
            encode_ctx_unsigned(w, 0, u32::from(minutes))?;
        }
        encode_ctx_enumerated(w, 1, self.enable_disable.to_u32())?;
        if let Some(password) = &self.password {
            if password.chars().count() > MAX_PASSWORD_LEN {
                return Err(EncodeError::InvalidLength);
            }
            encode_ctx_character_string(w, 2, password)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let at = r.position();
        let time_duration_minutes = match decode_optional_ctx_unsigned(r, 0)? {
            Some(m) => {
                Some(u16::try_from(m).map_err(|_| DecodeError::InvalidLength { offset: at })?)
            }
            None => None,
        };
        let at = r.position();
        let enable_disable = DeviceCommunicationState::from_u32(decode_ctx_enumerated(r, 1)?)
            .ok_or(DecodeError::InvalidTag { offset: at })?;
        let password = if is_context_tag(r, 2)? {
            Some(decode_ctx_character_string(r, 2)?)
        } else {
            None
        };
        Ok(Self {
            time_duration_minutes,
            enable_disable,
            password,
        })
    }
}
