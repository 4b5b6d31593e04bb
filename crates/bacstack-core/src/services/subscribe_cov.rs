use crate::encoding::{
    primitives::{
        decode_ctx_boolean, decode_ctx_object_id, decode_ctx_unsigned,
        decode_optional_ctx_unsigned, encode_ctx_boolean, encode_ctx_object_id,
        encode_ctx_unsigned, is_context_tag,
    },
    reader::Reader,
    writer::Writer,
};
use crate::types::ObjectId;
use crate::{DecodeError, EncodeError};

pub const SERVICE_SUBSCRIBE_COV: u8 = 0x05;

/// SubscribeCOV parameters. Omitting both optional fields cancels the
/// subscription identified by process id and monitored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscribeCovRequest {
    pub subscriber_process_id: u32,
    pub monitored_object_id: ObjectId,
    pub issue_confirmed_notifications: Option<bool>,
    /// Seconds; `None` or `Some(0)` subscribes indefinitely.
    pub lifetime_seconds: Option<u32>,
}

impl SubscribeCovRequest {
    pub fn new(
        subscriber_process_id: u32,
        monitored_object_id: ObjectId,
        confirmed: bool,
        lifetime_seconds: Option<u32>,
    ) -> Self {
        Self {
            subscriber_process_id,
            monitored_object_id,
            issue_confirmed_notifications: Some(confirmed),
            lifetime_seconds,
        }
    }

    pub fn cancel(subscriber_process_id: u32, monitored_object_id: ObjectId) -> Self {
        Self {
            subscriber_process_id,
            monitored_object_id,
            issue_confirmed_notifications: None,
            lifetime_seconds: None,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.issue_confirmed_notifications.is_none() && self.lifetime_seconds.is_none()
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        encode_ctx_unsigned(w, 0, self.subscriber_process_id)?;
        encode_ctx_object_id(w, 1, self.monitored_object_id.raw())?;
        if let Some(confirmed) = self.issue_confirmed_notifications {
            encode_ctx_boolean(w, 2, confirmed)?;
        }
        if let Some(lifetime) = self.lifetime_seconds {
            encode_ctx_unsigned(w, 3, lifetime)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let subscriber_process_id = decode_ctx_unsigned(r, 0)?;
        let monitored_object_id = ObjectId::from_raw(decode_ctx_object_id(r, 1)?);
        let issue_confirmed_notifications = if is_context_tag(r, 2)? {
            Some(decode_ctx_boolean(r, 2)?)
        } else {
            None
        };
        let lifetime_seconds = decode_optional_ctx_unsigned(r, 3)?;
        Ok(Self {
            subscriber_process_id,
            monitored_object_id,
            issue_confirmed_notifications,
            lifetime_seconds,
        })
    }
}
