use crate::encoding::{
    primitives::{
        decode_ctx_enumerated, decode_ctx_object_id, decode_ctx_unsigned,
        decode_optional_ctx_unsigned, encode_closing_tag, encode_ctx_enumerated,
        encode_ctx_object_id, encode_ctx_unsigned, encode_opening_tag, expect_closing_tag,
        expect_opening_tag, is_closing_tag,
    },
    reader::Reader,
    writer::Writer,
};
use crate::types::{AnyValue, ObjectId, PropertyId};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

pub const SERVICE_CONFIRMED_COV_NOTIFICATION: u8 = 0x01;
pub const SERVICE_UNCONFIRMED_COV_NOTIFICATION: u8 = 0x02;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CovPropertyValue {
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
    pub value: AnyValue,
    pub priority: Option<u32>,
}

impl CovPropertyValue {
    pub fn new(property_id: PropertyId, value: AnyValue) -> Self {
        Self {
            property_id,
            array_index: None,
            value,
            priority: None,
        }
    }
}

/// Parameters shared by Confirmed- and Unconfirmed-COVNotification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CovNotificationRequest {
    pub subscriber_process_id: u32,
    pub initiating_device_id: ObjectId,
    pub monitored_object_id: ObjectId,
    /// Seconds until the subscription lapses; 0 for indefinite subscriptions.
    pub time_remaining_seconds: u32,
    pub values: Vec<CovPropertyValue>,
}

impl CovNotificationRequest {
    pub fn value_of(&self, property_id: PropertyId) -> Option<&AnyValue> {
        self.values
            .iter()
            .find(|v| v.property_id == property_id)
            .map(|v| &v.value)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        encode_ctx_unsigned(w, 0, self.subscriber_process_id)?;
        encode_ctx_object_id(w, 1, self.initiating_device_id.raw())?;
        encode_ctx_object_id(w, 2, self.monitored_object_id.raw())?;
        encode_ctx_unsigned(w, 3, self.time_remaining_seconds)?;
        encode_opening_tag(w, 4)?;
        for v in &self.values {
            encode_ctx_enumerated(w, 0, v.property_id.to_u32())?;
            if let Some(idx) = v.array_index {
                encode_ctx_unsigned(w, 1, idx)?;
            }
            v.value.encode_enclosed(w, 2)?;
            if let Some(priority) = v.priority {
                encode_ctx_unsigned(w, 3, priority)?;
            }
        }
        encode_closing_tag(w, 4)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let subscriber_process_id = decode_ctx_unsigned(r, 0)?;
        let initiating_device_id = ObjectId::from_raw(decode_ctx_object_id(r, 1)?);
        let monitored_object_id = ObjectId::from_raw(decode_ctx_object_id(r, 2)?);
        let time_remaining_seconds = decode_ctx_unsigned(r, 3)?;
        expect_opening_tag(r, 4)?;
        let mut values = Vec::new();
        while !is_closing_tag(r, 4)? {
            values.push(CovPropertyValue {
                property_id: PropertyId::from_u32(decode_ctx_enumerated(r, 0)?),
                array_index: decode_optional_ctx_unsigned(r, 1)?,
                value: AnyValue::decode_enclosed(r, 2)?,
                priority: decode_optional_ctx_unsigned(r, 3)?,
            });
        }
        expect_closing_tag(r, 4)?;
        Ok(Self {
            subscriber_process_id,
            initiating_device_id,
            monitored_object_id,
            time_remaining_seconds,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_to_vec;
    use crate::types::{BitString, DataValue, ObjectType};
    use alloc::vec;

    #[test]
    fn notification_roundtrip() {
        let req = CovNotificationRequest {
            subscriber_process_id: 18,
            initiating_device_id: ObjectId::new(ObjectType::Device, 4),
            monitored_object_id: ObjectId::new(ObjectType::AnalogInput, 10),
            time_remaining_seconds: 0,
            values: vec![
                CovPropertyValue::new(
                    PropertyId::PresentValue,
                    AnyValue::single(DataValue::Real(65.0)),
                ),
                CovPropertyValue::new(
                    PropertyId::StatusFlags,
                    AnyValue::single(DataValue::BitString(BitString::from_bits(&[false; 4]))),
                ),
            ],
        };
        let bytes = encode_to_vec(|w| req.encode(w)).unwrap();
        assert_eq!(&bytes[..2], &[0x09, 0x12]);
        let decoded = CovNotificationRequest::decode(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(
            decoded.value_of(PropertyId::PresentValue).and_then(AnyValue::as_real),
            Some(65.0)
        );
    }
}
