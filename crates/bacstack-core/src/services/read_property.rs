use crate::encoding::{
    primitives::{
        decode_ctx_enumerated, decode_ctx_object_id, decode_optional_ctx_unsigned,
        encode_ctx_enumerated, encode_ctx_object_id, encode_ctx_unsigned,
    },
    reader::Reader,
    writer::Writer,
};
use crate::types::{AnyValue, ObjectId, PropertyId};
use crate::{DecodeError, EncodeError};

pub const SERVICE_READ_PROPERTY: u8 = 0x0C;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadPropertyRequest {
    pub object_id: ObjectId,
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
}

impl ReadPropertyRequest {
    pub fn new(object_id: ObjectId, property_id: PropertyId) -> Self {
        Self {
            object_id,
            property_id,
            array_index: None,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(w, 0, self.object_id.raw())?;
        encode_ctx_enumerated(w, 1, self.property_id.to_u32())?;
        if let Some(idx) = self.array_index {
            encode_ctx_unsigned(w, 2, idx)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            object_id: ObjectId::from_raw(decode_ctx_object_id(r, 0)?),
            property_id: PropertyId::from_u32(decode_ctx_enumerated(r, 1)?),
            array_index: decode_optional_ctx_unsigned(r, 2)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadPropertyAck {
    pub object_id: ObjectId,
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
    pub value: AnyValue,
}

impl ReadPropertyAck {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(w, 0, self.object_id.raw())?;
        encode_ctx_enumerated(w, 1, self.property_id.to_u32())?;
        if let Some(idx) = self.array_index {
            encode_ctx_unsigned(w, 2, idx)?;
        }
        self.value.encode_enclosed(w, 3)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            object_id: ObjectId::from_raw(decode_ctx_object_id(r, 0)?),
            property_id: PropertyId::from_u32(decode_ctx_enumerated(r, 1)?),
            array_index: decode_optional_ctx_unsigned(r, 2)?,
            value: AnyValue::decode_enclosed(r, 3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_to_vec;
    use crate::types::{DataValue, ObjectType};

    #[test]
    fn request_wire_form() {
        let req = ReadPropertyRequest::new(
            ObjectId::new(ObjectType::Device, 123),
            PropertyId::ObjectName,
        );
        let bytes = encode_to_vec(|w| req.encode(w)).unwrap();
        assert_eq!(bytes, [0x0C, 0x02, 0x00, 0x00, 0x7B, 0x19, 0x4D]);
        assert_eq!(ReadPropertyRequest::decode(&mut Reader::new(&bytes)).unwrap(), req);
    }

    #[test]
    fn ack_with_array_index() {
        let ack = ReadPropertyAck {
            object_id: ObjectId::new(ObjectType::AnalogInput, 0),
            property_id: PropertyId::PriorityArray,
            array_index: Some(8),
            value: AnyValue::single(DataValue::Null),
        };
        let bytes = encode_to_vec(|w| ack.encode(w)).unwrap();
        assert_eq!(ReadPropertyAck::decode(&mut Reader::new(&bytes)).unwrap(), ack);
    }

    #[test]
    fn ack_missing_value_is_truncated() {
        let bytes = [0x0C, 0x00, 0x00, 0x00, 0x00, 0x19, 0x55];
        assert!(matches!(
            ReadPropertyAck::decode(&mut Reader::new(&bytes)),
            Err(DecodeError::TruncatedInput { offset: 7 })
        ));
    }
}
