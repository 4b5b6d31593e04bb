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

pub const SERVICE_WRITE_PROPERTY: u8 = 0x0F;

#[derive(Debug, Clone, PartialEq)]
pub struct WritePropertyRequest {
    pub object_id: ObjectId,
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
    pub value: AnyValue,
    /// Command priority, 1 (highest) to 16.
    pub priority: Option<u8>,
}

impl WritePropertyRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(w, 0, self.object_id.raw())?;
        encode_ctx_enumerated(w, 1, self.property_id.to_u32())?;
        if let Some(idx) = self.array_index {
            encode_ctx_unsigned(w, 2, idx)?;
        }
        self.value.encode_enclosed(w, 3)?;
        if let Some(priority) = self.priority {
            encode_ctx_unsigned(w, 4, u32::from(priority))?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(r, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_enumerated(r, 1)?);
        let array_index = decode_optional_ctx_unsigned(r, 2)?;
        let value = AnyValue::decode_enclosed(r, 3)?;
        let at = r.position();
        let priority = match decode_optional_ctx_unsigned(r, 4)? {
            Some(p) => {
                Some(u8::try_from(p).map_err(|_| DecodeError::InvalidLength { offset: at })?)
            }
            None => None,
        };
        Ok(Self {
            object_id,
            property_id,
            array_index,
            value,
            priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_to_vec;
    use crate::types::{DataValue, ObjectType};

    #[test]
    fn roundtrip_with_priority() {
        let req = WritePropertyRequest {
            object_id: ObjectId::new(ObjectType::AnalogValue, 1),
            property_id: PropertyId::PresentValue,
            array_index: None,
            value: AnyValue::single(DataValue::Real(21.0)),
            priority: Some(8),
        };
        let bytes = encode_to_vec(|w| req.encode(w)).unwrap();
        assert_eq!(&bytes[bytes.len() - 2..], &[0x49, 0x08]);
        assert_eq!(WritePropertyRequest::decode(&mut Reader::new(&bytes)).unwrap(), req);
    }

    #[test]
    fn oversized_priority() {
        let bytes = [
            0x0C, 0x00, 0x80, 0x00, 0x01, 0x19, 0x55, 0x3E, 0x00, 0x3F, 0x4A, 0x01, 0x00,
        ];
        assert_eq!(
            WritePropertyRequest::decode(&mut Reader::new(&bytes)).unwrap_err(),
            DecodeError::InvalidLength { offset: 10 }
        );
    }
}
