use crate::encoding::{
    primitives::{
        decode_app_enumerated, decode_ctx_enumerated, decode_ctx_object_id,
        decode_optional_ctx_unsigned, encode_app_enumerated, encode_closing_tag,
        encode_ctx_enumerated, encode_ctx_object_id, encode_ctx_unsigned, encode_opening_tag,
        expect_closing_tag, expect_opening_tag, is_closing_tag, is_opening_tag,
    },
    reader::Reader,
    writer::Writer,
};
use crate::types::{AnyValue, ObjectId, PropertyId};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

pub const SERVICE_READ_PROPERTY_MULTIPLE: u8 = 0x0E;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyReference {
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
}

impl PropertyReference {
    pub const fn new(property_id: PropertyId) -> Self {
        Self {
            property_id,
            array_index: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadAccessSpec {
    pub object_id: ObjectId,
    pub properties: Vec<PropertyReference>,
}

impl ReadAccessSpec {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(w, 0, self.object_id.raw())?;
        encode_opening_tag(w, 1)?;
        for p in &self.properties {
            encode_ctx_enumerated(w, 0, p.property_id.to_u32())?;
            if let Some(idx) = p.array_index {
                encode_ctx_unsigned(w, 1, idx)?;
            }
        }
        encode_closing_tag(w, 1)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(r, 0)?);
        expect_opening_tag(r, 1)?;
        let mut properties = Vec::new();
        loop {
            properties.push(PropertyReference {
                property_id: PropertyId::from_u32(decode_ctx_enumerated(r, 0)?),
                array_index: decode_optional_ctx_unsigned(r, 1)?,
            });
            if is_closing_tag(r, 1)? {
                break;
            }
        }
        expect_closing_tag(r, 1)?;
        Ok(Self {
            object_id,
            properties,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPropertyMultipleRequest {
    pub specs: Vec<ReadAccessSpec>,
}

impl ReadPropertyMultipleRequest {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if self.specs.is_empty() {
            return Err(EncodeError::Message("read access specification list is empty"));
        }
        for spec in &self.specs {
            spec.encode(w)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut specs = Vec::new();
        loop {
            specs.push(ReadAccessSpec::decode(r)?);
            if r.is_empty() {
                break;
            }
        }
        Ok(Self { specs })
    }
}

/// Outcome of reading one property inside a ReadPropertyMultiple-ACK.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    Value(AnyValue),
    Error { error_class: u32, error_code: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyResult {
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
    pub result: ReadResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadAccessResult {
    pub object_id: ObjectId,
    pub results: Vec<PropertyResult>,
}

impl ReadAccessResult {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(w, 0, self.object_id.raw())?;
        encode_opening_tag(w, 1)?;
        for item in &self.results {
            encode_ctx_enumerated(w, 2, item.property_id.to_u32())?;
            if let Some(idx) = item.array_index {
                encode_ctx_unsigned(w, 3, idx)?;
            }
            match &item.result {
                ReadResult::Value(value) => value.encode_enclosed(w, 4)?,
                ReadResult::Error {
                    error_class,
                    error_code,
                } => {
                    encode_opening_tag(w, 5)?;
                    encode_app_enumerated(w, *error_class)?;
                    encode_app_enumerated(w, *error_code)?;
                    encode_closing_tag(w, 5)?;
                }
            }
        }
        encode_closing_tag(w, 1)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(r, 0)?);
        expect_opening_tag(r, 1)?;
        let mut results = Vec::new();
        while !is_closing_tag(r, 1)? {
            let property_id = PropertyId::from_u32(decode_ctx_enumerated(r, 2)?);
            let array_index = decode_optional_ctx_unsigned(r, 3)?;
            let result = if is_opening_tag(r, 4)? {
                ReadResult::Value(AnyValue::decode_enclosed(r, 4)?)
            } else {
                expect_opening_tag(r, 5)?;
                let error_class = decode_app_enumerated(r)?;
                let error_code = decode_app_enumerated(r)?;
                expect_closing_tag(r, 5)?;
                ReadResult::Error {
                    error_class,
                    error_code,
                }
            };
            results.push(PropertyResult {
                property_id,
                array_index,
                result,
            });
        }
        expect_closing_tag(r, 1)?;
        Ok(Self { object_id, results })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadPropertyMultipleAck {
    pub results: Vec<ReadAccessResult>,
}

impl ReadPropertyMultipleAck {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        for result in &self.results {
            result.encode(w)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut results = Vec::new();
        while !r.is_empty() {
            results.push(ReadAccessResult::decode(r)?);
        }
        Ok(Self { results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_to_vec;
    use crate::types::{DataValue, ErrorClass, ErrorCode, ObjectType};
    use alloc::vec;

    #[test]
    fn request_wire_form() {
        let req = ReadPropertyMultipleRequest {
            specs: vec![ReadAccessSpec {
                object_id: ObjectId::new(ObjectType::AnalogInput, 16),
                properties: vec![
                    PropertyReference::new(PropertyId::PresentValue),
                    PropertyReference::new(PropertyId::Reliability),
                ],
            }],
        };
        let bytes = encode_to_vec(|w| req.encode(w)).unwrap();
        assert_eq!(
            bytes,
            [0x0C, 0x00, 0x00, 0x00, 0x10, 0x1E, 0x09, 0x55, 0x09, 0x67, 0x1F]
        );
        assert_eq!(
            ReadPropertyMultipleRequest::decode(&mut Reader::new(&bytes)).unwrap(),
            req
        );
    }

    #[test]
    fn empty_property_list_is_rejected() {
        let bytes = [0x0C, 0x00, 0x00, 0x00, 0x10, 0x1E, 0x1F];
        assert!(matches!(
            ReadPropertyMultipleRequest::decode(&mut Reader::new(&bytes)),
            Err(DecodeError::InvalidTag { offset: 6 })
        ));
    }

    #[test]
    fn ack_mixes_values_and_errors() {
        let ack = ReadPropertyMultipleAck {
            results: vec![ReadAccessResult {
                object_id: ObjectId::new(ObjectType::AnalogInput, 0),
                results: vec![
                    PropertyResult {
                        property_id: PropertyId::PresentValue,
                        array_index: None,
                        result: ReadResult::Value(AnyValue::single(DataValue::Real(72.5))),
                    },
                    PropertyResult {
                        property_id: PropertyId::Description,
                        array_index: None,
                        result: ReadResult::Error {
                            error_class: ErrorClass::Property.to_u32(),
                            error_code: ErrorCode::UnknownProperty.to_u32(),
                        },
                    },
                ],
            }],
        };
        let bytes = encode_to_vec(|w| ack.encode(w)).unwrap();
        assert_eq!(
            ReadPropertyMultipleAck::decode(&mut Reader::new(&bytes)).unwrap(),
            ack
        );
    }
}
