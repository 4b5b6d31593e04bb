use crate::encoding::{
    primitives::{
        encode_closing_tag, encode_opening_tag, expect_closing_tag, expect_opening_tag,
        is_closing_tag,
    },
    reader::Reader,
    tagged::TaggedValue,
    writer::Writer,
};
use crate::types::DataValue;
use crate::{DecodeError, EncodeError};
use alloc::vec;
use alloc::vec::Vec;

/// The content of an "ABSTRACT-SYNTAX.&Type" property value: any sequence of
/// tagged values, carried between a pair of context opening/closing tags.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnyValue(pub Vec<TaggedValue>);

impl AnyValue {
    pub fn single(value: DataValue) -> Self {
        Self(vec![TaggedValue::Application(value)])
    }

    pub fn list(values: impl IntoIterator<Item = DataValue>) -> Self {
        Self(values.into_iter().map(TaggedValue::Application).collect())
    }

    /// The value when it is exactly one application primitive.
    pub fn as_single(&self) -> Option<&DataValue> {
        match self.0.as_slice() {
            [TaggedValue::Application(v)] => Some(v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f32> {
        self.as_single().and_then(DataValue::as_real)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        for value in &self.0 {
            value.encode(w)?;
        }
        Ok(())
    }

    /// Writes `[tag_num] { values }`.
    pub fn encode_enclosed(&self, w: &mut Writer<'_>, tag_num: u8) -> Result<(), EncodeError> {
        encode_opening_tag(w, tag_num)?;
        self.encode(w)?;
        encode_closing_tag(w, tag_num)
    }

    /// Reads tagged values up to, but not including, the closing tag `tag_num`.
    pub fn decode_until_closing(r: &mut Reader<'_>, tag_num: u8) -> Result<Self, DecodeError> {
        let mut values = Vec::new();
        while !is_closing_tag(r, tag_num)? {
            if r.is_empty() {
                return Err(r.truncated());
            }
            values.push(TaggedValue::decode(r)?);
        }
        Ok(Self(values))
    }

    /// Reads `[tag_num] { values }`.
    pub fn decode_enclosed(r: &mut Reader<'_>, tag_num: u8) -> Result<Self, DecodeError> {
        expect_opening_tag(r, tag_num)?;
        let value = Self::decode_until_closing(r, tag_num)?;
        expect_closing_tag(r, tag_num)?;
        Ok(value)
    }
}

impl From<DataValue> for AnyValue {
    fn from(value: DataValue) -> Self {
        Self::single(value)
    }
}
