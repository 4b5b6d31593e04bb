//! Self-describing tagged values.
//!
//! A [`TaggedValue`] is one element of a BACnet tagged stream: an application
//! primitive, a context-tagged primitive whose content is kept as raw octets
//! (its meaning depends on the enclosing service), or a constructed value
//! bracketed by matching opening and closing tags.

use crate::encoding::{encode_to_vec, reader::Reader, tag::Tag, writer::Writer};
use crate::types::DataValue;
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

/// Constructed values may nest at most this many levels.
pub const MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaggedValue {
    Application(DataValue),
    Context { tag_num: u8, data: Vec<u8> },
    Constructed { tag_num: u8, values: Vec<TaggedValue> },
}

impl TaggedValue {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        self.encode_at_depth(w, 0)
    }

    fn encode_at_depth(&self, w: &mut Writer<'_>, depth: usize) -> Result<(), EncodeError> {
        match self {
            Self::Application(value) => value.encode(w),
            Self::Context { tag_num, data } => {
                let len = u32::try_from(data.len()).map_err(|_| EncodeError::InvalidLength)?;
                Tag::Context {
                    tag_num: *tag_num,
                    len,
                }
                .encode(w)?;
                w.write_all(data)
            }
            Self::Constructed { tag_num, values } => {
                if depth >= MAX_NESTING_DEPTH {
                    return Err(EncodeError::ValueOutOfRange);
                }
                Tag::Opening { tag_num: *tag_num }.encode(w)?;
                for value in values {
                    value.encode_at_depth(w, depth + 1)?;
                }
                Tag::Closing { tag_num: *tag_num }.encode(w)
            }
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        decode_at_depth(r, 0)
    }

    pub fn as_application(&self) -> Option<&DataValue> {
        match self {
            Self::Application(v) => Some(v),
            _ => None,
        }
    }
}

fn decode_at_depth(r: &mut Reader<'_>, depth: usize) -> Result<TaggedValue, DecodeError> {
    let start = r.position();
    match Tag::decode(r)? {
        Tag::Application { tag, len } => {
            DataValue::decode_content(r, tag, len).map(TaggedValue::Application)
        }
        Tag::Context { tag_num, len } => {
            let data = r.read_exact(len as usize)?.to_vec();
            Ok(TaggedValue::Context { tag_num, data })
        }
        Tag::Opening { tag_num } => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(DecodeError::InvalidTag { offset: start });
            }
            let mut values = Vec::new();
            loop {
                let at = r.position();
                let mut probe = *r;
                match Tag::decode(&mut probe)? {
                    Tag::Closing { tag_num: n } if n == tag_num => {
                        *r = probe;
                        return Ok(TaggedValue::Constructed { tag_num, values });
                    }
                    Tag::Closing { .. } => return Err(DecodeError::InvalidTag { offset: at }),
                    _ => values.push(decode_at_depth(r, depth + 1)?),
                }
            }
        }
        Tag::Closing { .. } => Err(DecodeError::InvalidTag { offset: start }),
    }
}

/// Encodes one tagged value into a fresh buffer.
pub fn encode_tag(value: &TaggedValue) -> Result<Vec<u8>, EncodeError> {
    encode_to_vec(|w| value.encode(w))
}

/// Decodes the tagged value starting at `cursor` and returns it together
/// with the cursor just past it. Error offsets are relative to `buf`.
pub fn decode_tag(buf: &[u8], cursor: usize) -> Result<(TaggedValue, usize), DecodeError> {
    let mut r = Reader::at(buf, cursor);
    let value = TaggedValue::decode(&mut r)?;
    Ok((value, r.position()))
}

/// Decodes tagged values until the input is exhausted.
pub fn decode_all(buf: &[u8]) -> Result<Vec<TaggedValue>, DecodeError> {
    let mut r = Reader::new(buf);
    let mut out = Vec::new();
    while !r.is_empty() {
        out.push(TaggedValue::decode(&mut r)?);
    }
    Ok(out)
}
