use crate::encoding::{
    primitives::{
        decode_character_string, decode_signed, decode_unsigned, encode_signed, encode_unsigned,
        CHARSET_UTF8,
    },
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::types::{BitString, Date, ObjectId, Time};
use crate::{DecodeError, EncodeError};
use alloc::string::String;
use alloc::vec::Vec;

/// An application-tagged primitive value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Signed(i32),
    Real(f32),
    Double(f64),
    OctetString(Vec<u8>),
    CharacterString(String),
    BitString(BitString),
    Enumerated(u32),
    Date(Date),
    Time(Time),
    ObjectId(ObjectId),
}

fn content_len(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::InvalidLength)
}

impl DataValue {
    pub const fn app_tag(&self) -> AppTag {
        match self {
            Self::Null => AppTag::Null,
            Self::Boolean(_) => AppTag::Boolean,
            Self::Unsigned(_) => AppTag::UnsignedInt,
            Self::Signed(_) => AppTag::SignedInt,
            Self::Real(_) => AppTag::Real,
            Self::Double(_) => AppTag::Double,
            Self::OctetString(_) => AppTag::OctetString,
            Self::CharacterString(_) => AppTag::CharacterString,
            Self::BitString(_) => AppTag::BitString,
            Self::Enumerated(_) => AppTag::Enumerated,
            Self::Date(_) => AppTag::Date,
            Self::Time(_) => AppTag::Time,
            Self::ObjectId(_) => AppTag::ObjectId,
        }
    }

    /// Writes the application tag header followed by the content octets.
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let tag = self.app_tag();
        match self {
            Self::Null => Tag::Application { tag, len: 0 }.encode(w),
            Self::Boolean(v) => Tag::Application {
                tag,
                len: u32::from(*v),
            }
            .encode(w),
            Self::Unsigned(v) | Self::Enumerated(v) => {
                let mut scratch = [0u8; 4];
                let len = encode_unsigned(&mut Writer::new(&mut scratch), *v)?;
                Tag::Application {
                    tag,
                    len: len as u32,
                }
                .encode(w)?;
                w.write_all(&scratch[..len])
            }
            Self::Signed(v) => {
                let mut scratch = [0u8; 4];
                let len = encode_signed(&mut Writer::new(&mut scratch), *v)?;
                Tag::Application {
                    tag,
                    len: len as u32,
                }
                .encode(w)?;
                w.write_all(&scratch[..len])
            }
            Self::Real(v) => {
                Tag::Application { tag, len: 4 }.encode(w)?;
                w.write_f32(*v)
            }
            Self::Double(v) => {
                Tag::Application { tag, len: 8 }.encode(w)?;
                w.write_f64(*v)
            }
            Self::OctetString(bytes) => {
                Tag::Application {
                    tag,
                    len: content_len(bytes.len())?,
                }
                .encode(w)?;
                w.write_all(bytes)
            }
            Self::CharacterString(s) => {
                Tag::Application {
                    tag,
                    len: content_len(s.len() + 1)?,
                }
                .encode(w)?;
                w.write_u8(CHARSET_UTF8)?;
                w.write_all(s.as_bytes())
            }
            Self::BitString(bits) => {
                Tag::Application {
                    tag,
                    len: content_len(bits.data().len() + 1)?,
                }
                .encode(w)?;
                w.write_u8(bits.unused_bits())?;
                w.write_all(bits.data())
            }
            Self::Date(d) => {
                Tag::Application { tag, len: 4 }.encode(w)?;
                w.write_all(&d.to_bytes())
            }
            Self::Time(t) => {
                Tag::Application { tag, len: 4 }.encode(w)?;
                w.write_all(&t.to_bytes())
            }
            Self::ObjectId(id) => {
                Tag::Application { tag, len: 4 }.encode(w)?;
                w.write_be_u32(id.raw())
            }
        }
    }

    /// Decodes a complete application-tagged value.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let start = r.position();
        match Tag::decode(r)? {
            Tag::Application { tag, len } => Self::decode_content(r, tag, len),
            _ => Err(DecodeError::InvalidTag { offset: start }),
        }
    }

    /// Decodes the content octets that follow an application tag header.
    pub fn decode_content(r: &mut Reader<'_>, tag: AppTag, len: u32) -> Result<Self, DecodeError> {
        let at = r.position();
        let len = len as usize;
        let fixed = |expected: usize| -> Result<(), DecodeError> {
            if len == expected {
                Ok(())
            } else {
                Err(DecodeError::InvalidLength { offset: at })
            }
        };
        Ok(match tag {
            AppTag::Null => {
                fixed(0)?;
                Self::Null
            }
            AppTag::Boolean => Self::Boolean(len == 1),
            AppTag::UnsignedInt => Self::Unsigned(decode_unsigned(r, len)?),
            AppTag::SignedInt => Self::Signed(decode_signed(r, len)?),
            AppTag::Enumerated => Self::Enumerated(decode_unsigned(r, len)?),
            AppTag::Real => {
                fixed(4)?;
                Self::Real(f32::from_bits(r.read_be_u32()?))
            }
            AppTag::Double => {
                fixed(8)?;
                let b = r.read_exact(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                Self::Double(f64::from_bits(u64::from_be_bytes(raw)))
            }
            AppTag::OctetString => Self::OctetString(r.read_exact(len)?.to_vec()),
            AppTag::CharacterString => Self::CharacterString(decode_character_string(r, len)?),
            AppTag::BitString => {
                if len == 0 {
                    return Err(DecodeError::InvalidLength { offset: at });
                }
                let raw = r.read_exact(len)?;
                let bits = BitString::new(raw[0], raw[1..].to_vec())
                    .ok_or(DecodeError::InvalidTag { offset: at })?;
                Self::BitString(bits)
            }
            AppTag::Date => {
                fixed(4)?;
                Self::Date(Date::from_bytes(read4(r)?))
            }
            AppTag::Time => {
                fixed(4)?;
                Self::Time(Time::from_bytes(read4(r)?))
            }
            AppTag::ObjectId => {
                fixed(4)?;
                Self::ObjectId(ObjectId::from_raw(r.read_be_u32()?))
            }
        })
    }

    pub fn as_real(&self) -> Option<f32> {
        match self {
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u32> {
        match self {
            Self::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::CharacterString(s) => Some(s),
            _ => None,
        }
    }
}

fn read4(r: &mut Reader<'_>) -> Result<[u8; 4], DecodeError> {
    let b = r.read_exact(4)?;
    Ok([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::DataValue;
    use crate::encoding::{encode_to_vec, reader::Reader};
    use crate::types::{BitString, ObjectId, ObjectType};
    use crate::DecodeError;
    use alloc::string::String;

    fn roundtrip(v: DataValue) -> DataValue {
        let bytes = encode_to_vec(|w| v.encode(w)).unwrap();
        let mut r = Reader::new(&bytes);
        let got = DataValue::decode(&mut r).unwrap();
        assert!(r.is_empty());
        got
    }

    #[test]
    fn wire_forms() {
        assert_eq!(
            encode_to_vec(|w| DataValue::Real(72.5).encode(w)).unwrap(),
            [0x44, 0x42, 0x91, 0x00, 0x00]
        );
        assert_eq!(
            encode_to_vec(|w| DataValue::Boolean(true).encode(w)).unwrap(),
            [0x11]
        );
        assert_eq!(
            encode_to_vec(|w| DataValue::CharacterString(String::from("AB")).encode(w)).unwrap(),
            [0x73, 0x00, b'A', b'B']
        );
    }

    #[test]
    fn roundtrips() {
        let values = [
            DataValue::Null,
            DataValue::Boolean(false),
            DataValue::Unsigned(70_000),
            DataValue::Signed(-300),
            DataValue::Double(-1.25),
            DataValue::OctetString(alloc::vec![1, 2, 3]),
            DataValue::BitString(BitString::from_bits(&[true, false, true])),
            DataValue::Enumerated(1),
            DataValue::ObjectId(ObjectId::new(ObjectType::AnalogInput, 7)),
        ];
        for v in values {
            assert_eq!(roundtrip(v.clone()), v);
        }
    }

    #[test]
    fn real_must_be_four_octets() {
        let mut r = Reader::new(&[0x43, 0, 0, 0]);
        assert_eq!(
            DataValue::decode(&mut r).unwrap_err(),
            DecodeError::InvalidLength { offset: 1 }
        );
    }

    #[test]
    fn bit_string_padding_is_checked() {
        let mut r = Reader::new(&[0x82, 0x08, 0x00]);
        assert_eq!(
            DataValue::decode(&mut r).unwrap_err(),
            DecodeError::InvalidTag { offset: 1 }
        );
    }

    #[test]
    fn long_octet_string_is_bounded_by_input() {
        // claims 0x0001_0000 octets, supplies two
        let mut r = Reader::new(&[0x65, 0xFF, 0x00, 0x01, 0x00, 0x00, 0xAA, 0xBB]);
        assert!(matches!(
            DataValue::decode(&mut r),
            Err(DecodeError::TruncatedInput { .. })
        ));
    }
}
