use crate::encoding::{reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};

/// Application tag numbers 0 through 12. Numbers 13 to 15 are reserved.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppTag {
    Null = 0,
    Boolean = 1,
    UnsignedInt = 2,
    SignedInt = 3,
    Real = 4,
    Double = 5,
    OctetString = 6,
    CharacterString = 7,
    BitString = 8,
    Enumerated = 9,
    Date = 10,
    Time = 11,
    ObjectId = 12,
}

impl AppTag {
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Null,
            1 => Self::Boolean,
            2 => Self::UnsignedInt,
            3 => Self::SignedInt,
            4 => Self::Real,
            5 => Self::Double,
            6 => Self::OctetString,
            7 => Self::CharacterString,
            8 => Self::BitString,
            9 => Self::Enumerated,
            10 => Self::Date,
            11 => Self::Time,
            12 => Self::ObjectId,
            _ => return None,
        })
    }
}

/// A decoded tag header.
///
/// For `Application { tag: Boolean, .. }` the `len` field holds the boolean
/// value itself; no content octets follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Application { tag: AppTag, len: u32 },
    Context { tag_num: u8, len: u32 },
    Opening { tag_num: u8 },
    Closing { tag_num: u8 },
}

const CLASS_CONTEXT: u8 = 0b0000_1000;
const EXTENDED_TAG: u8 = 0x0F;
const LVT_EXTENDED: u8 = 5;
const LVT_OPENING: u8 = 6;
const LVT_CLOSING: u8 = 7;

impl Tag {
    pub fn encode(self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Tag::Application { tag, len } => encode_with_meta(w, tag as u8, false, len),
            Tag::Context { tag_num, len } => encode_with_meta(w, tag_num, true, len),
            Tag::Opening { tag_num } => encode_open_close(w, tag_num, LVT_OPENING),
            Tag::Closing { tag_num } => encode_open_close(w, tag_num, LVT_CLOSING),
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let start = r.position();
        let first = r.read_u8()?;
        let class_context = (first & CLASS_CONTEXT) != 0;

        let mut tag_num = first >> 4;
        if tag_num == EXTENDED_TAG {
            tag_num = r.read_u8()?;
            // the extended form is only legal for numbers that do not fit the nibble
            if tag_num < EXTENDED_TAG {
                return Err(DecodeError::InvalidTag { offset: start });
            }
        }

        let lvt = first & 0x07;
        if class_context {
            match lvt {
                LVT_OPENING => return Ok(Tag::Opening { tag_num }),
                LVT_CLOSING => return Ok(Tag::Closing { tag_num }),
                _ => {}
            }
        }

        let tag = if class_context {
            None
        } else {
            Some(AppTag::from_u8(tag_num).ok_or(DecodeError::InvalidTag { offset: start })?)
        };
        if !class_context && lvt > LVT_EXTENDED {
            return Err(DecodeError::InvalidLength { offset: start });
        }

        let len = match tag {
            Some(AppTag::Boolean) => {
                if lvt > 1 {
                    return Err(DecodeError::InvalidTag { offset: start });
                }
                u32::from(lvt)
            }
            _ => decode_len(r, lvt)?,
        };

        Ok(match tag {
            Some(tag) => Tag::Application { tag, len },
            None => Tag::Context { tag_num, len },
        })
    }

    /// Length of the content octets following this header.
    pub const fn content_len(self) -> usize {
        match self {
            Tag::Application {
                tag: AppTag::Boolean,
                ..
            } => 0,
            Tag::Application { len, .. } | Tag::Context { len, .. } => len as usize,
            Tag::Opening { .. } | Tag::Closing { .. } => 0,
        }
    }
}

fn first_octet(tag_num: u8, is_context: bool, lvt: u8) -> u8 {
    let mut first = if tag_num < EXTENDED_TAG {
        tag_num << 4
    } else {
        EXTENDED_TAG << 4
    };
    if is_context {
        first |= CLASS_CONTEXT;
    }
    first | lvt
}

fn encode_with_meta(
    w: &mut Writer<'_>,
    tag_num: u8,
    is_context: bool,
    len: u32,
) -> Result<(), EncodeError> {
    let lvt = if len <= 4 { len as u8 } else { LVT_EXTENDED };
    w.write_u8(first_octet(tag_num, is_context, lvt))?;

    if tag_num >= EXTENDED_TAG {
        w.write_u8(tag_num)?;
    }

    if lvt == LVT_EXTENDED {
        if len <= 253 {
            w.write_u8(len as u8)?;
        } else if len <= 65535 {
            w.write_u8(254)?;
            w.write_be_u16(len as u16)?;
        } else {
            w.write_u8(255)?;
            w.write_be_u32(len)?;
        }
    }

    Ok(())
}

fn encode_open_close(w: &mut Writer<'_>, tag_num: u8, lvt: u8) -> Result<(), EncodeError> {
    w.write_u8(first_octet(tag_num, true, lvt))?;
    if tag_num >= EXTENDED_TAG {
        w.write_u8(tag_num)?;
    }
    Ok(())
}

fn decode_len(r: &mut Reader<'_>, lvt: u8) -> Result<u32, DecodeError> {
    match lvt {
        0..=4 => Ok(u32::from(lvt)),
        LVT_EXTENDED => match r.read_u8()? {
            v @ 0..=253 => Ok(u32::from(v)),
            254 => Ok(u32::from(r.read_be_u16()?)),
            _ => r.read_be_u32(),
        },
        _ => Err(DecodeError::InvalidLength {
            offset: r.position(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{AppTag, Tag};
    use crate::encoding::{reader::Reader, writer::Writer};
    use crate::DecodeError;

    fn encode(tag: Tag) -> ([u8; 8], usize) {
        let mut buf = [0u8; 8];
        let mut w = Writer::new(&mut buf);
        tag.encode(&mut w).unwrap();
        let len = w.position();
        (buf, len)
    }

    #[test]
    fn application_unsigned_header() {
        let (buf, len) = encode(Tag::Application {
            tag: AppTag::UnsignedInt,
            len: 3,
        });
        assert_eq!(&buf[..len], &[0x23]);
        let mut r = Reader::new(&buf[..len]);
        assert_eq!(
            Tag::decode(&mut r).unwrap(),
            Tag::Application {
                tag: AppTag::UnsignedInt,
                len: 3
            }
        );
    }

    #[test]
    fn extended_number_and_length() {
        let (buf, len) = encode(Tag::Context {
            tag_num: 30,
            len: 300,
        });
        assert_eq!(&buf[..len], &[0xFD, 30, 254, 0x01, 0x2C]);
        let mut r = Reader::new(&buf[..len]);
        assert_eq!(
            Tag::decode(&mut r).unwrap(),
            Tag::Context {
                tag_num: 30,
                len: 300
            }
        );
    }

    #[test]
    fn tag_fifteen_uses_extended_form() {
        let (buf, len) = encode(Tag::Opening { tag_num: 15 });
        assert_eq!(&buf[..len], &[0xFE, 15]);
    }

    #[test]
    fn reserved_application_tags_are_invalid() {
        let mut r = Reader::new(&[0xD1, 0x00]);
        assert_eq!(
            Tag::decode(&mut r).unwrap_err(),
            DecodeError::InvalidTag { offset: 0 }
        );
    }

    #[test]
    fn application_class_cannot_open() {
        let mut r = Reader::new(&[0x26]);
        assert_eq!(
            Tag::decode(&mut r).unwrap_err(),
            DecodeError::InvalidLength { offset: 0 }
        );
    }

    #[test]
    fn redundant_extended_number_is_invalid() {
        let mut r = Reader::new(&[0xF9, 0x02, 0x00]);
        assert!(matches!(
            Tag::decode(&mut r),
            Err(DecodeError::InvalidTag { offset: 0 })
        ));
    }

    #[test]
    fn truncated_extended_length() {
        let mut r = Reader::new(&[0x65, 254, 0x01]);
        assert!(matches!(
            Tag::decode(&mut r),
            Err(DecodeError::TruncatedInput { .. })
        ));
    }
}
