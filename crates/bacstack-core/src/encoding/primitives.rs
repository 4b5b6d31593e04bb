use crate::encoding::{
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::{DecodeError, EncodeError};
use alloc::string::String;

/// Character set code for UTF-8 (historically "ANSI X3.4").
pub const CHARSET_UTF8: u8 = 0;
/// Character set code for ISO 8859-1.
pub const CHARSET_ISO_8859_1: u8 = 5;

const fn unsigned_len(value: u32) -> usize {
    if value <= 0xFF {
        1
    } else if value <= 0xFFFF {
        2
    } else if value <= 0xFF_FFFF {
        3
    } else {
        4
    }
}

const fn signed_len(value: i32) -> usize {
    if value >= -128 && value <= 127 {
        1
    } else if value >= -32_768 && value <= 32_767 {
        2
    } else if value >= -8_388_608 && value <= 8_388_607 {
        3
    } else {
        4
    }
}

pub fn encode_unsigned(w: &mut Writer<'_>, value: u32) -> Result<usize, EncodeError> {
    let len = unsigned_len(value);
    w.write_be_low(value, len)?;
    Ok(len)
}

pub fn decode_unsigned(r: &mut Reader<'_>, len: usize) -> Result<u32, DecodeError> {
    r.read_be_low(len)
}

pub fn encode_signed(w: &mut Writer<'_>, value: i32) -> Result<usize, EncodeError> {
    let len = signed_len(value);
    w.write_be_low(value as u32, len)?;
    Ok(len)
}

pub fn decode_signed(r: &mut Reader<'_>, len: usize) -> Result<i32, DecodeError> {
    if len == 0 || len > 4 {
        return Err(DecodeError::InvalidLength {
            offset: r.position(),
        });
    }
    let bytes = r.read_exact(len)?;
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut out = [fill; 4];
    out[4 - len..].copy_from_slice(bytes);
    Ok(i32::from_be_bytes(out))
}

/// Decodes the content octets of a character string (charset octet first).
pub fn decode_character_string(r: &mut Reader<'_>, len: usize) -> Result<String, DecodeError> {
    let start = r.position();
    if len == 0 {
        return Err(DecodeError::InvalidLength { offset: start });
    }
    let raw = r.read_exact(len)?;
    match raw[0] {
        CHARSET_UTF8 => core::str::from_utf8(&raw[1..])
            .map(String::from)
            .map_err(|_| DecodeError::InvalidTag { offset: start }),
        CHARSET_ISO_8859_1 => Ok(raw[1..].iter().map(|b| char::from(*b)).collect()),
        _ => Err(DecodeError::InvalidTag { offset: start }),
    }
}

fn encode_tagged_unsigned(w: &mut Writer<'_>, header: Tag, value: u32) -> Result<(), EncodeError> {
    header.encode(w)?;
    encode_unsigned(w, value).map(|_| ())
}

pub fn encode_app_unsigned(w: &mut Writer<'_>, value: u32) -> Result<(), EncodeError> {
    let len = unsigned_len(value) as u32;
    encode_tagged_unsigned(
        w,
        Tag::Application {
            tag: AppTag::UnsignedInt,
            len,
        },
        value,
    )
}

pub fn encode_app_enumerated(w: &mut Writer<'_>, value: u32) -> Result<(), EncodeError> {
    let len = unsigned_len(value) as u32;
    encode_tagged_unsigned(
        w,
        Tag::Application {
            tag: AppTag::Enumerated,
            len,
        },
        value,
    )
}

pub fn encode_app_signed(w: &mut Writer<'_>, value: i32) -> Result<(), EncodeError> {
    Tag::Application {
        tag: AppTag::SignedInt,
        len: signed_len(value) as u32,
    }
    .encode(w)?;
    encode_signed(w, value).map(|_| ())
}

pub fn encode_app_object_id(w: &mut Writer<'_>, object_id_raw: u32) -> Result<(), EncodeError> {
    Tag::Application {
        tag: AppTag::ObjectId,
        len: 4,
    }
    .encode(w)?;
    w.write_be_u32(object_id_raw)
}

pub fn encode_app_real(w: &mut Writer<'_>, value: f32) -> Result<(), EncodeError> {
    Tag::Application {
        tag: AppTag::Real,
        len: 4,
    }
    .encode(w)?;
    w.write_f32(value)
}

pub fn encode_ctx_unsigned(w: &mut Writer<'_>, tag_num: u8, value: u32) -> Result<(), EncodeError> {
    let len = unsigned_len(value) as u32;
    encode_tagged_unsigned(w, Tag::Context { tag_num, len }, value)
}

/// Context-tagged enumerations share the unsigned content encoding.
pub fn encode_ctx_enumerated(w: &mut Writer<'_>, tag_num: u8, value: u32) -> Result<(), EncodeError> {
    encode_ctx_unsigned(w, tag_num, value)
}

pub fn encode_ctx_boolean(w: &mut Writer<'_>, tag_num: u8, value: bool) -> Result<(), EncodeError> {
    Tag::Context { tag_num, len: 1 }.encode(w)?;
    w.write_u8(u8::from(value))
}

pub fn encode_ctx_object_id(
    w: &mut Writer<'_>,
    tag_num: u8,
    object_id_raw: u32,
) -> Result<(), EncodeError> {
    Tag::Context { tag_num, len: 4 }.encode(w)?;
    w.write_be_u32(object_id_raw)
}

pub fn encode_ctx_character_string(
    w: &mut Writer<'_>,
    tag_num: u8,
    value: &str,
) -> Result<(), EncodeError> {
    let bytes = value.as_bytes();
    let len = u32::try_from(bytes.len() + 1).map_err(|_| EncodeError::InvalidLength)?;
    Tag::Context { tag_num, len }.encode(w)?;
    w.write_u8(CHARSET_UTF8)?;
    w.write_all(bytes)
}

pub fn encode_opening_tag(w: &mut Writer<'_>, tag_num: u8) -> Result<(), EncodeError> {
    Tag::Opening { tag_num }.encode(w)
}

pub fn encode_closing_tag(w: &mut Writer<'_>, tag_num: u8) -> Result<(), EncodeError> {
    Tag::Closing { tag_num }.encode(w)
}

/// Reads the next tag without consuming it.
pub fn peek_tag(r: &Reader<'_>) -> Result<Option<Tag>, DecodeError> {
    if r.is_empty() {
        return Ok(None);
    }
    let mut probe = *r;
    Tag::decode(&mut probe).map(Some)
}

pub fn is_context_tag(r: &Reader<'_>, tag_num: u8) -> Result<bool, DecodeError> {
    Ok(matches!(peek_tag(r)?, Some(Tag::Context { tag_num: n, .. }) if n == tag_num))
}

pub fn is_opening_tag(r: &Reader<'_>, tag_num: u8) -> Result<bool, DecodeError> {
    Ok(peek_tag(r)? == Some(Tag::Opening { tag_num }))
}

pub fn is_closing_tag(r: &Reader<'_>, tag_num: u8) -> Result<bool, DecodeError> {
    Ok(peek_tag(r)? == Some(Tag::Closing { tag_num }))
}

pub fn expect_opening_tag(r: &mut Reader<'_>, tag_num: u8) -> Result<(), DecodeError> {
    let start = r.position();
    match Tag::decode(r)? {
        Tag::Opening { tag_num: n } if n == tag_num => Ok(()),
        _ => Err(DecodeError::InvalidTag { offset: start }),
    }
}

pub fn expect_closing_tag(r: &mut Reader<'_>, tag_num: u8) -> Result<(), DecodeError> {
    let start = r.position();
    match Tag::decode(r)? {
        Tag::Closing { tag_num: n } if n == tag_num => Ok(()),
        _ => Err(DecodeError::InvalidTag { offset: start }),
    }
}

/// Consumes a context tag with the given number and returns its content length.
fn expect_context(r: &mut Reader<'_>, tag_num: u8) -> Result<usize, DecodeError> {
    let start = r.position();
    match Tag::decode(r)? {
        Tag::Context { tag_num: n, len } if n == tag_num => Ok(len as usize),
        _ => Err(DecodeError::InvalidTag { offset: start }),
    }
}

pub fn decode_ctx_unsigned(r: &mut Reader<'_>, tag_num: u8) -> Result<u32, DecodeError> {
    let len = expect_context(r, tag_num)?;
    decode_unsigned(r, len)
}

pub fn decode_ctx_enumerated(r: &mut Reader<'_>, tag_num: u8) -> Result<u32, DecodeError> {
    decode_ctx_unsigned(r, tag_num)
}

pub fn decode_ctx_boolean(r: &mut Reader<'_>, tag_num: u8) -> Result<bool, DecodeError> {
    let len = expect_context(r, tag_num)?;
    if len != 1 {
        return Err(DecodeError::InvalidLength {
            offset: r.position(),
        });
    }
    let at = r.position();
    match r.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::InvalidTag { offset: at }),
    }
}

pub fn decode_ctx_object_id(r: &mut Reader<'_>, tag_num: u8) -> Result<u32, DecodeError> {
    let len = expect_context(r, tag_num)?;
    if len != 4 {
        return Err(DecodeError::InvalidLength {
            offset: r.position(),
        });
    }
    r.read_be_u32()
}

pub fn decode_ctx_character_string(r: &mut Reader<'_>, tag_num: u8) -> Result<String, DecodeError> {
    let len = expect_context(r, tag_num)?;
    decode_character_string(r, len)
}

pub fn decode_optional_ctx_unsigned(
    r: &mut Reader<'_>,
    tag_num: u8,
) -> Result<Option<u32>, DecodeError> {
    if is_context_tag(r, tag_num)? {
        decode_ctx_unsigned(r, tag_num).map(Some)
    } else {
        Ok(None)
    }
}

pub fn decode_app_unsigned(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    let start = r.position();
    match Tag::decode(r)? {
        Tag::Application {
            tag: AppTag::UnsignedInt,
            len,
        } => decode_unsigned(r, len as usize),
        _ => Err(DecodeError::InvalidTag { offset: start }),
    }
}

pub fn decode_app_enumerated(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    let start = r.position();
    match Tag::decode(r)? {
        Tag::Application {
            tag: AppTag::Enumerated,
            len,
        } => decode_unsigned(r, len as usize),
        _ => Err(DecodeError::InvalidTag { offset: start }),
    }
}

pub fn decode_app_object_id(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    let start = r.position();
    match Tag::decode(r)? {
        Tag::Application {
            tag: AppTag::ObjectId,
            len: 4,
        } => r.read_be_u32(),
        Tag::Application {
            tag: AppTag::ObjectId,
            ..
        } => Err(DecodeError::InvalidLength { offset: start }),
        _ => Err(DecodeError::InvalidTag { offset: start }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn written(f: impl FnOnce(&mut Writer<'_>)) -> alloc::vec::Vec<u8> {
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        f(&mut w);
        w.as_written().to_vec()
    }

    proptest! {
        #[test]
        fn unsigned_roundtrip(v in any::<u32>()) {
            let bytes = written(|w| { encode_unsigned(w, v).unwrap(); });
            let mut r = Reader::new(&bytes);
            prop_assert_eq!(decode_unsigned(&mut r, bytes.len()).unwrap(), v);
        }

        #[test]
        fn signed_roundtrip(v in any::<i32>()) {
            let bytes = written(|w| { encode_signed(w, v).unwrap(); });
            let mut r = Reader::new(&bytes);
            prop_assert_eq!(decode_signed(&mut r, bytes.len()).unwrap(), v);
        }
    }

    #[test]
    fn shortest_integer_forms() {
        assert_eq!(written(|w| { encode_unsigned(w, 0).unwrap(); }), [0]);
        assert_eq!(written(|w| { encode_unsigned(w, 256).unwrap(); }), [1, 0]);
        assert_eq!(written(|w| { encode_signed(w, -1).unwrap(); }), [0xFF]);
        assert_eq!(written(|w| { encode_signed(w, 128).unwrap(); }), [0x00, 0x80]);
    }

    #[test]
    fn five_byte_unsigned_is_invalid_length() {
        let mut r = Reader::new(&[0; 5]);
        assert_eq!(
            decode_unsigned(&mut r, 5).unwrap_err(),
            DecodeError::InvalidLength { offset: 0 }
        );
    }

    #[test]
    fn character_string_charsets() {
        let mut r = Reader::new(&[0, b'h', b'i']);
        assert_eq!(decode_character_string(&mut r, 3).unwrap(), "hi");

        let mut r = Reader::new(&[5, 0xE9]);
        assert_eq!(decode_character_string(&mut r, 2).unwrap(), "\u{e9}");

        let mut r = Reader::new(&[4, 0x00, 0x41]);
        assert!(matches!(
            decode_character_string(&mut r, 3),
            Err(DecodeError::InvalidTag { offset: 0 })
        ));

        let mut r = Reader::new(&[0, 0xFF]);
        assert!(matches!(
            decode_character_string(&mut r, 2),
            Err(DecodeError::InvalidTag { .. })
        ));
    }

    #[test]
    fn optional_context_absent() {
        let bytes = written(|w| encode_ctx_unsigned(w, 3, 7).unwrap());
        let mut r = Reader::new(&bytes);
        assert_eq!(decode_optional_ctx_unsigned(&mut r, 2).unwrap(), None);
        assert_eq!(decode_optional_ctx_unsigned(&mut r, 3).unwrap(), Some(7));
        assert!(r.is_empty());
    }

    #[test]
    fn context_boolean_roundtrip() {
        let bytes = written(|w| encode_ctx_boolean(w, 1, true).unwrap());
        assert_eq!(bytes, [0x19, 0x01]);
        let mut r = Reader::new(&bytes);
        assert!(decode_ctx_boolean(&mut r, 1).unwrap());
    }
}
