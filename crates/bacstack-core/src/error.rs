use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    BufferTooSmall,
    ValueOutOfRange,
    InvalidLength,
    Message(&'static str),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => f.write_str("buffer too small"),
            Self::ValueOutOfRange => f.write_str("value out of range"),
            Self::InvalidLength => f.write_str("invalid length"),
            Self::Message(msg) => f.write_str(msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

/// A malformed byte sequence.
///
/// Every variant carries the byte offset, relative to the slice handed to the
/// decoder, at which the problem was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeError {
    /// The input ended before a complete value was read.
    TruncatedInput { offset: usize },
    /// A tag was not valid here, or its content is not valid for the tag.
    InvalidTag { offset: usize },
    /// A length field is impossible for the value it describes.
    InvalidLength { offset: usize },
    /// The PDU type or protocol version is not one this codec understands.
    UnsupportedPduType { offset: usize },
    /// A bit that must be zero was set.
    ReservedFieldNonzero { offset: usize },
}

impl DecodeError {
    pub const fn offset(self) -> usize {
        match self {
            Self::TruncatedInput { offset }
            | Self::InvalidTag { offset }
            | Self::InvalidLength { offset }
            | Self::UnsupportedPduType { offset }
            | Self::ReservedFieldNonzero { offset } => offset,
        }
    }

    /// Re-bases the offset when a nested slice was decoded on its own.
    pub const fn shifted(self, base: usize) -> Self {
        match self {
            Self::TruncatedInput { offset } => Self::TruncatedInput {
                offset: offset + base,
            },
            Self::InvalidTag { offset } => Self::InvalidTag {
                offset: offset + base,
            },
            Self::InvalidLength { offset } => Self::InvalidLength {
                offset: offset + base,
            },
            Self::UnsupportedPduType { offset } => Self::UnsupportedPduType {
                offset: offset + base,
            },
            Self::ReservedFieldNonzero { offset } => Self::ReservedFieldNonzero {
                offset: offset + base,
            },
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedInput { offset } => write!(f, "truncated input at offset {offset}"),
            Self::InvalidTag { offset } => write!(f, "invalid tag at offset {offset}"),
            Self::InvalidLength { offset } => write!(f, "invalid length at offset {offset}"),
            Self::UnsupportedPduType { offset } => {
                write!(f, "unsupported pdu type at offset {offset}")
            }
            Self::ReservedFieldNonzero { offset } => {
                write!(f, "reserved field nonzero at offset {offset}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::DecodeError;

    #[test]
    fn shifted_keeps_variant() {
        let e = DecodeError::InvalidTag { offset: 3 }.shifted(10);
        assert_eq!(e, DecodeError::InvalidTag { offset: 13 });
        assert_eq!(e.offset(), 13);
    }
}
