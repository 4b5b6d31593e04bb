use crate::DecodeError;

/// Cursor over an input slice. Errors report the reader's position at the
/// point of failure.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Starts reading `buf` at `pos`; offsets stay relative to `buf`.
    pub const fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn rest(&self) -> &'a [u8] {
        self.buf.get(self.pos..).unwrap_or(&[])
    }

    pub fn truncated(&self) -> DecodeError {
        DecodeError::TruncatedInput { offset: self.pos }
    }

    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.buf.get(self.pos).copied().ok_or(self.truncated())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Borrows the next `len` bytes. The length is checked against the
    /// remaining input before anything is sliced.
    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(self.truncated());
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.read_exact(len).map(|_| ())
    }

    /// Copies the next `N` bytes out of the input.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    pub fn read_be_u16(&mut self) -> Result<u16, DecodeError> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_be_u32(&mut self) -> Result<u32, DecodeError> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Reads a 1..=4 octet big-endian integer, the inverse of
    /// `Writer::write_be_low`.
    pub fn read_be_low(&mut self, len: usize) -> Result<u32, DecodeError> {
        if !(1..=4).contains(&len) {
            return Err(DecodeError::InvalidLength { offset: self.pos });
        }
        let bytes = self.read_exact(len)?;
        Ok(bytes.iter().fold(0, |acc, b| (acc << 8) | u32::from(*b)))
    }
}

#[cfg(test)]
mod tests {
    use super::Reader;
    use crate::DecodeError;

    #[test]
    fn reader_reads_values() {
        let mut r = Reader::new(&[1, 2, 3, 4, 5]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_exact(2).unwrap(), &[2, 3]);
        assert_eq!(r.remaining(), 2);
        assert_eq!(r.rest(), &[4, 5]);
    }

    #[test]
    fn errors_carry_position() {
        let mut r = Reader::new(&[1, 2]);
        r.read_u8().unwrap();
        assert_eq!(
            r.read_be_u16().unwrap_err(),
            DecodeError::TruncatedInput { offset: 1 }
        );
        // a failed read leaves the cursor alone
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn low_octet_integers() {
        let mut r = Reader::new(&[0x01, 0x00, 0xFF, 0x12]);
        assert_eq!(r.read_be_low(3).unwrap(), 0x01_00FF);
        assert_eq!(
            r.read_be_low(5).unwrap_err(),
            DecodeError::InvalidLength { offset: 3 }
        );
        assert_eq!(r.read_array::<1>().unwrap(), [0x12]);
    }

    #[test]
    fn oversized_length_is_rejected_before_slicing() {
        let mut r = Reader::at(&[0; 4], 2);
        assert!(r.read_exact(usize::MAX).is_err());
        assert_eq!(r.remaining(), 2);
    }
}
