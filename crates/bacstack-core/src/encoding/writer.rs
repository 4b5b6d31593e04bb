use crate::EncodeError;

/// Appends to a caller-owned buffer and fails instead of growing it.
///
/// [`encode_to_vec`](super::encode_to_vec) retries with a larger buffer on
/// [`EncodeError::BufferTooSmall`].
#[derive(Debug)]
pub struct Writer<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    pub const fn position(&self) -> usize {
        self.len
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    pub fn as_written(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Claims the next `n` octets. Nothing is claimed on failure.
    fn reserve(&mut self, n: usize) -> Result<&mut [u8], EncodeError> {
        if n > self.remaining() {
            return Err(EncodeError::BufferTooSmall);
        }
        let start = self.len;
        self.len += n;
        Ok(&mut self.buf[start..self.len])
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), EncodeError> {
        self.reserve(1)?[0] = value;
        Ok(())
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        self.reserve(data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn write_be_u16(&mut self, value: u16) -> Result<(), EncodeError> {
        self.write_all(&value.to_be_bytes())
    }

    pub fn write_be_u32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.write_all(&value.to_be_bytes())
    }

    /// Writes the low `len` octets of `value`, most significant first, as
    /// BACnet's variable-length integers require. `len` must be 1..=4.
    pub fn write_be_low(&mut self, value: u32, len: usize) -> Result<(), EncodeError> {
        if !(1..=4).contains(&len) {
            return Err(EncodeError::ValueOutOfRange);
        }
        self.write_all(&value.to_be_bytes()[4 - len..])
    }

    /// IEEE-754 single precision, big-endian.
    pub fn write_f32(&mut self, value: f32) -> Result<(), EncodeError> {
        self.write_be_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), EncodeError> {
        self.write_all(&value.to_bits().to_be_bytes())
    }
}
