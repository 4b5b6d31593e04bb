use alloc::vec::Vec;

/// An owned BACnet bit string.
///
/// `unused_bits` counts the padding bits at the end of the last octet, so it
/// is at most 7 and is 0 when there are no octets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitString {
    unused_bits: u8,
    data: Vec<u8>,
}

impl BitString {
    pub fn new(unused_bits: u8, data: Vec<u8>) -> Option<Self> {
        if unused_bits > 7 || (data.is_empty() && unused_bits != 0) {
            return None;
        }
        Some(Self { unused_bits, data })
    }

    /// Packs bits most-significant first, as BACnet transmits them.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut data = alloc::vec![0u8; bits.len().div_ceil(8)];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                data[i / 8] |= 0x80 >> (i % 8);
            }
        }
        let unused_bits = ((8 - bits.len() % 8) % 8) as u8;
        Self { unused_bits, data }
    }

    pub const fn unused_bits(&self) -> u8 {
        self.unused_bits
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len() * 8 - usize::from(self.unused_bits)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, bit: usize) -> Option<bool> {
        if bit >= self.len() {
            return None;
        }
        Some(self.data[bit / 8] & (0x80 >> (bit % 8)) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::BitString;
    use alloc::vec;

    #[test]
    fn status_flags_layout() {
        let flags = BitString::from_bits(&[false, true, false, false]);
        assert_eq!(flags.data(), &[0x40]);
        assert_eq!(flags.unused_bits(), 4);
        assert_eq!(flags.len(), 4);
        assert_eq!(flags.get(1), Some(true));
        assert_eq!(flags.get(4), None);
    }

    #[test]
    fn rejects_bad_padding() {
        assert!(BitString::new(8, vec![0]).is_none());
        assert!(BitString::new(1, vec![]).is_none());
        assert!(BitString::new(0, vec![]).is_some());
    }
}
