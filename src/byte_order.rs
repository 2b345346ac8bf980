//! Byte order handling for TIFF data
//!
//! TIFF streams declare their byte order in the first two bytes ("II" or
//! "MM"). Header fields are decoded straight from that order; tag data is
//! kept in native order in memory and swapped element-by-element on the way
//! in and out.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Byte order of a TIFF stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// "II" (Intel)
    LittleEndian,
    /// "MM" (Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the machine we run on
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// Parse the two-byte indicator at the start of a TIFF stream
    pub fn from_marker(marker: [u8; 2]) -> Option<Self> {
        match &marker {
            b"II" => Some(ByteOrder::LittleEndian),
            b"MM" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }

    /// The two-byte indicator for this order
    pub fn marker(self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    /// True when data in this order must be swapped to become native
    pub fn needs_swap(self) -> bool {
        self != Self::native()
    }

    pub fn read_u16(self, data: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => LittleEndian::read_u16(data),
            ByteOrder::BigEndian => BigEndian::read_u16(data),
        }
    }

    pub fn read_u32(self, data: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => LittleEndian::read_u32(data),
            ByteOrder::BigEndian => BigEndian::read_u32(data),
        }
    }

    pub(crate) fn read_u16_from<R: Read>(self, source: &mut R) -> std::io::Result<u16> {
        match self {
            ByteOrder::LittleEndian => source.read_u16::<LittleEndian>(),
            ByteOrder::BigEndian => source.read_u16::<BigEndian>(),
        }
    }

    pub(crate) fn read_u32_from<R: Read>(self, source: &mut R) -> std::io::Result<u32> {
        match self {
            ByteOrder::LittleEndian => source.read_u32::<LittleEndian>(),
            ByteOrder::BigEndian => source.read_u32::<BigEndian>(),
        }
    }

    pub(crate) fn write_u16_to<W: Write>(self, sink: &mut W, value: u16) -> std::io::Result<()> {
        match self {
            ByteOrder::LittleEndian => sink.write_u16::<LittleEndian>(value),
            ByteOrder::BigEndian => sink.write_u16::<BigEndian>(value),
        }
    }

    pub(crate) fn write_u32_to<W: Write>(self, sink: &mut W, value: u32) -> std::io::Result<()> {
        match self {
            ByteOrder::LittleEndian => sink.write_u32::<LittleEndian>(value),
            ByteOrder::BigEndian => sink.write_u32::<BigEndian>(value),
        }
    }

    /// Convert `width`-byte elements stored in this order to native order
    pub fn decode(self, data: &mut [u8], width: usize) {
        if self.needs_swap() {
            swap_in_place(data, width);
        }
    }

    /// Convert native `width`-byte elements to this order
    ///
    /// Swapping is its own inverse, so this is the same operation as
    /// [`decode`](Self::decode).
    pub fn encode(self, data: &mut [u8], width: usize) {
        self.decode(data, width);
    }
}

/// Reverse every `width`-byte group of `data` in place
///
/// Widths of 0 or 1 leave the buffer untouched. A trailing group shorter
/// than `width` is left as-is.
pub fn swap_in_place(data: &mut [u8], width: usize) {
    if width <= 1 {
        return;
    }
    for element in data.chunks_exact_mut(width) {
        element.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order() {
        let be = ByteOrder::BigEndian;
        let le = ByteOrder::LittleEndian;

        assert_eq!(be.read_u16(&[0x12, 0x34]), 0x1234);
        assert_eq!(le.read_u16(&[0x34, 0x12]), 0x1234);

        assert_eq!(be.read_u32(&[0x12, 0x34, 0x56, 0x78]), 0x12345678);
        assert_eq!(le.read_u32(&[0x78, 0x56, 0x34, 0x12]), 0x12345678);
    }

    #[test]
    fn test_marker() {
        assert_eq!(ByteOrder::from_marker(*b"II"), Some(ByteOrder::LittleEndian));
        assert_eq!(ByteOrder::from_marker(*b"MM"), Some(ByteOrder::BigEndian));
        assert_eq!(ByteOrder::from_marker(*b"IM"), None);
        assert_eq!(ByteOrder::BigEndian.marker(), *b"MM");
    }

    #[test]
    fn test_swap_is_an_involution() {
        let original: Vec<u8> = (0u8..=255).collect();
        for width in [1usize, 2, 4, 8] {
            let mut data = original.clone();
            swap_in_place(&mut data, width);
            if width > 1 {
                assert_ne!(data, original, "width {width} should change the buffer");
            }
            swap_in_place(&mut data, width);
            assert_eq!(data, original, "width {width}");
        }
    }

    #[test]
    fn test_swap_groups() {
        let mut data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_in_place(&mut data, 2);
        assert_eq!(data, [2, 1, 4, 3, 6, 5, 8, 7]);

        let mut data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_in_place(&mut data, 4);
        assert_eq!(data, [4, 3, 2, 1, 8, 7, 6, 5]);

        let mut data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_in_place(&mut data, 8);
        assert_eq!(data, [8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_decode_matches_std() {
        let value = 0x1234_5678u32;
        let mut be = value.to_be_bytes();
        ByteOrder::BigEndian.decode(&mut be, 4);
        assert_eq!(u32::from_ne_bytes(be), value);

        let mut le = value.to_le_bytes();
        ByteOrder::LittleEndian.decode(&mut le, 4);
        assert_eq!(u32::from_ne_bytes(le), value);
    }
}
