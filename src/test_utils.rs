//! Synthetic fixtures for tests, fuzzing and demos.
//!
//! Everything here builds byte streams in code, so the test suite needs no
//! binary fixture files.
//!
//! # Usage
//!
//! ```
//! use jpeg_redaction::{test_utils::*, ByteOrder, Jpeg, LoadOptions};
//! use std::io::Cursor;
//!
//! # fn example() -> jpeg_redaction::Result<()> {
//! let data = build_jpeg(&[exif_segment(&sample_exif_tiff(ByteOrder::BigEndian))]);
//! let jpeg = Jpeg::from_reader(&mut Cursor::new(data), LoadOptions::default())?;
//! assert!(jpeg.exif().is_some());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::{byte_order::ByteOrder, marker::stuff};

/// Big-endian TIFF with one IFD holding Make = "ACME"
pub const ACME_TIFF: [u8; 31] = [
    b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, // header, IFD0 at 8
    0x00, 0x01, // one entry
    0x01, 0x0F, 0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x1A, // Make, ASCII x5 @26
    0x00, 0x00, 0x00, 0x00, // no next IFD
    b'A', b'C', b'M', b'E', 0x00,
];

/// Thumbnail bytes referenced from IFD1 of [`sample_exif_tiff`]
pub const SAMPLE_THUMBNAIL: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

/// Quantization table segment placed after the caller's segments
const DQT_SEGMENT: [u8; 9] = [0xFF, 0xDB, 0x00, 0x07, 0x00, 0x01, 0x02, 0x03, 0x04];

/// SOS header, entropy-coded bytes (with a stuffed 0xFF and a restart
/// marker) and EOI
const SCAN: [u8; 20] = [
    0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, // SOS
    0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0x56, 0x78, // data, RST0
    0xFF, 0xD9, // EOI
];

struct TiffWriter {
    order: ByteOrder,
    buf: Vec<u8>,
}

impl TiffWriter {
    // Writes into a Vec cannot fail
    fn u16(&mut self, value: u16) {
        let _ = self.order.write_u16_to(&mut self.buf, value);
    }

    fn u32(&mut self, value: u32) {
        let _ = self.order.write_u32_to(&mut self.buf, value);
    }

    /// SHORT entry holding one value
    fn short_entry(&mut self, id: u16, value: u16) {
        self.u16(id);
        self.u16(3);
        self.u32(1);
        self.u16(value);
        self.u16(0);
    }

    fn entry(&mut self, id: u16, field_type: u16, count: u32, value: u32) {
        self.u16(id);
        self.u16(field_type);
        self.u32(count);
        self.u32(value);
    }

    /// Entry whose value slot holds raw bytes, left-aligned
    fn inline_entry(&mut self, id: u16, field_type: u16, count: u32, value: [u8; 4]) {
        self.u16(id);
        self.u16(field_type);
        self.u32(count);
        self.buf.extend_from_slice(&value);
    }

    fn at(&self, offset: usize) {
        debug_assert_eq!(self.buf.len(), offset, "fixture layout is off");
    }
}

/// A TIFF stream shaped like camera EXIF
///
/// - IFD0 @8: Make "Canon" @62, Orientation 1, EXIF pointer @68, GPS pointer @126
/// - EXIF @68: ExposureTime 1/125 @98, DateTimeOriginal @106
/// - GPS @126: GPSVersionID 2.2.0.0, GPSLatitudeRef "N"
/// - IFD1 @156: Compression 6, JPEG thumbnail @198 (4 bytes)
pub fn sample_exif_tiff(order: ByteOrder) -> Vec<u8> {
    let mut w = TiffWriter {
        order,
        buf: Vec::new(),
    };
    w.buf.extend_from_slice(&order.marker());
    w.u16(42);
    w.u32(8);

    w.at(8);
    w.u16(4);
    w.entry(0x010F, 2, 6, 62);
    w.short_entry(0x0112, 1);
    w.entry(0x8769, 4, 1, 68);
    w.entry(0x8825, 4, 1, 126);
    w.u32(156);
    w.at(62);
    w.buf.extend_from_slice(b"Canon\0");

    w.at(68);
    w.u16(2);
    w.entry(0x829A, 5, 1, 98);
    w.entry(0x9003, 2, 20, 106);
    w.u32(0);
    w.at(98);
    w.u32(1);
    w.u32(125);
    w.buf.extend_from_slice(b"2012:08:23 10:00:00\0");

    w.at(126);
    w.u16(2);
    w.inline_entry(0x0000, 1, 4, [2, 2, 0, 0]);
    w.inline_entry(0x0001, 2, 2, [b'N', 0, 0, 0]);
    w.u32(0);

    w.at(156);
    w.u16(3);
    w.short_entry(0x0103, 6);
    w.entry(0x0201, 4, 1, 198);
    w.entry(0x0202, 4, 1, SAMPLE_THUMBNAIL.len() as u32);
    w.u32(0);
    w.at(198);
    w.buf.extend_from_slice(&SAMPLE_THUMBNAIL);
    w.buf
}

/// A marker segment with a raw payload (`code` is the byte after 0xFF)
pub fn app_segment(code: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, code];
    out.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// An APP1 EXIF segment wrapping a TIFF stream
pub fn exif_segment(tiff: &[u8]) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(tiff);
    app_segment(0xE1, &payload)
}

/// A stuffed APP7 Obscura segment
pub fn obscura_segment(type_tag: &[u8], data: &[u8]) -> Vec<u8> {
    let mut payload = type_tag.to_vec();
    payload.push(0);
    payload.extend_from_slice(data);
    app_segment(0xE7, &stuff(&payload))
}

/// SOI, the given segments, a DQT, then scan data through EOI
pub fn build_jpeg(segments: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    for segment in segments {
        out.extend_from_slice(segment);
    }
    out.extend_from_slice(&DQT_SEGMENT);
    out.extend_from_slice(&SCAN);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_layout() {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let data = sample_exif_tiff(order);
            assert_eq!(data.len(), 202);
            assert_eq!(&data[62..68], b"Canon\0");
        }
    }

    #[test]
    fn test_obscura_segment_is_stuffed() {
        let segment = obscura_segment(b"DESCRIPTOR", &[0xFF]);
        assert_eq!(segment[2..4], [0x00, 0x0F]);
        assert_eq!(&segment[segment.len() - 2..], &[0xFF, 0x00]);
    }
}
