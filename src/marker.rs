//! JPEG marker segments
//!
//! A segment on the wire is `0xFF`, a one-byte code, and for most codes a
//! big-endian length (counting itself) followed by `length - 2` payload
//! bytes. Codes are kept as `0xFF00 | code`.
//!
//! Payloads written by this crate into its own application marker escape
//! every literal `0xFF` with a following `0x00` ("stuffing") so the payload
//! never contains anything that looks like a marker prefix. Other markers are
//! carried as raw wire bytes.

use crate::{
    error::{Error, Result},
    stream::{read_vec, truncated},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

// JPEG markers
pub const SOI: u16 = 0xFFD8; // Start of Image
pub const EOI: u16 = 0xFFD9; // End of Image
pub const SOS: u16 = 0xFFDA; // Start of Scan (image data follows)
pub const APP0: u16 = 0xFFE0; // JFIF
pub const APP1: u16 = 0xFFE1; // EXIF / XMP
pub const APP15: u16 = 0xFFEF;
pub const TEM: u16 = 0xFF01;

// Special markers without length
pub const RST0: u16 = 0xFFD0;
pub const RST7: u16 = 0xFFD7;

/// Largest payload a 2-byte length field can describe
pub const MAX_PAYLOAD_SIZE: usize = 65533;

/// Get human-readable label for a JPEG marker
pub fn marker_label(code: u16) -> &'static str {
    match code {
        0xFFD8 => "SOI",
        0xFFD9 => "EOI",
        0xFFDA => "SOS",
        0xFFDB => "DQT",
        0xFFC0 => "SOF0",
        0xFFC2 => "SOF2",
        0xFFC4 => "DHT",
        0xFFDD => "DRI",
        0xFFFE => "COM",
        0xFFD0..=0xFFD7 => "RST",
        0xFFE0 => "APP0",
        0xFFE1 => "APP1",
        0xFFE2 => "APP2",
        0xFFE7 => "APP7",
        0xFFEB => "APP11",
        0xFFED => "APP13",
        0xFFEE => "APP14",
        0xFFE3..=0xFFEF => "APPn",
        _ => "OTHER",
    }
}

/// True for markers that carry no length or payload
pub fn is_standalone(code: u16) -> bool {
    matches!(code, SOI | EOI | TEM | RST0..=RST7)
}

/// True for APP0 through APP15
pub fn is_app(code: u16) -> bool {
    (APP0..=APP15).contains(&code)
}

/// One marker segment: code plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegMarker {
    code: u16,
    payload: Vec<u8>,
}

impl JpegMarker {
    pub fn new(code: u16, payload: Vec<u8>) -> Self {
        Self { code, payload }
    }

    /// Read a marker whose `0xFF` prefix has already been consumed
    ///
    /// The payload is taken verbatim.
    pub fn read<R: Read + Seek>(source: &mut R) -> Result<Self> {
        let code = read_code(source)?;
        let payload = Self::read_body(code, source)?;
        Ok(Self { code, payload })
    }

    /// Like [`read`](Self::read), but un-stuffs `0xFF 0x00` in the payload
    pub fn read_with_stuff_bytes<R: Read + Seek>(source: &mut R) -> Result<Self> {
        let code = read_code(source)?;
        let payload = unstuff(&Self::read_body(code, source)?);
        Ok(Self { code, payload })
    }

    /// Read the length field and raw payload that follow `code`
    pub(crate) fn read_body<R: Read + Seek>(code: u16, source: &mut R) -> Result<Vec<u8>> {
        if is_standalone(code) {
            return Ok(Vec::new());
        }
        let position = source.stream_position()?;
        let length = source
            .read_u16::<BigEndian>()
            .map_err(|e| truncated(e, position, 2))?;
        if length < 2 {
            return Err(Error::MalformedMarker {
                marker: code,
                reason: format!("length field {length} is smaller than itself"),
            });
        }
        read_vec(source, length as u64 - 2, position + 2)
    }

    /// Write the marker with its payload as-is
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        self.write_payload(sink, &self.payload)
    }

    /// Write the marker, escaping every `0xFF` in the payload
    pub fn write_with_stuff_bytes<W: Write>(&self, sink: &mut W) -> Result<()> {
        self.write_payload(sink, &stuff(&self.payload))
    }

    fn write_payload<W: Write>(&self, sink: &mut W, wire: &[u8]) -> Result<()> {
        sink.write_u16::<BigEndian>(self.code)?;
        if is_standalone(self.code) {
            return Ok(());
        }
        if wire.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::MarkerTooLarge {
                size: wire.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        sink.write_u16::<BigEndian>(wire.len() as u16 + 2)?;
        sink.write_all(wire)?;
        Ok(())
    }

    /// Marker code including the `0xFF` prefix
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn label(&self) -> &'static str {
        marker_label(self.code)
    }
}

fn read_code<R: Read + Seek>(source: &mut R) -> Result<u16> {
    let position = source.stream_position()?;
    let code = source.read_u8().map_err(|e| truncated(e, position, 1))?;
    Ok(0xFF00 | code as u16)
}

/// Escape every `0xFF` as `0xFF 0x00`
pub fn stuff(payload: &[u8]) -> Vec<u8> {
    let extra = payload.iter().filter(|&&b| b == 0xFF).count();
    let mut out = Vec::with_capacity(payload.len() + extra);
    for &byte in payload {
        out.push(byte);
        if byte == 0xFF {
            out.push(0x00);
        }
    }
    out
}

/// Collapse every `0xFF 0x00` back to `0xFF`
///
/// A `0xFF` not followed by `0x00` is kept as-is.
pub fn unstuff(wire: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(wire.len());
    let mut bytes = wire.iter().copied().peekable();
    while let Some(byte) = bytes.next() {
        out.push(byte);
        if byte == 0xFF && bytes.peek() == Some(&0x00) {
            bytes.next();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_stuffing_bijection() {
        let payloads: [&[u8]; 6] = [
            b"",
            b"plain",
            &[0xFF],
            &[0xFF, 0xFF],
            &[0x00, 0xFF, 0x00, 0xFF, 0xFF, 0xD9],
            &[0xFF, 0x00, 0xFF],
        ];
        for payload in payloads {
            let wire = stuff(payload);
            assert!(!wire.windows(2).any(|w| w[0] == 0xFF && w[1] != 0x00));
            assert_eq!(unstuff(&wire), payload);
        }
        assert_eq!(stuff(&[0xFF, 0xFF]), vec![0xFF, 0x00, 0xFF, 0x00]);
    }

    #[test]
    fn test_write_with_stuff_bytes() {
        let marker = JpegMarker::new(0xFFE7, vec![0x01, 0xFF, 0x02]);
        let mut out = Vec::new();
        marker.write_with_stuff_bytes(&mut out).unwrap();
        // length counts the stuffed bytes plus itself
        assert_eq!(out, vec![0xFF, 0xE7, 0x00, 0x06, 0x01, 0xFF, 0x00, 0x02]);

        let back = JpegMarker::read_with_stuff_bytes(&mut Cursor::new(&out[1..])).unwrap();
        assert_eq!(back, marker);
    }

    #[test]
    fn test_raw_read_keeps_bytes() {
        let wire = [0xE1, 0x00, 0x05, 0xFF, 0x00, 0x07];
        let marker = JpegMarker::read(&mut Cursor::new(&wire[..])).unwrap();
        assert_eq!(marker.code(), APP1);
        assert_eq!(marker.payload(), &[0xFF, 0x00, 0x07]);

        let mut out = Vec::new();
        marker.write(&mut out).unwrap();
        assert_eq!(&out[1..], &wire[..]);
    }

    #[test]
    fn test_standalone_markers() {
        let marker = JpegMarker::read(&mut Cursor::new(&[0xD0u8, 0x12, 0x34][..])).unwrap();
        assert_eq!(marker.code(), RST0);
        assert!(marker.payload().is_empty());

        let mut out = Vec::new();
        JpegMarker::new(EOI, Vec::new()).write(&mut out).unwrap();
        assert_eq!(out, vec![0xFF, 0xD9]);
    }

    #[test]
    fn test_marker_too_large() {
        let mut out = Vec::new();
        let fits = JpegMarker::new(APP1, vec![0; MAX_PAYLOAD_SIZE]);
        fits.write(&mut out).unwrap();
        assert_eq!(out.len(), MAX_PAYLOAD_SIZE + 4);

        // fits raw, but not once stuffed
        let stuffed = JpegMarker::new(0xFFE7, vec![0xFF; MAX_PAYLOAD_SIZE]);
        assert!(matches!(
            stuffed.write_with_stuff_bytes(&mut Vec::new()),
            Err(Error::MarkerTooLarge { max: MAX_PAYLOAD_SIZE, .. })
        ));
    }

    #[test]
    fn test_bad_lengths() {
        assert!(matches!(
            JpegMarker::read(&mut Cursor::new(&[0xE1u8, 0x00, 0x01][..])),
            Err(Error::MalformedMarker { marker: APP1, .. })
        ));
        assert!(matches!(
            JpegMarker::read(&mut Cursor::new(&[0xE1u8, 0x00, 0x10, 0x01][..])),
            Err(Error::TruncatedRead { offset: 3, expected: 14 })
        ));
        assert!(matches!(
            JpegMarker::read(&mut Cursor::new(&[0xE1u8, 0x00][..])),
            Err(Error::TruncatedRead { offset: 1, expected: 2 })
        ));
    }

    #[test]
    fn test_labels() {
        assert_eq!(marker_label(SOS), "SOS");
        assert_eq!(marker_label(0xFFE7), "APP7");
        assert!(is_app(0xFFE7));
        assert!(!is_app(SOS));
    }
}
