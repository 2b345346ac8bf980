//! JPEG container
//!
//! Scans the marker stream once, pulling out the EXIF (APP1 `Exif\0\0`)
//! payload as a [`Tiff`] and the Obscura (APP7) payload as
//! [`ObscuraMetadata`]. Every other marker is kept as raw bytes, and
//! everything from SOS to the end of the file is kept as one opaque block.

use crate::{
    error::{Error, Result},
    marker::{self, is_app, marker_label, unstuff, JpegMarker, EOI, SOI, SOS},
    obscura::{ObscuraMetadata, OBSCURA_MARKER},
    tiff::Tiff,
    LoadOptions,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor, Read, Seek, Write},
    path::Path,
};

/// Signature that starts an EXIF APP1 payload
pub const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";

/// One element of the file, in file order
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// A marker written back unchanged
    Marker(JpegMarker),
    /// Where the EXIF marker goes
    Exif,
    /// Where the Obscura marker goes
    Obscura,
    /// SOS, entropy-coded data, EOI and anything trailing, verbatim
    ImageData(Vec<u8>),
}

/// A JPEG file held in memory
#[derive(Debug, Clone)]
pub struct Jpeg {
    segments: Vec<Segment>,
    exif: Option<Tiff>,
    /// TIFF bytes of the EXIF marker, kept for deferred loads
    exif_payload: Option<Vec<u8>>,
    obscura: ObscuraMetadata,
}

impl Jpeg {
    /// Open and fully load a file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, LoadOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening {}", path.display());
        let mut reader = BufReader::new(File::open(path)?);
        Self::from_reader(&mut reader, options)
    }

    /// Scan a JPEG stream from its current position
    pub fn from_reader<R: Read + Seek>(source: &mut R, options: LoadOptions) -> Result<Self> {
        // Check SOI marker
        if source.read_u8()? != 0xFF || source.read_u8()? != 0xD8 {
            return Err(Error::InvalidFormat("Not a JPEG file".into()));
        }

        let mut jpeg = Self {
            segments: vec![Segment::Marker(JpegMarker::new(SOI, Vec::new()))],
            exif: None,
            exif_payload: None,
            obscura: ObscuraMetadata::new(),
        };

        loop {
            let offset = source.stream_position()?;
            let prefix = source
                .read_u8()
                .map_err(|e| crate::stream::truncated(e, offset, 1))?;
            if prefix != 0xFF {
                return Err(Error::MalformedMarker {
                    marker: prefix as u16,
                    reason: format!("expected 0xFF at offset {offset}, got 0x{prefix:02X}"),
                });
            }

            // Handle padding bytes
            let mut code = 0xFFFF;
            while code == 0xFFFF {
                let position = source.stream_position()?;
                let byte = source
                    .read_u8()
                    .map_err(|e| crate::stream::truncated(e, position, 1))?;
                code = 0xFF00 | byte as u16;
            }
            log::trace!("{} (0x{code:04X}) at offset {offset}", marker_label(code));

            match code {
                SOS | EOI => {
                    // Image data includes the marker itself, so start two back
                    let mut rest = vec![0xFF, (code & 0xFF) as u8];
                    source.read_to_end(&mut rest)?;
                    log::debug!("Image data: {} bytes from offset {offset}", rest.len());
                    jpeg.segments.push(Segment::ImageData(rest));
                    break;
                }
                OBSCURA_MARKER => jpeg.scan_obscura(source)?,
                marker::APP1 => jpeg.scan_app1(source, options)?,
                _ => {
                    let payload = JpegMarker::read_body(code, source)?;
                    jpeg.segments.push(Segment::Marker(JpegMarker::new(code, payload)));
                }
            }
        }

        Ok(jpeg)
    }

    fn scan_obscura<R: Read + Seek>(&mut self, source: &mut R) -> Result<()> {
        let wire = JpegMarker::read_body(OBSCURA_MARKER, source)?;
        let unstuffed = JpegMarker::new(OBSCURA_MARKER, unstuff(&wire));
        if !self.obscura.import_marker(&unstuffed) {
            // Someone else's APP7: pass it through untouched
            self.segments
                .push(Segment::Marker(JpegMarker::new(OBSCURA_MARKER, wire)));
        } else if !self.segments.contains(&Segment::Obscura) {
            self.segments.push(Segment::Obscura);
        }
        Ok(())
    }

    fn scan_app1<R: Read + Seek>(&mut self, source: &mut R, options: LoadOptions) -> Result<()> {
        let payload = JpegMarker::read_body(marker::APP1, source)?;
        if !payload.starts_with(EXIF_SIGNATURE) || self.exif.is_some() {
            if payload.starts_with(EXIF_SIGNATURE) {
                log::warn!("Ignoring additional EXIF segment");
            }
            self.segments
                .push(Segment::Marker(JpegMarker::new(marker::APP1, payload)));
            return Ok(());
        }

        let tiff_bytes = payload[EXIF_SIGNATURE.len()..].to_vec();
        let mut cursor = Cursor::new(&tiff_bytes[..]);
        let mut tiff = Tiff::read(&mut cursor, 0, options.max_ifd_depth)?;
        if options.load_all {
            tiff.load_all(&mut cursor, 0)?;
        }
        log::debug!("EXIF: {} byte TIFF stream, {} IFD0 tags", tiff_bytes.len(), tiff.ifd0().len());

        self.exif = Some(tiff);
        self.exif_payload = Some(tiff_bytes);
        self.segments.push(Segment::Exif);
        Ok(())
    }

    /// The Obscura descriptor, if present
    pub fn descriptor(&self) -> Option<&[u8]> {
        self.obscura.descriptor()
    }

    /// Set the descriptor written on the next [`write`](Self::write)
    pub fn set_descriptor(&mut self, descriptor: &[u8]) -> Result<()> {
        self.obscura.set_descriptor(descriptor)
    }

    pub fn clear_descriptor(&mut self) {
        self.obscura.clear_descriptor();
    }

    pub fn obscura(&self) -> &ObscuraMetadata {
        &self.obscura
    }

    /// Parsed EXIF data
    pub fn exif(&self) -> Option<&Tiff> {
        self.exif.as_ref()
    }

    pub fn exif_mut(&mut self) -> Option<&mut Tiff> {
        self.exif.as_mut()
    }

    /// Resolve every pending EXIF value (for files opened lazily)
    pub fn load_exif(&mut self) -> Result<()> {
        if let (Some(tiff), Some(payload)) = (&mut self.exif, &self.exif_payload) {
            tiff.load_all(&mut Cursor::new(&payload[..]), 0)?;
        }
        Ok(())
    }

    /// Remove the EXIF segment entirely
    pub fn strip_exif(&mut self) -> bool {
        self.exif_payload = None;
        self.segments.retain(|s| *s != Segment::Exif);
        self.exif.take().is_some()
    }

    /// Segments in file order
    pub fn markers(&self) -> &[Segment] {
        &self.segments
    }

    /// Write the file
    ///
    /// EXIF is re-serialized from the in-memory tree, which must be fully
    /// loaded. A descriptor with no slot in the source goes after the
    /// leading run of APPn markers.
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        let insert_at = if self.segments.contains(&Segment::Obscura) {
            None
        } else {
            Some(self.obscura_insertion_index())
        };

        for (index, segment) in self.segments.iter().enumerate() {
            if insert_at == Some(index) {
                self.obscura.write(sink)?;
            }
            match segment {
                Segment::Marker(marker) => marker.write(sink)?,
                Segment::Exif => self.write_exif(sink)?,
                Segment::Obscura => self.obscura.write(sink)?,
                Segment::ImageData(data) => sink.write_all(data)?,
            }
        }
        if insert_at == Some(self.segments.len()) {
            self.obscura.write(sink)?;
        }
        Ok(())
    }

    fn obscura_insertion_index(&self) -> usize {
        self.segments
            .iter()
            .enumerate()
            .skip(1) // SOI
            .find(|(_, segment)| match segment {
                Segment::Marker(m) => !is_app(m.code()),
                Segment::Exif | Segment::Obscura => false,
                Segment::ImageData(_) => true,
            })
            .map_or(self.segments.len(), |(index, _)| index)
    }

    fn write_exif<W: Write>(&self, sink: &mut W) -> Result<()> {
        let Some(tiff) = &self.exif else {
            return Ok(());
        };
        let mut payload = Cursor::new(EXIF_SIGNATURE.to_vec());
        payload.set_position(EXIF_SIGNATURE.len() as u64);
        tiff.write(&mut payload)?;
        let payload = payload.into_inner();

        if payload.len() > marker::MAX_PAYLOAD_SIZE {
            return Err(Error::MarkerTooLarge {
                size: payload.len(),
                max: marker::MAX_PAYLOAD_SIZE,
            });
        }
        sink.write_u16::<BigEndian>(marker::APP1)?;
        sink.write_u16::<BigEndian>(payload.len() as u16 + 2)?;
        sink.write_all(&payload)?;
        Ok(())
    }

    /// Write to a file, replacing it
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize to a new buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }
}
