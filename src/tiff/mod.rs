//! TIFF/EXIF reader and writer
//!
//! TIFF Structure:
//! - Header: byte order (II/MM), magic (0x002A), IFD0 offset
//! - IFD (Image File Directory): tag count, tags (12 bytes each), next IFD offset
//! - Tags: tag ID (2), type (2), count (4), value/offset (4)
//!
//! Every offset is relative to the first byte of the header, which inside a
//! JPEG is the byte right after the `Exif\0\0` signature. Reading is lazy:
//! [`Tiff::read`] decodes directory entries only, and [`Tiff::load_all`]
//! follows the pointers. Writing is two-pass: entries go out with zero
//! placeholders which are patched once the referenced data has been written,
//! so the sink must be seekable.

mod ifd;
mod tag;
pub mod tags;

pub use ifd::{ImageData, TiffIfd, MAX_IFD_TAGS};
pub use tag::{TagValue, TiffTag, MAX_TAG_DATA_LENGTH, TAG_ENTRY_SIZE};

use crate::{
    byte_order::ByteOrder,
    error::{Error, Result},
    stream::{read_array, seek_to},
    thumbnail::{EmbeddedThumbnail, ThumbnailFormat},
};
use std::{
    collections::HashSet,
    io::{Cursor, Read, Seek, SeekFrom, Write},
};

/// TIFF magic number
pub const TIFF_MAGIC: u16 = 42;

/// Size of the TIFF header
pub const TIFF_HEADER_SIZE: u64 = 8;

/// Default bound on IFD nesting while reading
pub const DEFAULT_MAX_IFD_DEPTH: usize = 8;

/// Traversal state shared by one read
///
/// Tracks the offsets of the directories currently being read so that a
/// pointer back into an ancestor, or a chain deeper than `max_depth`, is
/// rejected instead of followed. Every directory is read at most once per
/// parse: a second pointer to an offset already read is rejected too, so
/// repeated sub-IFD entries cannot fan the tree out.
#[derive(Debug)]
pub(crate) struct ReadContext {
    pub(crate) base: u64,
    pub(crate) order: ByteOrder,
    max_depth: usize,
    ancestry: Vec<u32>,
    visited: HashSet<u32>,
}

impl ReadContext {
    pub(crate) fn new(base: u64, order: ByteOrder, max_depth: usize) -> Self {
        Self {
            base,
            order,
            max_depth,
            ancestry: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Seed the visited set with every directory already in `ifd`'s tree
    pub(crate) fn with_tree(mut self, ifd: &TiffIfd) -> Self {
        self.mark_read(ifd);
        self
    }

    fn mark_read(&mut self, ifd: &TiffIfd) {
        self.visited.insert(ifd.offset());
        for sub in ifd.tags().iter().filter_map(TiffTag::sub_ifd) {
            self.mark_read(sub);
        }
        if let Some(next) = ifd.next() {
            self.mark_read(next);
        }
    }

    /// Record that the directory at `offset` is being read from the source
    pub(crate) fn claim(&mut self, offset: u32) -> Result<()> {
        if !self.visited.insert(offset) {
            let depth = self.ancestry.len();
            log::warn!("IFD at offset {offset} is referenced more than once");
            return Err(Error::RecursionLimitExceeded { offset, depth });
        }
        Ok(())
    }

    pub(crate) fn enter(&mut self, offset: u32) -> Result<()> {
        let depth = self.ancestry.len();
        if depth >= self.max_depth || self.ancestry.contains(&offset) {
            log::warn!("Refusing IFD at offset {offset} (depth {depth})");
            return Err(Error::RecursionLimitExceeded { offset, depth });
        }
        self.ancestry.push(offset);
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.ancestry.pop();
    }
}

/// Pad with one zero byte if the write position is odd relative to `base`
///
/// Returns the (absolute) position after padding.
pub(crate) fn align<W: Write + Seek>(sink: &mut W, base: u64) -> Result<u64> {
    let position = sink.stream_position()?;
    let offset = position.checked_sub(base).ok_or_else(|| {
        Error::InvalidFormat(format!("write position {position} is before TIFF start {base}"))
    })?;
    if offset % 2 == 1 {
        sink.write_all(&[0])?;
        return Ok(position + 1);
    }
    Ok(position)
}

/// Convert an absolute write position into a TIFF offset
pub(crate) fn offset_from_base(position: u64, base: u64) -> Result<u32> {
    position
        .checked_sub(base)
        .and_then(|offset| u32::try_from(offset).ok())
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "position {position} is not addressable from TIFF start {base}"
            ))
        })
}

/// A TIFF stream: byte order plus the IFD0 tree
#[derive(Debug, Clone, PartialEq)]
pub struct Tiff {
    byte_order: ByteOrder,
    ifd0: TiffIfd,
    max_depth: usize,
}

impl Tiff {
    /// An empty TIFF with the given byte order
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            ifd0: TiffIfd::new(),
            max_depth: DEFAULT_MAX_IFD_DEPTH,
        }
    }

    /// Read the header and directory structure starting at `base`
    ///
    /// Out-of-line values and sub-IFDs stay pending; call
    /// [`load_all`](Self::load_all) or load tags individually.
    pub fn read<R: Read + Seek>(source: &mut R, base: u64, max_depth: usize) -> Result<Self> {
        seek_to(source, base)?;
        let mut header = [0u8; TIFF_HEADER_SIZE as usize];
        read_array(source, &mut header, base)?;

        let byte_order = ByteOrder::from_marker([header[0], header[1]]).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "bad TIFF byte order indicator {:02X}{:02X}",
                header[0], header[1]
            ))
        })?;
        let magic = byte_order.read_u16(&header[2..4]);
        if magic != TIFF_MAGIC {
            return Err(Error::InvalidFormat(format!("bad TIFF magic {magic}")));
        }
        let ifd0_offset = byte_order.read_u32(&header[4..8]);
        if (ifd0_offset as u64) < TIFF_HEADER_SIZE {
            return Err(Error::InvalidFormat(format!(
                "IFD0 offset {ifd0_offset} overlaps the TIFF header"
            )));
        }
        log::debug!("TIFF header: {byte_order:?}, IFD0 at {ifd0_offset}");

        let mut ctx = ReadContext::new(base, byte_order, max_depth);
        let ifd0 = TiffIfd::read(source, &mut ctx, ifd0_offset)?;
        Ok(Self {
            byte_order,
            ifd0,
            max_depth,
        })
    }

    /// Parse and fully load a TIFF stream held in memory
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut source = Cursor::new(data);
        let mut tiff = Self::read(&mut source, 0, DEFAULT_MAX_IFD_DEPTH)?;
        tiff.load_all(&mut source, 0)?;
        Ok(tiff)
    }

    /// Resolve every pending value in the tree
    pub fn load_all<R: Read + Seek>(&mut self, source: &mut R, base: u64) -> Result<()> {
        let mut ctx =
            ReadContext::new(base, self.byte_order, self.max_depth).with_tree(&self.ifd0);
        self.ifd0.load_all(source, &mut ctx)
    }

    /// Write the TIFF stream at the sink's current position
    ///
    /// Fails with [`Error::UnsupportedSink`] when the sink cannot report its
    /// position, and with [`Error::UnloadedData`] if any value is pending.
    pub fn write<W: Write + Seek>(&self, sink: &mut W) -> Result<()> {
        let base = sink.stream_position().map_err(|_| Error::UnsupportedSink)?;
        let order = self.byte_order;

        sink.write_all(&order.marker())?;
        order.write_u16_to(sink, TIFF_MAGIC)?;
        order.write_u32_to(sink, 0)?;

        let ifd0_offset = self.ifd0.write(sink, base, order)?;

        let end = sink.stream_position()?;
        sink.seek(SeekFrom::Start(base + 4))?;
        order.write_u32_to(sink, ifd0_offset)?;
        sink.seek(SeekFrom::Start(end))?;
        log::debug!("Wrote TIFF stream of {} bytes", end - base);
        Ok(())
    }

    /// Serialize to a new buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut sink = Cursor::new(Vec::new());
        self.write(&mut sink)?;
        Ok(sink.into_inner())
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// The primary image directory
    pub fn ifd0(&self) -> &TiffIfd {
        &self.ifd0
    }

    pub fn ifd0_mut(&mut self) -> &mut TiffIfd {
        &mut self.ifd0
    }

    /// EXIF sub-IFD, once loaded
    pub fn exif_ifd(&self) -> Option<&TiffIfd> {
        self.ifd0.sub_ifd(tags::EXIF_IFD_POINTER)
    }

    /// GPS sub-IFD, once loaded
    pub fn gps_ifd(&self) -> Option<&TiffIfd> {
        self.ifd0.sub_ifd(tags::GPS_IFD_POINTER)
    }

    /// IFD1, the thumbnail directory chained after IFD0
    pub fn thumbnail_ifd(&self) -> Option<&TiffIfd> {
        self.ifd0.next()
    }

    /// True when nothing in the tree is pending
    pub fn is_loaded(&self) -> bool {
        self.ifd0.is_loaded()
    }

    /// First tag with this ID, searching IFD0, its sub-IFDs, then the chain
    pub fn find_tag(&self, id: u16) -> Option<&TiffTag> {
        find_in(&self.ifd0, id)
    }

    /// Remove a tag from every directory, returning how many were removed
    ///
    /// Removing a sub-IFD pointer drops the whole nested directory.
    pub fn remove_tag(&mut self, id: u16) -> usize {
        let removed = self.ifd0.remove_tag_recursive(id);
        log::debug!("Removed {removed} instance(s) of tag 0x{id:04X}");
        removed
    }

    /// Drop IFD1 and with it the embedded thumbnail
    pub fn remove_thumbnail(&mut self) -> bool {
        self.ifd0.take_next().is_some()
    }

    /// The thumbnail stored in IFD1, if present and loaded
    pub fn thumbnail(&self) -> Option<EmbeddedThumbnail> {
        let ifd1 = self.thumbnail_ifd()?;
        let dimension = |id| ifd1.tag(id).and_then(|t| t.uint_value(0));
        let (width, height) = (dimension(tags::IMAGE_WIDTH), dimension(tags::IMAGE_LENGTH));

        let (data, format) = if let Some(jpeg) = ifd1.image_data(tags::JPEG_INTERCHANGE_FORMAT) {
            (jpeg.to_vec()?, ThumbnailFormat::Jpeg)
        } else {
            let strips = ifd1.image_data(tags::STRIP_OFFSETS)?;
            (strips.to_vec()?, ThumbnailFormat::Uncompressed)
        };

        let mut thumbnail = EmbeddedThumbnail::new(data, format);
        thumbnail.width = width;
        thumbnail.height = height;
        Some(thumbnail)
    }

    /// Basic EXIF metadata from IFD0 and the EXIF sub-IFD
    pub fn exif_info(&self) -> ExifInfo {
        let ascii = |ifd: &TiffIfd, id| {
            ifd.tag(id)
                .and_then(TiffTag::string_value)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let ifd0 = &self.ifd0;
        ExifInfo {
            make: ascii(ifd0, tags::MAKE),
            model: ascii(ifd0, tags::MODEL),
            orientation: ifd0
                .tag(tags::ORIENTATION)
                .and_then(|t| t.uint_value(0))
                .and_then(|v| u16::try_from(v).ok()),
            software: ascii(ifd0, tags::SOFTWARE),
            date_time: ascii(ifd0, tags::DATE_TIME),
            date_time_original: self
                .exif_ifd()
                .and_then(|exif| ascii(exif, tags::DATE_TIME_ORIGINAL)),
            artist: ascii(ifd0, tags::ARTIST),
            copyright: ascii(ifd0, tags::COPYRIGHT),
        }
    }
}

fn find_in(ifd: &TiffIfd, id: u16) -> Option<&TiffTag> {
    ifd.tag(id)
        .or_else(|| {
            ifd.tags()
                .iter()
                .filter_map(TiffTag::sub_ifd)
                .find_map(|sub| find_in(sub, id))
        })
        .or_else(|| ifd.next().and_then(|next| find_in(next, id)))
}

/// Basic EXIF metadata extracted from IFD0
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExifInfo {
    /// Camera manufacturer (e.g., "Canon", "Nikon")
    pub make: Option<String>,
    /// Camera model (e.g., "EOS R5", "D850")
    pub model: Option<String>,
    /// Image orientation (1-8, where 1 is normal)
    pub orientation: Option<u16>,
    /// Software used to create/edit the image
    pub software: Option<String>,
    /// Date and time of image creation (format: "YYYY:MM:DD HH:MM:SS")
    pub date_time: Option<String>,
    /// Original capture date/time (from EXIF sub-IFD)
    pub date_time_original: Option<String>,
    /// Artist/photographer name
    pub artist: Option<String>,
    /// Copyright notice
    pub copyright: Option<String>,
}

impl std::fmt::Display for ExifInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref make) = self.make {
            parts.push(make.clone());
        }
        if let Some(ref model) = self.model {
            parts.push(model.clone());
        }
        if let Some(dt) = self.date_time_original.as_ref().or(self.date_time.as_ref()) {
            parts.push(dt.clone());
        }
        if parts.is_empty() {
            write!(f, "(no metadata)")
        } else {
            write!(f, "{}", parts.join(" | "))
        }
    }
}
