//! Embedded thumbnails
//!
//! EXIF stores a small preview in IFD1, chained after the primary image
//! directory. It is either a complete JPEG (JPEGInterchangeFormat) or
//! uncompressed strips (StripOffsets). This crate never decodes it; the bytes
//! are handed out as stored.

/// Format of an embedded thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    /// JPEG thumbnail
    Jpeg,
    /// Uncompressed strip data
    Uncompressed,
}

/// An embedded thumbnail extracted from EXIF
#[derive(Debug, Clone)]
pub struct EmbeddedThumbnail {
    /// Raw thumbnail data (already encoded)
    pub data: Vec<u8>,

    /// Format of the thumbnail
    pub format: ThumbnailFormat,

    /// Width in pixels (if known)
    pub width: Option<u32>,

    /// Height in pixels (if known)
    pub height: Option<u32>,
}

impl EmbeddedThumbnail {
    /// Create a new embedded thumbnail
    pub fn new(data: Vec<u8>, format: ThumbnailFormat) -> Self {
        Self {
            data,
            format,
            width: None,
            height: None,
        }
    }
}

