//! Read, strip and re-write JPEG/EXIF metadata, and carry an Obscura
//! redaction descriptor in a reserved application marker.
//!
//! # Design Principles
//!
//! - **Lazy loading**: TIFF directories are read entry-by-entry; out-of-line
//!   values and sub-IFDs are only read when asked for
//! - **Byte fidelity**: markers this crate does not understand, and the
//!   compressed image data, are written back exactly as read
//! - **Bounded**: every length taken from the file is checked before it is
//!   used to allocate or recurse
//!
//! # Quick Start
//!
//! ```no_run
//! use jpeg_redaction::{tiff::tags, Jpeg};
//!
//! # fn main() -> jpeg_redaction::Result<()> {
//! let mut jpeg = Jpeg::open("photo.jpg")?;
//!
//! if let Some(exif) = jpeg.exif() {
//!     println!("EXIF: {}", exif.exif_info());
//! }
//!
//! // Drop GPS and the thumbnail, then record that we did so
//! if let Some(exif) = jpeg.exif_mut() {
//!     exif.remove_tag(tags::GPS_IFD_POINTER);
//!     exif.remove_thumbnail();
//! }
//! jpeg.set_descriptor(b"redacted-by-v1")?;
//! jpeg.write_to("photo.redacted.jpg")?;
//! # Ok(())
//! # }
//! ```
//!
//! # TIFF Only
//!
//! The TIFF engine works on any seekable stream:
//!
//! ```no_run
//! use jpeg_redaction::tiff::Tiff;
//!
//! # fn main() -> jpeg_redaction::Result<()> {
//! let bytes = std::fs::read("exif.tiff")?;
//! let tiff = Tiff::parse(&bytes)?;
//! for tag in tiff.ifd0().tags() {
//!     println!("{tag}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod byte_order;
mod error;
mod jpeg;
pub mod marker;
pub mod obscura;
mod stream;
pub mod thumbnail;
pub mod tiff;

pub use byte_order::ByteOrder;
pub use error::{Error, Result};
pub use jpeg::{Jpeg, Segment, EXIF_SIGNATURE};
pub use marker::JpegMarker;
pub use obscura::{ObscuraMetadata, MAX_DESCRIPTOR_SIZE, OBSCURA_MARKER};
pub use thumbnail::{EmbeddedThumbnail, ThumbnailFormat};
pub use tiff::{ExifInfo, Tiff, TiffIfd, TiffTag};

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Options controlling how a JPEG is loaded
///
/// The default resolves every EXIF value up front. Use the builder methods
/// to change individual settings.
///
/// # Example
///
/// ```no_run
/// use jpeg_redaction::{Jpeg, LoadOptions};
///
/// # fn main() -> jpeg_redaction::Result<()> {
/// // Only read directory entries; load values later
/// let options = LoadOptions::new().lazy();
/// let mut jpeg = Jpeg::open_with("photo.jpg", options)?;
/// jpeg.load_exif()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Resolve every deferred tag and sub-IFD during load
    pub load_all: bool,

    /// Deepest IFD nesting followed before giving up
    pub max_ifd_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            load_all: true,
            max_ifd_depth: tiff::DEFAULT_MAX_IFD_DEPTH,
        }
    }
}

impl LoadOptions {
    /// Same as `LoadOptions::default()`
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep out-of-line EXIF values pending until requested
    pub fn lazy(mut self) -> Self {
        self.load_all = false;
        self
    }

    pub fn load_all(mut self, load_all: bool) -> Self {
        self.load_all = load_all;
        self
    }

    /// Set the IFD recursion bound
    pub fn max_ifd_depth(mut self, depth: usize) -> Self {
        self.max_ifd_depth = depth;
        self
    }
}
