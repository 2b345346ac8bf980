//! Error types for jpeg-redaction

use std::io;

/// Result type for jpeg-redaction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing JPEG/TIFF metadata
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (read, write or seek failed)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Not a JPEG stream, or the TIFF header is unusable
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The stream ended before a length declared by the format
    #[error("Truncated read at offset {offset}: expected {expected} bytes")]
    TruncatedRead { offset: u64, expected: u64 },

    /// A directory entry with an unusable type or length
    #[error("Malformed tag 0x{tag:04X}: {reason}")]
    MalformedTag { tag: u16, reason: String },

    /// A marker segment with an unusable length
    #[error("Malformed marker 0x{marker:04X}: {reason}")]
    MalformedMarker { marker: u16, reason: String },

    /// IFD nesting too deep, or an IFD offset that loops back on itself
    #[error("IFD recursion limit exceeded at offset {offset} (depth {depth})")]
    RecursionLimitExceeded { offset: u32, depth: usize },

    /// Tried to write a tag whose out-of-line data was never loaded
    #[error("Tag 0x{tag:04X} was never loaded and cannot be written")]
    UnloadedData { tag: u16 },

    /// Descriptor does not fit in one Obscura marker
    #[error("Descriptor too large: {size} bytes (max: {max})")]
    DescriptorTooLarge { size: usize, max: usize },

    /// Marker payload does not fit in the 2-byte length field
    #[error("Marker payload too large: {size} bytes (max: {max})")]
    MarkerTooLarge { size: usize, max: usize },

    /// The sink cannot seek, so pointers cannot be patched
    #[error("Sink does not support seeking")]
    UnsupportedSink,
}
