//! TIFF/EXIF tag IDs and field types

use crate::error::{Error, Result};

// IFD0 (main image) tags
pub const IMAGE_WIDTH: u16 = 0x0100;
pub const IMAGE_LENGTH: u16 = 0x0101;
pub const COMPRESSION: u16 = 0x0103;
pub const IMAGE_DESCRIPTION: u16 = 0x010E;
pub const MAKE: u16 = 0x010F;
pub const MODEL: u16 = 0x0110;
pub const STRIP_OFFSETS: u16 = 0x0111;
pub const ORIENTATION: u16 = 0x0112;
pub const STRIP_BYTE_COUNTS: u16 = 0x0117;
pub const SOFTWARE: u16 = 0x0131;
pub const DATE_TIME: u16 = 0x0132;
pub const ARTIST: u16 = 0x013B;
pub const COPYRIGHT: u16 = 0x8298;

// Sub-IFD pointers
pub const EXIF_IFD_POINTER: u16 = 0x8769;
pub const GPS_IFD_POINTER: u16 = 0x8825;
pub const INTEROPERABILITY_IFD_POINTER: u16 = 0xA005;

// EXIF sub-IFD tags
pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const MAKER_NOTE: u16 = 0x927C;

// IFD1 (thumbnail) tags
pub const JPEG_INTERCHANGE_FORMAT: u16 = 0x0201;
pub const JPEG_INTERCHANGE_FORMAT_LENGTH: u16 = 0x0202;

/// Tags whose value is always an offset to a nested IFD
pub const SUB_IFD_TAGS: &[u16] = &[
    EXIF_IFD_POINTER,
    GPS_IFD_POINTER,
    INTEROPERABILITY_IFD_POINTER,
];

/// Offset tags that point at raw image bytes, paired with their length tag
pub const IMAGE_DATA_TAGS: &[(u16, u16)] = &[
    (JPEG_INTERCHANGE_FORMAT, JPEG_INTERCHANGE_FORMAT_LENGTH),
    (STRIP_OFFSETS, STRIP_BYTE_COUNTS),
];

/// Check whether a tag ID designates a nested IFD
pub fn is_sub_ifd(tag: u16) -> bool {
    SUB_IFD_TAGS.contains(&tag)
}

/// TIFF field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Ifd,
}

impl FieldType {
    /// Decode the on-disk type code
    pub fn from_code(tag: u16, code: u16) -> Result<Self> {
        Ok(match code {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            13 => Self::Ifd,
            _ => {
                return Err(Error::MalformedTag {
                    tag,
                    reason: format!("unknown field type {code}"),
                })
            }
        })
    }

    /// The on-disk type code
    pub fn code(self) -> u16 {
        match self {
            Self::Byte => 1,
            Self::Ascii => 2,
            Self::Short => 3,
            Self::Long => 4,
            Self::Rational => 5,
            Self::SByte => 6,
            Self::Undefined => 7,
            Self::SShort => 8,
            Self::SLong => 9,
            Self::SRational => 10,
            Self::Float => 11,
            Self::Double => 12,
            Self::Ifd => 13,
        }
    }

    /// Size in bytes of one element
    pub fn size(self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float | Self::Ifd => 4,
            Self::Rational | Self::SRational | Self::Double => 8,
        }
    }

    /// Width of the unit that byte order applies to
    ///
    /// Rationals are two independent 4-byte integers.
    pub fn swap_width(self) -> usize {
        match self {
            Self::Rational | Self::SRational => 4,
            other => other.size(),
        }
    }
}
