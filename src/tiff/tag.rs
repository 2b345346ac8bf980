//! A single TIFF directory entry
//!
//! An entry is a fixed 12-byte record: tag ID (2), field type (2), count (4)
//! and a 4-byte value slot. Values of up to four bytes live in the slot
//! itself; anything larger, and every sub-IFD, is an offset from the start
//! of the TIFF stream. Offset values are read lazily via [`TiffTag::load`].

use super::{
    ifd::TiffIfd,
    offset_from_base,
    tags::{self, FieldType},
    ReadContext, DEFAULT_MAX_IFD_DEPTH,
};
use crate::{
    byte_order::ByteOrder,
    error::{Error, Result},
    stream::{read_array, read_vec, seek_to},
};
use std::fmt;
use std::io::{Read, Seek, Write};

/// Size of one directory entry in bytes
pub const TAG_ENTRY_SIZE: u64 = 12;

/// Largest data block a tag may declare (guards against corrupted counts)
pub const MAX_TAG_DATA_LENGTH: u64 = 100_000_000;

/// The value of a directory entry
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Not read yet: offset of the data or sub-IFD from the TIFF start
    Pending { offset: u32 },
    /// Data bytes in native byte order
    Loaded(Vec<u8>),
    /// A nested directory
    SubIfd(Box<TiffIfd>),
}

/// One TIFF/EXIF tag
#[derive(Debug, Clone, PartialEq)]
pub struct TiffTag {
    id: u16,
    field_type: FieldType,
    count: u32,
    value: TagValue,
}

impl TiffTag {
    /// Create a tag from native-order data
    ///
    /// `data` must hold exactly `count` elements of `field_type`. Sub-IFD
    /// tags are built with [`TiffTag::with_sub_ifd`] instead.
    pub fn new(id: u16, field_type: FieldType, count: u32, data: Vec<u8>) -> Result<Self> {
        if tags::is_sub_ifd(id) {
            return Err(Error::MalformedTag {
                tag: id,
                reason: "sub-IFD tags hold a directory, not data".into(),
            });
        }
        check_data_length(id, field_type, count, data.len())?;
        Ok(Self {
            id,
            field_type,
            count,
            value: TagValue::Loaded(data),
        })
    }

    /// Create an ASCII tag, adding the NUL terminator
    pub fn ascii(id: u16, text: &str) -> Result<Self> {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        let count = u32::try_from(data.len()).map_err(|_| Error::MalformedTag {
            tag: id,
            reason: "string too long".into(),
        })?;
        Self::new(id, FieldType::Ascii, count, data)
    }

    /// Create a tag holding one SHORT
    pub fn short(id: u16, value: u16) -> Result<Self> {
        Self::new(id, FieldType::Short, 1, value.to_ne_bytes().to_vec())
    }

    /// Create a tag holding one LONG
    pub fn long(id: u16, value: u32) -> Result<Self> {
        Self::new(id, FieldType::Long, 1, value.to_ne_bytes().to_vec())
    }

    /// Create a sub-IFD pointer tag owning `ifd`
    pub fn with_sub_ifd(id: u16, ifd: TiffIfd) -> Result<Self> {
        if !tags::is_sub_ifd(id) {
            return Err(Error::MalformedTag {
                tag: id,
                reason: "not a sub-IFD tag".into(),
            });
        }
        Ok(Self {
            id,
            field_type: FieldType::Long,
            count: 1,
            value: TagValue::SubIfd(Box::new(ifd)),
        })
    }

    /// Read one 12-byte directory entry from the current position
    ///
    /// Inline values are decoded immediately; offsets are kept pending.
    pub fn read<R: Read + Seek>(source: &mut R, order: ByteOrder) -> Result<Self> {
        let position = source.stream_position()?;
        let mut entry = [0u8; TAG_ENTRY_SIZE as usize];
        read_array(source, &mut entry, position)?;

        let id = order.read_u16(&entry[0..2]);
        let type_code = order.read_u16(&entry[2..4]);
        let count = order.read_u32(&entry[4..8]);
        let raw_value = &entry[8..12];

        let field_type = FieldType::from_code(id, type_code)?;
        let data_length = count as u64 * field_type.size() as u64;
        if data_length > MAX_TAG_DATA_LENGTH {
            return Err(Error::MalformedTag {
                tag: id,
                reason: format!(
                    "data length {data_length} exceeds {MAX_TAG_DATA_LENGTH} bytes"
                ),
            });
        }

        let value = if data_length <= 4 && !tags::is_sub_ifd(id) {
            // The slot may hold several small elements; decode each one.
            let mut data = raw_value[..data_length as usize].to_vec();
            order.decode(&mut data, field_type.swap_width());
            TagValue::Loaded(data)
        } else {
            TagValue::Pending {
                offset: order.read_u32(raw_value),
            }
        };

        log::trace!(
            "Read tag 0x{id:04X} type {type_code} count {count} at {position} ({})",
            if matches!(value, TagValue::Loaded(_)) { "inline" } else { "deferred" }
        );

        Ok(Self {
            id,
            field_type,
            count,
            value,
        })
    }

    /// Resolve a pending value
    ///
    /// `base` is the absolute position of the TIFF header in `source`.
    /// Does nothing if the tag is already loaded.
    pub fn load<R: Read + Seek>(&mut self, source: &mut R, base: u64, order: ByteOrder) -> Result<()> {
        let mut ctx = ReadContext::new(base, order, DEFAULT_MAX_IFD_DEPTH);
        self.load_with(source, &mut ctx)
    }

    pub(crate) fn load_with<R: Read + Seek>(
        &mut self,
        source: &mut R,
        ctx: &mut ReadContext,
    ) -> Result<()> {
        let TagValue::Pending { offset } = self.value else {
            return Ok(());
        };

        if self.is_sub_ifd() {
            log::debug!("Loading sub-IFD 0x{:04X} at offset {offset}", self.id);
            let ifd = TiffIfd::read(source, ctx, offset)?;
            self.value = TagValue::SubIfd(Box::new(ifd));
            return Ok(());
        }

        let position = ctx.base + offset as u64;
        seek_to(source, position)?;
        let mut data = read_vec(source, self.data_length(), position)?;
        ctx.order.decode(&mut data, self.field_type.swap_width());
        self.value = TagValue::Loaded(data);
        Ok(())
    }

    /// Write the 12-byte entry (first pass)
    ///
    /// Returns the position of the 4-byte placeholder when the value lives
    /// out of line, so the caller can patch it once the data is written.
    pub fn write<W: Write + Seek>(&self, sink: &mut W, order: ByteOrder) -> Result<Option<u64>> {
        self.write_entry(sink, order, None)
    }

    pub(crate) fn write_entry<W: Write + Seek>(
        &self,
        sink: &mut W,
        order: ByteOrder,
        replacement: Option<&[u8]>,
    ) -> Result<Option<u64>> {
        order.write_u16_to(sink, self.id)?;
        order.write_u16_to(sink, self.field_type.code())?;
        order.write_u32_to(sink, self.count)?;

        if !self.is_inline() {
            let placeholder = sink.stream_position()?;
            sink.write_all(&[0u8; 4])?;
            return Ok(Some(placeholder));
        }

        let data = replacement
            .or_else(|| self.data())
            .ok_or(Error::UnloadedData { tag: self.id })?;
        let mut slot = [0u8; 4];
        slot[..data.len()].copy_from_slice(data);
        order.encode(&mut slot[..data.len()], self.field_type.swap_width());
        sink.write_all(&slot)?;
        Ok(None)
    }

    /// Write the out-of-line data block (second pass)
    ///
    /// Returns the offset of the block relative to `base`, or `None` for
    /// inline tags. Sub-IFD tags write their whole directory here.
    pub fn write_data_block<W: Write + Seek>(
        &self,
        sink: &mut W,
        base: u64,
        order: ByteOrder,
    ) -> Result<Option<u32>> {
        self.write_data_block_with(sink, base, order, None)
    }

    pub(crate) fn write_data_block_with<W: Write + Seek>(
        &self,
        sink: &mut W,
        base: u64,
        order: ByteOrder,
        replacement: Option<&[u8]>,
    ) -> Result<Option<u32>> {
        if self.is_inline() {
            return Ok(None);
        }

        let data = match (&self.value, replacement) {
            (TagValue::SubIfd(ifd), _) => return ifd.write(sink, base, order).map(Some),
            (_, Some(data)) => data,
            (TagValue::Loaded(data), None) => data.as_slice(),
            (TagValue::Pending { .. }, None) => return Err(Error::UnloadedData { tag: self.id }),
        };

        let offset = super::align(sink, base)?;
        let mut encoded = data.to_vec();
        order.encode(&mut encoded, self.field_type.swap_width());
        sink.write_all(&encoded)?;
        Ok(Some(offset_from_base(offset, base)?))
    }

    /// Tag ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Field type
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Number of elements
    pub fn count(&self) -> u32 {
        self.count
    }

    /// `count * size_of(field_type)`
    pub fn data_length(&self) -> u64 {
        self.count as u64 * self.field_type.size() as u64
    }

    /// True for EXIF, GPS and Interoperability pointers
    pub fn is_sub_ifd(&self) -> bool {
        tags::is_sub_ifd(self.id)
    }

    /// True when the value fits in the entry's 4-byte slot
    pub fn is_inline(&self) -> bool {
        self.data_length() <= 4 && !self.is_sub_ifd()
    }

    /// True once the value (data or sub-IFD) has been read
    pub fn is_loaded(&self) -> bool {
        !matches!(self.value, TagValue::Pending { .. })
    }

    /// The raw value
    pub fn value(&self) -> &TagValue {
        &self.value
    }

    /// Offset of a pending value, relative to the TIFF start
    pub fn value_pointer(&self) -> Option<u32> {
        match self.value {
            TagValue::Pending { offset } => Some(offset),
            _ => None,
        }
    }

    /// Loaded data in native byte order
    pub fn data(&self) -> Option<&[u8]> {
        match &self.value {
            TagValue::Loaded(data) => Some(data),
            _ => None,
        }
    }

    /// Nested directory of a loaded sub-IFD tag
    pub fn sub_ifd(&self) -> Option<&TiffIfd> {
        match &self.value {
            TagValue::SubIfd(ifd) => Some(ifd),
            _ => None,
        }
    }

    pub fn sub_ifd_mut(&mut self) -> Option<&mut TiffIfd> {
        match &mut self.value {
            TagValue::SubIfd(ifd) => Some(ifd),
            _ => None,
        }
    }

    /// Replace the value with new native-order data
    pub fn set_data(&mut self, field_type: FieldType, count: u32, data: Vec<u8>) -> Result<()> {
        if self.is_sub_ifd() {
            return Err(Error::MalformedTag {
                tag: self.id,
                reason: "sub-IFD tags hold a directory, not data".into(),
            });
        }
        check_data_length(self.id, field_type, count, data.len())?;
        self.field_type = field_type;
        self.count = count;
        self.value = TagValue::Loaded(data);
        Ok(())
    }

    fn element(&self, index: usize) -> Option<&[u8]> {
        let size = self.field_type.size();
        let start = index.checked_mul(size)?;
        self.data()?.get(start..start + size)
    }

    /// Element `index` as an unsigned integer
    pub fn uint_value(&self, index: usize) -> Option<u32> {
        let bytes = self.element(index)?;
        match self.field_type {
            FieldType::Byte | FieldType::Undefined => Some(bytes[0] as u32),
            FieldType::Short => Some(u16::from_ne_bytes([bytes[0], bytes[1]]) as u32),
            FieldType::Long | FieldType::Ifd => Some(ne_u32(bytes)),
            _ => None,
        }
    }

    /// Element `index` as a signed integer
    pub fn int_value(&self, index: usize) -> Option<i32> {
        let bytes = self.element(index)?;
        match self.field_type {
            FieldType::SByte => Some(bytes[0] as i8 as i32),
            FieldType::SShort => Some(i16::from_ne_bytes([bytes[0], bytes[1]]) as i32),
            FieldType::SLong => Some(ne_u32(bytes) as i32),
            FieldType::Byte | FieldType::Undefined | FieldType::Short => {
                self.uint_value(index).map(|v| v as i32)
            }
            FieldType::Long => self.uint_value(index).and_then(|v| i32::try_from(v).ok()),
            _ => None,
        }
    }

    /// Element `index` as a float; rationals evaluate their fraction
    pub fn float_value(&self, index: usize) -> Option<f64> {
        let bytes = self.element(index)?;
        match self.field_type {
            FieldType::Float => Some(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64),
            FieldType::Double => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Some(f64::from_ne_bytes(raw))
            }
            FieldType::Rational => {
                let (num, den) = (ne_u32(&bytes[..4]), ne_u32(&bytes[4..]));
                (den != 0).then(|| num as f64 / den as f64)
            }
            FieldType::SRational => {
                let (num, den) = (ne_u32(&bytes[..4]) as i32, ne_u32(&bytes[4..]) as i32);
                (den != 0).then(|| num as f64 / den as f64)
            }
            FieldType::SByte | FieldType::SShort | FieldType::SLong => {
                self.int_value(index).map(f64::from)
            }
            _ => self.uint_value(index).map(f64::from),
        }
    }

    /// ASCII value with trailing NULs removed
    pub fn string_value(&self) -> Option<String> {
        if self.field_type != FieldType::Ascii {
            return None;
        }
        let data = self.data()?;
        let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        Some(String::from_utf8_lossy(&data[..end]).into_owned())
    }

    /// All elements as unsigned integers (SHORT or LONG offset arrays)
    pub(crate) fn uint_values(&self) -> Option<Vec<u32>> {
        (0..self.count as usize).map(|i| self.uint_value(i)).collect()
    }
}

fn ne_u32(bytes: &[u8]) -> u32 {
    u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn check_data_length(tag: u16, field_type: FieldType, count: u32, len: usize) -> Result<()> {
    let expected = count as u64 * field_type.size() as u64;
    if expected > MAX_TAG_DATA_LENGTH {
        return Err(Error::MalformedTag {
            tag,
            reason: format!("data length {expected} exceeds {MAX_TAG_DATA_LENGTH} bytes"),
        });
    }
    if expected != len as u64 {
        return Err(Error::MalformedTag {
            tag,
            reason: format!("expected {expected} data bytes, got {len}"),
        });
    }
    Ok(())
}

impl fmt::Display for TiffTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04x} {}x{} (",
            self.id,
            self.count,
            self.field_type.size()
        )?;
        match &self.value {
            TagValue::SubIfd(ifd) => write!(f, "IFD @{}", ifd.offset())?,
            TagValue::Pending { offset } if self.is_sub_ifd() => write!(f, "IFD @{offset}")?,
            TagValue::Pending { .. } => write!(f, "not loaded")?,
            TagValue::Loaded(_) if self.field_type == FieldType::Ascii => {
                write!(f, "\"{}\"", self.string_value().unwrap_or_default())?
            }
            TagValue::Loaded(_) => {
                let shown = (self.count as usize).min(4);
                for i in 0..shown {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match self.field_type {
                        FieldType::Rational
                        | FieldType::SRational
                        | FieldType::Float
                        | FieldType::Double => match self.float_value(i) {
                            Some(v) => write!(f, "{v}")?,
                            None => write!(f, "nan")?,
                        },
                        FieldType::Byte | FieldType::Undefined => {
                            write!(f, "0x{:02x}", self.uint_value(i).unwrap_or_default())?
                        }
                        FieldType::SByte | FieldType::SShort | FieldType::SLong => {
                            write!(f, "{}", self.int_value(i).unwrap_or_default())?
                        }
                        _ => write!(f, "{}", self.uint_value(i).unwrap_or_default())?,
                    }
                }
                if self.count as usize > shown {
                    write!(f, " ...")?;
                }
            }
        }
        write!(f, ")")
    }
}
