//! Image File Directories
//!
//! On disk an IFD is a 2-byte entry count, that many 12-byte entries and a
//! 4-byte offset to the next IFD (0 when there is none). Directory order is
//! preserved from read to write.

use super::{
    align, offset_from_base,
    tag::{TiffTag, MAX_TAG_DATA_LENGTH},
    tags::{self, FieldType},
    ReadContext,
};
use crate::{
    byte_order::ByteOrder,
    error::{Error, Result},
    stream::{read_vec, seek_to, truncated},
};
use std::io::{Read, Seek, SeekFrom, Write};

/// Maximum number of tags in an IFD (prevents DOS attacks)
pub const MAX_IFD_TAGS: u16 = 1000;

/// Raw image bytes referenced by an offset tag
///
/// The EXIF thumbnail (JPEGInterchangeFormat) and strip data (StripOffsets)
/// are addressed by offsets that must move when the directory is rewritten,
/// so their bytes travel with the IFD.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    offset_tag: u16,
    length_tag: u16,
    /// One entry per offset, `None` until loaded
    chunks: Option<Vec<Vec<u8>>>,
}

impl ImageData {
    /// The offset tag this data hangs off
    pub fn offset_tag(&self) -> u16 {
        self.offset_tag
    }

    /// Loaded chunks, one per offset value
    pub fn chunks(&self) -> Option<&[Vec<u8>]> {
        self.chunks.as_deref()
    }

    /// All chunks concatenated
    pub fn to_vec(&self) -> Option<Vec<u8>> {
        self.chunks.as_ref().map(|chunks| chunks.concat())
    }

    fn load<R: Read + Seek>(
        &mut self,
        source: &mut R,
        ctx: &ReadContext,
        directory: &[TiffTag],
    ) -> Result<()> {
        if self.chunks.is_some() {
            return Ok(());
        }
        let (offsets, lengths) = match self.locations(directory)? {
            Some(found) => found,
            None => return Ok(()),
        };

        let mut total = 0u64;
        let mut chunks = Vec::with_capacity(offsets.len());
        for (offset, length) in offsets.into_iter().zip(lengths) {
            total += length as u64;
            if total > MAX_TAG_DATA_LENGTH {
                return Err(Error::MalformedTag {
                    tag: self.offset_tag,
                    reason: format!("image data exceeds {MAX_TAG_DATA_LENGTH} bytes"),
                });
            }
            let position = ctx.base + offset as u64;
            seek_to(source, position)?;
            chunks.push(read_vec(source, length as u64, position)?);
        }
        log::debug!(
            "Loaded {} image data chunk(s) for tag 0x{:04X} ({total} bytes)",
            chunks.len(),
            self.offset_tag
        );
        self.chunks = Some(chunks);
        Ok(())
    }

    /// Offset and length arrays, when both tags are present and loaded
    fn locations(&self, directory: &[TiffTag]) -> Result<Option<(Vec<u32>, Vec<u32>)>> {
        let find = |id| directory.iter().find(|t| t.id() == id);
        let (Some(offsets), Some(lengths)) = (find(self.offset_tag), find(self.length_tag)) else {
            return Ok(None);
        };
        let (Some(offsets), Some(lengths)) = (offsets.uint_values(), lengths.uint_values()) else {
            return Ok(None);
        };
        if offsets.len() != lengths.len() {
            return Err(Error::MalformedTag {
                tag: self.offset_tag,
                reason: format!(
                    "{} offsets but {} lengths",
                    offsets.len(),
                    lengths.len()
                ),
            });
        }
        Ok(Some((offsets, lengths)))
    }
}

/// A pointer slot written as a placeholder, waiting for its target
#[derive(Debug, Clone, Copy)]
struct Patch {
    placeholder: u64,
    tag: u16,
    target: Option<u32>,
}

/// Pending pointer patches for one directory write
///
/// Entries are written with zero placeholders; once the referenced data has
/// been written its offset is recorded here and [`PatchList::apply`] seeks
/// back to fill every slot in.
#[derive(Debug, Default)]
pub(crate) struct PatchList {
    patches: Vec<Patch>,
}

impl PatchList {
    /// Register a placeholder, returning its handle
    pub(crate) fn reserve(&mut self, placeholder: u64, tag: u16) -> usize {
        self.patches.push(Patch {
            placeholder,
            tag,
            target: None,
        });
        self.patches.len() - 1
    }

    pub(crate) fn resolve(&mut self, handle: usize, target: u32) {
        if let Some(patch) = self.patches.get_mut(handle) {
            patch.target = Some(target);
        }
    }

    /// Write every resolved target, then return to the end of the output
    pub(crate) fn apply<W: Write + Seek>(&self, sink: &mut W, order: ByteOrder) -> Result<()> {
        let end = sink.stream_position()?;
        for patch in &self.patches {
            let target = patch.target.ok_or(Error::UnloadedData { tag: patch.tag })?;
            sink.seek(SeekFrom::Start(patch.placeholder))?;
            order.write_u32_to(sink, target)?;
        }
        sink.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

/// An ordered directory of tags with an optional chained next IFD
#[derive(Debug, Clone, Default)]
pub struct TiffIfd {
    /// Offset this IFD was read from (0 for directories built in memory)
    offset: u32,
    tags: Vec<TiffTag>,
    image_data: Vec<ImageData>,
    next: Option<Box<TiffIfd>>,
}

impl PartialEq for TiffIfd {
    /// Compares contents, not where the directory was read from
    fn eq(&self, other: &Self) -> bool {
        self.tags == other.tags && self.image_data == other.image_data && self.next == other.next
    }
}

impl TiffIfd {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the directory at `offset` and every IFD chained after it
    ///
    /// Entries are read eagerly, their out-of-line values are not.
    pub(crate) fn read<R: Read + Seek>(
        source: &mut R,
        ctx: &mut ReadContext,
        offset: u32,
    ) -> Result<Self> {
        ctx.claim(offset)?;
        ctx.enter(offset)?;

        let position = ctx.base + offset as u64;
        seek_to(source, position)?;
        let count = ctx
            .order
            .read_u16_from(source)
            .map_err(|e| truncated(e, position, 2))?;

        // Validate tag count to prevent DOS attacks
        if count > MAX_IFD_TAGS {
            return Err(Error::InvalidFormat(format!(
                "IFD at offset {offset} declares {count} entries (max {MAX_IFD_TAGS})"
            )));
        }
        log::trace!("Reading IFD at offset {offset} with {count} entries");

        let mut tags = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tags.push(TiffTag::read(source, ctx.order)?);
        }

        let next_offset = match ctx.order.read_u32_from(source) {
            Ok(next) => next,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                log::warn!("IFD at offset {offset} has no next-IFD pointer; assuming none");
                0
            }
            Err(e) => return Err(e.into()),
        };

        let image_data = discover_image_data(&tags);

        let next = if next_offset != 0 {
            Some(Box::new(TiffIfd::read(source, ctx, next_offset)?))
        } else {
            None
        };

        ctx.leave();
        Ok(Self {
            offset,
            tags,
            image_data,
            next,
        })
    }

    /// Resolve every pending tag, sub-IFD and image data block, recursively
    pub(crate) fn load_all<R: Read + Seek>(
        &mut self,
        source: &mut R,
        ctx: &mut ReadContext,
    ) -> Result<()> {
        ctx.enter(self.offset)?;
        for tag in &mut self.tags {
            tag.load_with(source, ctx)?;
            if let Some(sub) = tag.sub_ifd_mut() {
                sub.load_all(source, ctx)?;
            }
        }
        for data in &mut self.image_data {
            data.load(source, ctx, &self.tags)?;
        }
        ctx.leave();

        if let Some(next) = &mut self.next {
            next.load_all(source, ctx)?;
        }
        Ok(())
    }

    /// Write this directory, its data and its chain
    ///
    /// Returns the directory's offset relative to `base`. Entries are written
    /// first with placeholder pointers; data blocks and sub-IFDs follow and
    /// the placeholders are patched last. The sink must be seekable.
    pub fn write<W: Write + Seek>(&self, sink: &mut W, base: u64, order: ByteOrder) -> Result<u32> {
        // Relocated image bytes go first so the new offsets are known
        // before the entries that hold them.
        let replacements = self.write_image_data(sink, base)?;
        let replacement = |id: u16| {
            replacements
                .iter()
                .find(|(tag, _)| *tag == id)
                .map(|(_, data)| data.as_slice())
        };

        let count = u16::try_from(self.tags.len()).map_err(|_| {
            Error::InvalidFormat(format!("{} tags do not fit in one IFD", self.tags.len()))
        })?;
        let start = align(sink, base)?;
        order.write_u16_to(sink, count)?;

        // Pass 1: entries
        let mut patches = PatchList::default();
        let mut pending = Vec::new();
        for (index, tag) in self.tags.iter().enumerate() {
            if let Some(placeholder) = tag.write_entry(sink, order, replacement(tag.id()))? {
                pending.push((index, patches.reserve(placeholder, tag.id())));
            }
        }
        let next_placeholder = sink.stream_position()?;
        order.write_u32_to(sink, 0)?;

        // Pass 2: data blocks and sub-IFDs
        for (index, handle) in pending {
            let tag = &self.tags[index];
            if let Some(target) =
                tag.write_data_block_with(sink, base, order, replacement(tag.id()))?
            {
                patches.resolve(handle, target);
            }
        }

        if let Some(next) = &self.next {
            let target = next.write(sink, base, order)?;
            let handle = patches.reserve(next_placeholder, 0);
            patches.resolve(handle, target);
        }

        patches.apply(sink, order)?;
        let offset = offset_from_base(start, base)?;
        log::debug!("Wrote IFD with {count} entries at offset {offset}");
        Ok(offset)
    }

    /// Write relocated image bytes, returning new data for each offset tag
    fn write_image_data<W: Write + Seek>(
        &self,
        sink: &mut W,
        base: u64,
    ) -> Result<Vec<(u16, Vec<u8>)>> {
        let mut replacements = Vec::new();
        for data in &self.image_data {
            let Some(tag) = self.tag(data.offset_tag) else {
                continue;
            };
            let chunks = data.chunks.as_ref().ok_or(Error::UnloadedData {
                tag: data.offset_tag,
            })?;

            let mut offsets = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                let position = align(sink, base)?;
                sink.write_all(chunk)?;
                offsets.push(offset_from_base(position, base)?);
            }

            let encoded = match tag.field_type() {
                FieldType::Short => offsets
                    .iter()
                    .map(|&o| {
                        u16::try_from(o).map(u16::to_ne_bytes).map_err(|_| Error::MalformedTag {
                            tag: data.offset_tag,
                            reason: format!("offset {o} does not fit in a SHORT"),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
                    .concat(),
                _ => offsets.iter().flat_map(|o| o.to_ne_bytes()).collect(),
            };
            if encoded.len() as u64 != tag.data_length() {
                return Err(Error::MalformedTag {
                    tag: data.offset_tag,
                    reason: "offset count does not match image data".into(),
                });
            }
            replacements.push((data.offset_tag, encoded));
        }
        Ok(replacements)
    }

    /// Offset this directory was read from
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Tags in directory order
    pub fn tags(&self) -> &[TiffTag] {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut [TiffTag] {
        &mut self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// First tag with this ID
    pub fn tag(&self, id: u16) -> Option<&TiffTag> {
        self.tags.iter().find(|t| t.id() == id)
    }

    pub fn tag_mut(&mut self, id: u16) -> Option<&mut TiffTag> {
        self.tags.iter_mut().find(|t| t.id() == id)
    }

    /// Replace the tag with the same ID, or append a new one
    pub fn insert(&mut self, tag: TiffTag) {
        match self.tags.iter_mut().find(|t| t.id() == tag.id()) {
            Some(existing) => *existing = tag,
            None => self.tags.push(tag),
        }
    }

    /// Remove the first tag with this ID from this directory
    pub fn remove_tag(&mut self, id: u16) -> Option<TiffTag> {
        let index = self.tags.iter().position(|t| t.id() == id)?;
        Some(self.tags.remove(index))
    }

    /// Remove every tag with this ID from this directory, its sub-IFDs and
    /// its chain, returning how many were removed
    pub fn remove_tag_recursive(&mut self, id: u16) -> usize {
        let before = self.tags.len();
        self.tags.retain(|t| t.id() != id);
        let mut removed = before - self.tags.len();
        for tag in &mut self.tags {
            if let Some(sub) = tag.sub_ifd_mut() {
                removed += sub.remove_tag_recursive(id);
            }
        }
        if let Some(next) = &mut self.next {
            removed += next.remove_tag_recursive(id);
        }
        removed
    }

    /// Image data carried for an offset tag
    pub fn image_data(&self, offset_tag: u16) -> Option<&ImageData> {
        self.image_data.iter().find(|d| d.offset_tag == offset_tag)
    }

    /// The IFD chained after this one
    pub fn next(&self) -> Option<&TiffIfd> {
        self.next.as_deref()
    }

    pub fn next_mut(&mut self) -> Option<&mut TiffIfd> {
        self.next.as_deref_mut()
    }

    /// Replace the chained IFD
    pub fn set_next(&mut self, next: Option<TiffIfd>) {
        self.next = next.map(Box::new);
    }

    /// Detach and return the chained IFD
    pub fn take_next(&mut self) -> Option<TiffIfd> {
        self.next.take().map(|b| *b)
    }

    /// True when every value in this directory tree has been read
    pub fn is_loaded(&self) -> bool {
        self.tags
            .iter()
            .all(|t| t.is_loaded() && t.sub_ifd().map_or(true, TiffIfd::is_loaded))
            && self.image_data.iter().all(|d| {
                d.chunks.is_some() || self.tag(d.offset_tag).is_none()
            })
            && self.next.as_deref().map_or(true, TiffIfd::is_loaded)
    }

    /// Sub-IFD reached through `tag`, if loaded
    pub fn sub_ifd(&self, tag: u16) -> Option<&TiffIfd> {
        self.tag(tag).and_then(TiffTag::sub_ifd)
    }

    /// Attach raw image bytes to an offset/length tag pair
    ///
    /// Both tags must already be in the directory; the length tag is
    /// expected to match `chunks`.
    pub fn set_image_data(&mut self, offset_tag: u16, chunks: Vec<Vec<u8>>) -> Result<()> {
        let Some(&(_, length_tag)) = tags::IMAGE_DATA_TAGS.iter().find(|(o, _)| *o == offset_tag)
        else {
            return Err(Error::MalformedTag {
                tag: offset_tag,
                reason: "not an image data offset tag".into(),
            });
        };
        self.image_data.retain(|d| d.offset_tag != offset_tag);
        self.image_data.push(ImageData {
            offset_tag,
            length_tag,
            chunks: Some(chunks),
        });
        Ok(())
    }
}

/// Image data references present in a freshly read directory
fn discover_image_data(directory: &[TiffTag]) -> Vec<ImageData> {
    tags::IMAGE_DATA_TAGS
        .iter()
        .filter(|(offset_tag, length_tag)| {
            directory.iter().any(|t| t.id() == *offset_tag)
                && directory.iter().any(|t| t.id() == *length_tag)
        })
        .map(|&(offset_tag, length_tag)| ImageData {
            offset_tag,
            length_tag,
            chunks: None,
        })
        .collect()
}
