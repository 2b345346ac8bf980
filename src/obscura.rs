//! Obscura metadata carried in a reserved application marker
//!
//! The marker payload is a NUL-terminated type tag followed by the data:
//!
//! ```text
//! "DESCRIPTOR" 0x00 <descriptor bytes>
//! "REDACTION"  0x00 <redaction record>
//! ```
//!
//! The payload is byte-stuffed on the wire (see [`crate::marker`]).

use crate::{
    error::{Error, Result},
    marker::JpegMarker,
};
use std::io::Write;

/// Marker code reserved for Obscura metadata (APP7)
pub const OBSCURA_MARKER: u16 = 0xFFE7;

/// Largest descriptor accepted by [`ObscuraMetadata::set_descriptor`]
pub const MAX_DESCRIPTOR_SIZE: usize = 65534;

/// Kind of data in an Obscura marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Descriptor,
    Redaction,
}

impl PayloadKind {
    /// Type tag as written before the NUL
    pub fn type_tag(self) -> &'static [u8] {
        match self {
            PayloadKind::Descriptor => b"DESCRIPTOR",
            PayloadKind::Redaction => b"REDACTION",
        }
    }

    pub fn from_type_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"DESCRIPTOR" => Some(PayloadKind::Descriptor),
            b"REDACTION" => Some(PayloadKind::Redaction),
            _ => None,
        }
    }
}

/// Descriptor and redaction data embedded by this crate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObscuraMetadata {
    descriptor: Option<Vec<u8>>,
}

impl ObscuraMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a copy of `descriptor`
    pub fn set_descriptor(&mut self, descriptor: &[u8]) -> Result<()> {
        if descriptor.len() > MAX_DESCRIPTOR_SIZE {
            return Err(Error::DescriptorTooLarge {
                size: descriptor.len(),
                max: MAX_DESCRIPTOR_SIZE,
            });
        }
        self.descriptor = Some(descriptor.to_vec());
        Ok(())
    }

    pub fn descriptor(&self) -> Option<&[u8]> {
        self.descriptor.as_deref()
    }

    pub fn clear_descriptor(&mut self) {
        self.descriptor = None;
    }

    /// True when there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.descriptor.is_none()
    }

    /// Take the contents of an (un-stuffed) Obscura marker
    ///
    /// Returns `false`, leaving `self` untouched, when the marker is not an
    /// Obscura marker or carries a type tag we do not know. Such markers are
    /// foreign data, not errors.
    pub fn import_marker(&mut self, marker: &JpegMarker) -> bool {
        if marker.code() != OBSCURA_MARKER {
            return false;
        }
        let payload = marker.payload();
        let Some(nul) = payload.iter().position(|&b| b == 0) else {
            log::warn!("Obscura marker without a type tag, ignoring");
            return false;
        };
        let (tag, data) = (&payload[..nul], &payload[nul + 1..]);

        match PayloadKind::from_type_tag(tag) {
            Some(PayloadKind::Descriptor) => {
                log::debug!("Imported {} byte descriptor", data.len());
                self.descriptor = Some(data.to_vec());
                true
            }
            Some(PayloadKind::Redaction) => {
                log::debug!("Skipping {} byte redaction record", data.len());
                true
            }
            None => {
                log::warn!(
                    "Unknown Obscura type tag {:?}, ignoring",
                    String::from_utf8_lossy(tag)
                );
                false
            }
        }
    }

    /// Build the descriptor marker, if a descriptor is set
    pub fn make_descriptor_marker(&self) -> Option<JpegMarker> {
        let descriptor = self.descriptor.as_ref()?;
        let tag = PayloadKind::Descriptor.type_tag();
        let mut payload = Vec::with_capacity(tag.len() + 1 + descriptor.len());
        payload.extend_from_slice(tag);
        payload.push(0);
        payload.extend_from_slice(descriptor);
        Some(JpegMarker::new(OBSCURA_MARKER, payload))
    }

    /// Build markers for redaction records
    pub fn make_redaction_markers(&self) -> Vec<JpegMarker> {
        // TODO: encode redaction records once they have a defined wire format
        Vec::new()
    }

    /// Write every Obscura marker, stuffed
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        let markers = self
            .make_descriptor_marker()
            .into_iter()
            .chain(self.make_redaction_markers());
        for marker in markers {
            marker.write_with_stuff_bytes(sink)?;
        }
        Ok(())
    }
}
