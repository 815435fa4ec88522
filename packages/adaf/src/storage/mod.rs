//! Container file storage
//!
//! A container file holds bincode-encoded tables (root, meta, res and one per
//! stored raster) followed by a directory and a fixed-size footer; see
//! [`format`]. Rasters can also be recorded as links into other container
//! files, which the reader resolves through the link cache.

pub mod directory;
pub mod format;
pub mod reader;
pub mod writer;

use std::ops::Range;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{AdafError, Result};
use crate::link::LinkDescriptor;
use crate::table::Table;
use directory::BlobRef;

/// A byte range of a mapped container file.
#[derive(Clone)]
pub struct Blob {
    map: Arc<Mmap>,
    range: Range<usize>,
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob").field("range", &self.range).finish()
    }
}

impl Blob {
    pub(crate) fn new(map: Arc<Mmap>, blob: BlobRef) -> Result<Self> {
        let start = blob.offset as usize;
        let end = start
            .checked_add(blob.len as usize)
            .filter(|&end| end <= map.len())
            .ok_or_else(|| {
                AdafError::InvalidFormat(format!(
                    "Blob {}+{} outside file of {} bytes",
                    blob.offset,
                    blob.len,
                    map.len()
                ))
            })?;
        Ok(Blob {
            map,
            range: start..end,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map[self.range.clone()]
    }

    pub fn decode_table(&self) -> Result<Table> {
        Ok(bincode::deserialize(self.bytes())?)
    }
}

/// Unmaterialized raster payload together with the file location it came
/// from (after following links).
#[derive(Debug, Clone)]
pub struct StoredRaster {
    pub blob: Blob,
    pub origin: LinkDescriptor,
}
