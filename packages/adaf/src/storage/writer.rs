//! Writing container files in one forward pass.

use std::path::Path;

use super::directory::{BlobRef, Directory, RasterEntry, RasterLocation, SystemEntry};
use super::format::{FileHeader, Footer};
use crate::error::Result;
use crate::link::FileHandle;
use crate::model::DataContainer;
use crate::table::Table;

/// Appends framed blobs to a write handle. `finish` writes the directory and
/// footer; a writer dropped before that leaves an unreadable file.
pub struct ContainerWriter<'a> {
    handle: &'a FileHandle,
}

impl<'a> ContainerWriter<'a> {
    pub fn begin(handle: &'a FileHandle) -> Result<Self> {
        let mut header = Vec::with_capacity(FileHeader::SIZE);
        FileHeader::new().write_to(&mut header)?;
        handle.append(&header)?;
        Ok(ContainerWriter { handle })
    }

    pub fn write_table(&self, table: &Table) -> Result<BlobRef> {
        self.write_bytes(&bincode::serialize(table)?)
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> Result<BlobRef> {
        let offset = self.handle.append(bytes)?;
        Ok(BlobRef {
            offset,
            len: bytes.len() as u64,
        })
    }

    pub fn finish(self, directory: &Directory) -> Result<()> {
        let encoded = bincode::serialize(directory)?;
        let directory_offset = self.handle.append(&encoded)?;
        let mut footer = Vec::with_capacity(Footer::SIZE);
        Footer {
            directory_offset,
            directory_len: encoded.len() as u64,
        }
        .write_to(&mut footer)?;
        self.handle.append(&footer)?;
        self.handle.flush()
    }
}

/// Write `container` to `handle`, which will end up at `dest`.
///
/// Unmodified stored rasters are copied as raw bytes, or recorded as links
/// when `link_external` is set and their payload lives in a file other than
/// `dest`.
pub(crate) fn write_container(
    handle: &FileHandle,
    container: &DataContainer,
    dest: &Path,
    link_external: bool,
) -> Result<()> {
    let writer = ContainerWriter::begin(handle)?;
    let root = writer.write_table(container.root().as_table())?;
    let meta = writer.write_table(container.meta.as_table())?;
    let res = writer.write_table(container.res.as_table())?;

    let mut systems = Vec::with_capacity(container.sys.len());
    let mut linked = 0usize;
    for system in container.sys.iter() {
        let mut rasters = Vec::with_capacity(system.len());
        for name in system.keys() {
            let location = match system.slot(name)?.unmodified() {
                Some(stored) if link_external && stored.origin.file != dest => {
                    linked += 1;
                    RasterLocation::External {
                        file: stored.origin.file.to_string_lossy().into_owned(),
                        system: stored.origin.system.clone(),
                        raster: stored.origin.raster.clone(),
                    }
                }
                Some(stored) => RasterLocation::Blob(writer.write_bytes(stored.blob.bytes())?),
                None => RasterLocation::Blob(writer.write_table(system.raster(name)?.table())?),
            };
            rasters.push(RasterEntry {
                name: name.to_string(),
                location,
            });
        }
        systems.push(SystemEntry {
            name: system.name().to_string(),
            attrs: system.attrs().clone(),
            rasters,
        });
    }

    writer.finish(&Directory {
        root,
        meta,
        res,
        systems,
    })?;
    tracing::debug!(dest = %dest.display(), linked, "Wrote container");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::reader::read_directory;
    use crate::table::Attributes;
    use tempfile::TempDir;

    #[test]
    fn test_written_file_has_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.adaf");
        let mut container = DataContainer::new();
        container
            .sys
            .create("s0")
            .unwrap()
            .create("r0")
            .unwrap()
            .create_signal("x", vec![1i64, 2, 3], Attributes::new())
            .unwrap();

        let handle = FileHandle::create(&path).unwrap();
        write_container(&handle, &container, &path, false).unwrap();
        handle.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let directory = read_directory(&bytes).unwrap();
        assert_eq!(directory.systems.len(), 1);
        assert!(matches!(
            directory.raster("s0", "r0"),
            Some(RasterLocation::Blob(_))
        ));
        assert_eq!(directory.root.offset, FileHeader::SIZE as u64);
    }

    #[test]
    fn test_unfinished_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.adaf");
        let handle = FileHandle::create(&path).unwrap();
        let writer = ContainerWriter::begin(&handle).unwrap();
        writer.write_table(&Table::new()).unwrap();
        drop(writer);
        handle.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(read_directory(&bytes).is_err());
    }
}
