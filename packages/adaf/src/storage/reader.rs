//! Reading container files.

use crate::error::{AdafError, Result};
use crate::link::{LinkCache, LinkDescriptor, OpenMode, SharedHandle};
use crate::table::{Attributes, Table};

use super::directory::{Directory, RasterLocation};
use super::format::{FileHeader, Footer};
use super::{Blob, StoredRaster};

/// Validate framing and decode the directory of a mapped file.
pub fn read_directory(file: &[u8]) -> Result<Directory> {
    FileHeader::from_bytes(file)?;
    let footer = Footer::from_file_bytes(file)?;
    let start = footer.directory_offset as usize;
    let end = start + footer.directory_len as usize;
    Ok(bincode::deserialize(&file[start..end])?)
}

pub(crate) struct StoredSystem {
    pub name: String,
    pub attrs: Attributes,
    pub rasters: Vec<(String, StoredRaster)>,
}

/// Everything of a container file except raster payloads, which stay as
/// mapped blobs until first use.
pub(crate) struct StoredContainer {
    pub root: Table,
    pub meta: Table,
    pub res: Table,
    pub systems: Vec<StoredSystem>,
}

pub(crate) fn read_container(handle: &SharedHandle, cache: &mut LinkCache) -> Result<StoredContainer> {
    let map = handle.map()?;
    let directory = handle.directory()?;
    let table = |blob| Blob::new(map.clone(), blob)?.decode_table();

    let mut systems = Vec::with_capacity(directory.systems.len());
    for system in &directory.systems {
        let mut rasters = Vec::with_capacity(system.rasters.len());
        for entry in &system.rasters {
            let stored = match &entry.location {
                RasterLocation::Blob(blob) => StoredRaster {
                    blob: Blob::new(map.clone(), *blob)?,
                    origin: LinkDescriptor {
                        file: handle.path().to_path_buf(),
                        system: system.name.clone(),
                        raster: entry.name.clone(),
                    },
                },
                RasterLocation::External { .. } => {
                    resolve_external(handle, cache, &system.name, &entry.name)?
                }
            };
            rasters.push((entry.name.clone(), stored));
        }
        systems.push(StoredSystem {
            name: system.name.clone(),
            attrs: system.attrs.clone(),
            rasters,
        });
    }

    Ok(StoredContainer {
        root: table(directory.root)?,
        meta: table(directory.meta)?,
        res: table(directory.res)?,
        systems,
    })
}

fn resolve_external(
    handle: &SharedHandle,
    cache: &mut LinkCache,
    system: &str,
    raster: &str,
) -> Result<StoredRaster> {
    let origin = cache.getlink(handle, system, raster)?;
    let target = cache.open(&origin.file, OpenMode::Read)?;
    let directory = target.directory()?;
    match directory.raster(&origin.system, &origin.raster) {
        Some(RasterLocation::Blob(blob)) => {
            tracing::debug!(
                system,
                raster,
                target = %origin.file.display(),
                "Resolved linked raster"
            );
            Ok(StoredRaster {
                blob: Blob::new(target.map()?, *blob)?,
                origin,
            })
        }
        _ => Err(AdafError::InvalidFormat(format!(
            "Link target {}/{} in {} is not stored data",
            origin.system,
            origin.raster,
            origin.file.display()
        ))),
    }
}
