//! Directory of a container file: where each table lives.

use serde::{Deserialize, Serialize};

use crate::table::Attributes;

/// Byte range of a blob inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub offset: u64,
    pub len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterLocation {
    /// Raster table stored in this file.
    Blob(BlobRef),
    /// Raster stored in another container file.
    External {
        file: String,
        system: String,
        raster: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterEntry {
    pub name: String,
    pub location: RasterLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEntry {
    pub name: String,
    pub attrs: Attributes,
    pub rasters: Vec<RasterEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub root: BlobRef,
    pub meta: BlobRef,
    pub res: BlobRef,
    pub systems: Vec<SystemEntry>,
}

impl Directory {
    pub fn raster(&self, system: &str, raster: &str) -> Option<&RasterLocation> {
        self.systems
            .iter()
            .find(|s| s.name == system)?
            .rasters
            .iter()
            .find(|r| r.name == raster)
            .map(|r| &r.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let blob = BlobRef { offset: 16, len: 4 };
        let dir = Directory {
            root: blob,
            meta: blob,
            res: blob,
            systems: vec![SystemEntry {
                name: "s0".into(),
                attrs: Attributes::new(),
                rasters: vec![RasterEntry {
                    name: "r0".into(),
                    location: RasterLocation::Blob(blob),
                }],
            }],
        };
        let bytes = bincode::serialize(&dir).unwrap();
        let back: Directory = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.raster("s0", "r0"), Some(&RasterLocation::Blob(blob)));
        assert_eq!(back.raster("s0", "r1"), None);
        assert_eq!(back.raster("s1", "r0"), None);
    }
}
