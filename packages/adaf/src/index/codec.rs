//! Compressed form of the structural index: gzip over JSON.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::StructuralIndex;
use crate::error::Result;

pub fn encode(index: &StructuralIndex) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(index)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

pub fn decode(bytes: &[u8]) -> Result<StructuralIndex> {
    let mut json = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Decode a cached index. Corrupt data is treated as no cache.
pub fn decode_cached(bytes: &[u8]) -> Option<StructuralIndex> {
    match decode(bytes) {
        Ok(index) => Some(index),
        Err(e) => {
            tracing::warn!(error = %e, len = bytes.len(), "Ignoring unreadable cached index");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ColumnIndex, GroupIndex};

    fn sample() -> StructuralIndex {
        StructuralIndex {
            version: "2.1".into(),
            meta: GroupIndex {
                columns: vec![ColumnIndex {
                    name: "speed".into(),
                    dtype: "float64".into(),
                    attrs: None,
                }],
                shape: [1, 1],
            },
            ..StructuralIndex::default()
        }
    }

    #[test]
    fn test_encode_is_gzip() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_corrupt_is_none() {
        let mut bytes = encode(&sample()).unwrap();
        let mid = bytes.len() / 2;
        bytes.truncate(mid);
        assert!(decode_cached(&bytes).is_none());
        assert!(decode_cached(b"not gzip at all").is_none());
    }
}
