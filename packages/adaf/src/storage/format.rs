//! Binary framing of container files.
//!
//! # File Layout
//!
//! ```text
//! [FileHeader]     16 bytes
//! [table blobs]    bincode-encoded tables, back to back
//! [directory]      bincode-encoded Directory
//! [Footer]         32 bytes
//! ```
//!
//! The footer sits at EOF so files are written in one forward pass.

use std::io::Write;

use crate::error::{AdafError, Result};

// ── File Header ───────────────────────────────────────────────────

/// Magic bytes at the start of every container file.
pub const FILE_MAGIC: [u8; 4] = *b"ADAF";

/// Container file format version.
pub const FORMAT_VERSION: u16 = 1;

/// File header -- exactly 16 bytes.
///
/// ```text
/// Offset  Size  Field
/// 0       4     magic: b"ADAF"
/// 4       2     format_version: u16 = 1
/// 6       10    _reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub format_version: u16,
}

impl FileHeader {
    pub const SIZE: usize = 16;

    pub fn new() -> Self {
        Self {
            magic: FILE_MAGIC,
            format_version: FORMAT_VERSION,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.magic)?;
        w.write_all(&self.format_version.to_le_bytes())?;
        w.write_all(&[0u8; 10])?;
        Ok(())
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(AdafError::InvalidFormat(format!(
                "File too short for header: {} bytes",
                buf.len()
            )));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        let format_version = u16::from_le_bytes([buf[4], buf[5]]);

        if magic != FILE_MAGIC {
            return Err(AdafError::InvalidFormat(format!(
                "Not an ADAF file: expected ADAF, got {:?}",
                magic
            )));
        }
        if format_version != FORMAT_VERSION {
            return Err(AdafError::InvalidFormat(format!(
                "Unsupported format version: {}",
                format_version
            )));
        }
        Ok(Self {
            magic,
            format_version,
        })
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

// ── Footer ────────────────────────────────────────────────────────

/// Magic bytes closing every container file.
pub const FOOTER_MAGIC: u32 = u32::from_le_bytes(*b"AFT1");

/// Footer -- exactly 32 bytes, last thing in the file.
///
/// ```text
/// Offset  Size  Field
/// 0       8     directory_offset: u64
/// 8       8     directory_len: u64
/// 16      8     _reserved
/// 24      4     footer_size: u32 = 32
/// 28      4     magic: b"AFT1"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub directory_offset: u64,
    pub directory_len: u64,
}

impl Footer {
    pub const SIZE: usize = 32;

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.directory_offset.to_le_bytes())?;
        w.write_all(&self.directory_len.to_le_bytes())?;
        w.write_all(&[0u8; 8])?;
        w.write_all(&(Self::SIZE as u32).to_le_bytes())?;
        w.write_all(&FOOTER_MAGIC.to_le_bytes())?;
        Ok(())
    }

    /// Parse the footer from a complete file image.
    pub fn from_file_bytes(file: &[u8]) -> Result<Self> {
        if file.len() < FileHeader::SIZE + Self::SIZE {
            return Err(AdafError::InvalidFormat(format!(
                "File too short for footer: {} bytes",
                file.len()
            )));
        }
        let buf = &file[file.len() - Self::SIZE..];
        let read_u64 = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(b)
        };
        let read_u32 = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[at..at + 4]);
            u32::from_le_bytes(b)
        };

        let magic = read_u32(28);
        if magic != FOOTER_MAGIC {
            return Err(AdafError::InvalidFormat(format!(
                "Bad footer magic: 0x{:08x}",
                magic
            )));
        }
        let footer_size = read_u32(24);
        if footer_size as usize != Self::SIZE {
            return Err(AdafError::InvalidFormat(format!(
                "Unexpected footer size: {}",
                footer_size
            )));
        }

        let footer = Self {
            directory_offset: read_u64(0),
            directory_len: read_u64(8),
        };
        let end = footer
            .directory_offset
            .checked_add(footer.directory_len)
            .ok_or_else(|| AdafError::InvalidFormat("Directory range overflows".into()))?;
        if footer.directory_offset < FileHeader::SIZE as u64
            || end > (file.len() - Self::SIZE) as u64
        {
            return Err(AdafError::InvalidFormat(format!(
                "Directory range {}..{} outside file of {} bytes",
                footer.directory_offset,
                end,
                file.len()
            )));
        }
        Ok(footer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(directory: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        FileHeader::new().write_to(&mut buf).unwrap();
        let offset = buf.len() as u64;
        buf.extend_from_slice(directory);
        Footer {
            directory_offset: offset,
            directory_len: directory.len() as u64,
        }
        .write_to(&mut buf)
        .unwrap();
        buf
    }

    #[test]
    fn test_sizes() {
        let buf = image(b"dir");
        assert_eq!(buf.len(), FileHeader::SIZE + 3 + Footer::SIZE);
    }

    #[test]
    fn test_header_and_footer_parse() {
        let buf = image(b"directory");
        FileHeader::from_bytes(&buf).unwrap();
        let footer = Footer::from_file_bytes(&buf).unwrap();
        assert_eq!(footer.directory_offset, FileHeader::SIZE as u64);
        assert_eq!(footer.directory_len, 9);
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = image(b"x");
        buf[0] = b'X';
        assert!(FileHeader::from_bytes(&buf).is_err());

        let mut buf = image(b"x");
        let last = buf.len() - 1;
        buf[last] ^= 0xff;
        assert!(Footer::from_file_bytes(&buf).is_err());
    }

    #[test]
    fn test_directory_out_of_range() {
        let mut buf = image(b"abc");
        let n = buf.len();
        // directory_len field sits 24 bytes before the end of the footer
        buf[n - 24..n - 16].copy_from_slice(&1000u64.to_le_bytes());
        assert!(Footer::from_file_bytes(&buf).is_err());
    }

    #[test]
    fn test_short_file() {
        assert!(FileHeader::from_bytes(b"AD").is_err());
        assert!(Footer::from_file_bytes(&[0u8; 20]).is_err());
    }
}
