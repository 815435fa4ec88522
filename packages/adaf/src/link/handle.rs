//! OS file handles shared through the link cache.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{AdafError, Result};
use crate::storage::directory::Directory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl OpenMode {
    pub fn name(self) -> &'static str {
        match self {
            OpenMode::Read => "read",
            OpenMode::Write => "write",
        }
    }
}

enum HandleState {
    Read {
        _file: File,
        map: Arc<Mmap>,
        directory: Option<Rc<Directory>>,
    },
    Write {
        writer: BufWriter<File>,
        position: u64,
    },
    Closed,
}

/// An open container file. Read handles map the whole file; write handles
/// append through a buffered writer.
pub struct FileHandle {
    path: PathBuf,
    mode: OpenMode,
    state: RefCell<HandleState>,
}

pub type SharedHandle = Rc<FileHandle>;

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("open", &self.is_open())
            .finish()
    }
}

impl FileHandle {
    pub fn open_read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(AdafError::InvalidFormat(format!(
                "{} is empty",
                path.display()
            )));
        }
        let map = unsafe { Mmap::map(&file) }.map_err(AdafError::Io)?;
        Ok(FileHandle {
            path: path.to_path_buf(),
            mode: OpenMode::Read,
            state: RefCell::new(HandleState::Read {
                _file: file,
                map: Arc::new(map),
                directory: None,
            }),
        })
    }

    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(FileHandle {
            path: path.to_path_buf(),
            mode: OpenMode::Write,
            state: RefCell::new(HandleState::Write {
                writer: BufWriter::new(file),
                position: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        !matches!(*self.state.borrow(), HandleState::Closed)
    }

    /// The whole file, mapped read-only.
    pub fn map(&self) -> Result<Arc<Mmap>> {
        match &*self.state.borrow() {
            HandleState::Read { map, .. } => Ok(map.clone()),
            HandleState::Write { .. } => Err(AdafError::InvalidMode {
                path: self.path.clone(),
                mode: OpenMode::Write.name(),
            }),
            HandleState::Closed => Err(AdafError::HandleClosed(self.path.clone())),
        }
    }

    /// Parsed directory of the file, cached on the handle.
    pub(crate) fn directory(&self) -> Result<Rc<Directory>> {
        if let HandleState::Read {
            directory: Some(dir),
            ..
        } = &*self.state.borrow()
        {
            return Ok(dir.clone());
        }
        let map = self.map()?;
        let dir = Rc::new(crate::storage::reader::read_directory(&map)?);
        if let HandleState::Read { directory, .. } = &mut *self.state.borrow_mut() {
            *directory = Some(dir.clone());
        }
        Ok(dir)
    }

    /// Append `bytes`, returning the offset they were written at.
    pub fn append(&self, bytes: &[u8]) -> Result<u64> {
        match &mut *self.state.borrow_mut() {
            HandleState::Write { writer, position } => {
                writer.write_all(bytes)?;
                let at = *position;
                *position += bytes.len() as u64;
                Ok(at)
            }
            HandleState::Read { .. } => Err(AdafError::InvalidMode {
                path: self.path.clone(),
                mode: OpenMode::Read.name(),
            }),
            HandleState::Closed => Err(AdafError::HandleClosed(self.path.clone())),
        }
    }

    pub fn flush(&self) -> Result<()> {
        if let HandleState::Write { writer, .. } = &mut *self.state.borrow_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush then close. Closing a closed handle does nothing.
    pub fn close(&self) -> Result<()> {
        let state = std::mem::replace(&mut *self.state.borrow_mut(), HandleState::Closed);
        if let HandleState::Write { writer, .. } = state {
            let file = writer.into_inner().map_err(|e| AdafError::Io(e.into_error()))?;
            file.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.bin");

        let w = FileHandle::create(&path).unwrap();
        assert_eq!(w.append(b"hello").unwrap(), 0);
        assert_eq!(w.append(b" world").unwrap(), 5);
        assert!(w.map().is_err());
        w.close().unwrap();
        w.close().unwrap();
        assert!(!w.is_open());

        let r = FileHandle::open_read(&path).unwrap();
        assert_eq!(&r.map().unwrap()[..], b"hello world");
        assert!(r.append(b"x").is_err());
        r.close().unwrap();
        assert!(matches!(r.map(), Err(AdafError::HandleClosed(_))));
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        assert!(FileHandle::open_read(&path).is_err());
    }
}
