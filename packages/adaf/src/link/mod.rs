//! Link cache: bounded LRU of read-only linked files plus owned handles
//!
//! Owned handles are the files a container reads from or writes to itself;
//! they are never evicted and stay open until closed explicitly. Linked
//! handles are opened only to resolve external raster references and are
//! kept in an LRU bounded by `capacity`. The least recently used linked
//! handle is closed when the bound is exceeded.

pub mod handle;
pub mod scope;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub use handle::{FileHandle, OpenMode, SharedHandle};
pub use scope::{LinkScope, ScopeGuard};

use crate::error::{AdafError, Result};
use crate::storage::directory::RasterLocation;

/// Where a raster's payload actually lives after following links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    pub file: PathBuf,
    pub system: String,
    pub raster: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct LinkCache {
    owned: HashMap<PathBuf, SharedHandle>,
    linked: HashMap<PathBuf, (SharedHandle, u64)>,
    recency: BTreeMap<u64, PathBuf>,
    tick: u64,
    capacity: usize,
    stats: CacheStats,
}

impl LinkCache {
    pub fn new(capacity: usize) -> Self {
        LinkCache {
            owned: HashMap::new(),
            linked: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of linked (evictable) handles.
    pub fn len(&self) -> usize {
        self.linked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linked.is_empty() && self.owned.is_empty()
    }

    pub fn owned_len(&self) -> usize {
        self.owned.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn contains(&self, path: &Path) -> bool {
        let key = normalize_path(path);
        self.owned.contains_key(&key) || self.linked.contains_key(&key)
    }

    /// Open `path`. Read mode reuses an owned or linked handle; a fresh
    /// handle joins the LRU. Other modes are only served for owned handles.
    pub fn open(&mut self, path: &Path, mode: OpenMode) -> Result<SharedHandle> {
        let key = normalize_path(path);
        if let Some(handle) = self.owned.get(&key).filter(|h| h.is_open()) {
            if mode == OpenMode::Read || handle.mode() == mode {
                self.stats.hits += 1;
                return Ok(handle.clone());
            }
        }
        if mode != OpenMode::Read {
            return Err(AdafError::InvalidMode {
                path: key,
                mode: mode.name(),
            });
        }

        if let Some(handle) = self.touch(&key) {
            if handle.is_open() {
                self.stats.hits += 1;
                tracing::debug!(path = %key.display(), "Link cache hit");
                return Ok(handle);
            }
            self.forget(&key);
        }

        self.stats.misses += 1;
        let handle = Rc::new(FileHandle::open_read(&key)?);
        self.tick += 1;
        self.linked.insert(key.clone(), (handle.clone(), self.tick));
        self.recency.insert(self.tick, key);
        self.evict();
        Ok(handle)
    }

    /// Promote `handle` into the owned set, dropping a linked entry of the
    /// same name.
    pub fn add(&mut self, path: &Path, handle: SharedHandle) {
        let key = normalize_path(path);
        if let Some(old) = self.forget(&key) {
            close_replaced(&old, &handle);
        }
        if let Some(old) = self.owned.insert(key, handle.clone()) {
            close_replaced(&old, &handle);
        }
    }

    /// Flush and close the handle for `path`, owned or linked.
    pub fn close(&mut self, path: &Path) -> Result<()> {
        let key = normalize_path(path);
        let handle = match self.owned.remove(&key) {
            Some(h) => Some(h),
            None => self.forget(&key),
        };
        match handle {
            Some(h) => h.close(),
            None => Ok(()),
        }
    }

    /// Close every handle. The first close failure is returned after all
    /// handles have been attempted.
    pub fn clear(&mut self) -> Result<()> {
        let owned = self.owned.drain().map(|(_, h)| h);
        let linked = self.linked.drain().map(|(_, (h, _))| h);
        let mut first_err = None;
        for handle in owned.chain(linked).collect::<Vec<_>>() {
            if let Err(e) = handle.close() {
                tracing::warn!(path = %handle.path().display(), error = %e, "Failed to close handle");
                first_err.get_or_insert(e);
            }
        }
        self.recency.clear();
        first_err.map_or(Ok(()), Err)
    }

    /// Follow external links from `system/raster` in `handle`'s file until
    /// reaching the file that stores the payload.
    pub fn getlink(
        &mut self,
        handle: &SharedHandle,
        system: &str,
        raster: &str,
    ) -> Result<LinkDescriptor> {
        let mut current = handle.clone();
        let mut system = system.to_string();
        let mut raster = raster.to_string();
        let mut visited = HashSet::new();
        loop {
            let file = current.path().to_path_buf();
            if !visited.insert((file.clone(), system.clone(), raster.clone())) {
                return Err(AdafError::LinkCycle(file));
            }
            let directory = current.directory()?;
            match directory.raster(&system, &raster) {
                None => {
                    return Err(AdafError::not_found(
                        "Raster",
                        format!("{system}/{raster} in {}", file.display()),
                    ))
                }
                Some(RasterLocation::Blob(_)) => {
                    return Ok(LinkDescriptor {
                        file,
                        system,
                        raster,
                    })
                }
                Some(RasterLocation::External {
                    file: target,
                    system: s,
                    raster: r,
                }) => {
                    let target = resolve_link(&file, target);
                    system = s.clone();
                    raster = r.clone();
                    current = self.open(&target, OpenMode::Read)?;
                }
            }
        }
    }

    fn touch(&mut self, key: &Path) -> Option<SharedHandle> {
        let (handle, tick) = self.linked.get_mut(key)?;
        self.recency.remove(&*tick);
        self.tick += 1;
        *tick = self.tick;
        self.recency.insert(self.tick, key.to_path_buf());
        Some(handle.clone())
    }

    fn forget(&mut self, key: &Path) -> Option<SharedHandle> {
        let (handle, tick) = self.linked.remove(key)?;
        self.recency.remove(&tick);
        Some(handle)
    }

    fn evict(&mut self) {
        while self.linked.len() > self.capacity {
            let Some((_, key)) = self.recency.pop_first() else {
                break;
            };
            if let Some((handle, _)) = self.linked.remove(&key) {
                self.stats.evictions += 1;
                tracing::debug!(path = %key.display(), "Evicting linked handle");
                if let Err(e) = handle.close() {
                    tracing::warn!(path = %key.display(), error = %e, "Failed to close evicted handle");
                }
            }
        }
    }
}

impl Drop for LinkCache {
    fn drop(&mut self) {
        // clear() already logged each failure
        let _ = self.clear();
    }
}

fn close_replaced(old: &SharedHandle, new: &SharedHandle) {
    if !Rc::ptr_eq(old, new) {
        if let Err(e) = old.close() {
            tracing::warn!(path = %old.path().display(), error = %e, "Failed to close replaced handle");
        }
    }
}

/// Absolute, symlink-free form of `path`. Files that don't exist yet are
/// resolved through their parent directory.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(p) = std::fs::canonicalize(path) {
        return p;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

/// Link targets are stored absolute; relative targets resolve against the
/// directory of the file holding the link.
fn resolve_link(from: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    from.parent()
        .map(|dir| dir.join(target))
        .unwrap_or_else(|| target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch_files(dir: &TempDir, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| {
                let p = dir.path().join(format!("f{i}.bin"));
                std::fs::write(&p, b"payload").unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn test_lru_evicts_oldest() {
        let dir = TempDir::new().unwrap();
        let files = touch_files(&dir, 3);
        let mut cache = LinkCache::new(2);

        let h0 = cache.open(&files[0], OpenMode::Read).unwrap();
        let _h1 = cache.open(&files[1], OpenMode::Read).unwrap();
        let _h2 = cache.open(&files[2], OpenMode::Read).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&files[0]));
        assert!(!h0.is_open());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_hit_refreshes_recency() {
        let dir = TempDir::new().unwrap();
        let files = touch_files(&dir, 3);
        let mut cache = LinkCache::new(2);

        cache.open(&files[0], OpenMode::Read).unwrap();
        cache.open(&files[1], OpenMode::Read).unwrap();
        cache.open(&files[0], OpenMode::Read).unwrap();
        cache.open(&files[2], OpenMode::Read).unwrap();

        assert!(cache.contains(&files[0]));
        assert!(!cache.contains(&files[1]));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_write_mode_needs_owned_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        let mut cache = LinkCache::new(4);

        let err = cache.open(&path, OpenMode::Write).unwrap_err();
        assert_eq!(err.code(), "INVALID_MODE");

        let handle = Rc::new(FileHandle::create(&path).unwrap());
        cache.add(&path, handle.clone());
        let again = cache.open(&path, OpenMode::Write).unwrap();
        assert!(Rc::ptr_eq(&handle, &again));
    }

    #[test]
    fn test_add_replaces_linked_entry() {
        let dir = TempDir::new().unwrap();
        let files = touch_files(&dir, 1);
        let mut cache = LinkCache::new(4);

        let linked = cache.open(&files[0], OpenMode::Read).unwrap();
        let owned = Rc::new(FileHandle::open_read(&files[0]).unwrap());
        cache.add(&files[0], owned.clone());

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.owned_len(), 1);
        assert!(!linked.is_open());
        let got = cache.open(&files[0], OpenMode::Read).unwrap();
        assert!(Rc::ptr_eq(&got, &owned));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let files = touch_files(&dir, 1);
        let mut cache = LinkCache::new(4);

        let h = cache.open(&files[0], OpenMode::Read).unwrap();
        cache.close(&files[0]).unwrap();
        cache.close(&files[0]).unwrap();
        h.close().unwrap();
        assert!(!h.is_open());
        cache.clear().unwrap();
        cache.clear().unwrap();
    }

    #[test]
    fn test_closed_linked_handle_reopened() {
        let dir = TempDir::new().unwrap();
        let files = touch_files(&dir, 1);
        let mut cache = LinkCache::new(4);

        let h = cache.open(&files[0], OpenMode::Read).unwrap();
        h.close().unwrap();
        let again = cache.open(&files[0], OpenMode::Read).unwrap();
        assert!(again.is_open());
        assert!(!Rc::ptr_eq(&h, &again));
    }

    #[test]
    fn test_resolve_link() {
        let from = Path::new("/data/a/file.adaf");
        assert_eq!(resolve_link(from, "/x/y.adaf"), PathBuf::from("/x/y.adaf"));
        assert_eq!(resolve_link(from, "y.adaf"), PathBuf::from("/data/a/y.adaf"));
    }
}
