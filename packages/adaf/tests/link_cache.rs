//! Integration test: link cache bounds and scope isolation.
//!
//! Validates that:
//! - N+1 linked files against capacity N leave exactly N open
//! - the least recently used linked handle is the one evicted
//! - owned handles are never evicted, whatever their count
//! - an isolated scope closes its handles and restores the outer cache

use std::path::PathBuf;
use std::rc::Rc;

use adaf::link::FileHandle;
use adaf::{AdafConfig, LinkCache, LinkScope, OpenMode};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_files(dir: &TempDir, prefix: &str, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.path().join(format!("{prefix}{i}.adaf"));
            std::fs::write(&path, format!("payload {i}")).unwrap();
            path
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests: LRU Bound
// ---------------------------------------------------------------------------

#[test]
fn capacity_bounds_linked_handles() {
    let dir = TempDir::new().unwrap();
    let n = 5;
    let files = make_files(&dir, "linked", n + 1);
    let mut cache = LinkCache::new(n);

    let handles: Vec<_> = files
        .iter()
        .map(|f| cache.open(f, OpenMode::Read).unwrap())
        .collect();

    assert_eq!(cache.len(), n);
    assert!(!handles[0].is_open());
    assert!(handles[1..].iter().all(|h| h.is_open()));
    assert!(!cache.contains(&files[0]));
    assert_eq!(cache.stats().evictions, 1);
    assert_eq!(cache.stats().misses, (n + 1) as u64);
}

#[test]
fn recently_used_handle_survives() {
    let dir = TempDir::new().unwrap();
    let files = make_files(&dir, "linked", 4);
    let mut cache = LinkCache::new(3);

    for f in &files[..3] {
        cache.open(f, OpenMode::Read).unwrap();
    }
    // Touch the oldest so the second one becomes least recently used.
    cache.open(&files[0], OpenMode::Read).unwrap();
    cache.open(&files[3], OpenMode::Read).unwrap();

    assert!(cache.contains(&files[0]));
    assert!(!cache.contains(&files[1]));
    assert!(cache.contains(&files[2]));
    assert!(cache.contains(&files[3]));
}

#[test]
fn owned_handles_never_evicted() {
    let dir = TempDir::new().unwrap();
    let owned_files = make_files(&dir, "owned", 6);
    let linked_files = make_files(&dir, "linked", 4);
    let mut cache = LinkCache::new(2);

    let owned: Vec<_> = owned_files
        .iter()
        .map(|f| {
            let handle = Rc::new(FileHandle::open_read(f).unwrap());
            cache.add(f, handle.clone());
            handle
        })
        .collect();
    for f in &linked_files {
        cache.open(f, OpenMode::Read).unwrap();
    }

    assert_eq!(cache.owned_len(), 6);
    assert_eq!(cache.len(), 2);
    assert!(owned.iter().all(|h| h.is_open()));
    assert_eq!(cache.stats().evictions, 2);

    // Owned handles answer reads without touching the LRU.
    let again = cache.open(&owned_files[0], OpenMode::Read).unwrap();
    assert!(Rc::ptr_eq(&again, &owned[0]));
    assert_eq!(cache.len(), 2);
}

#[test]
fn clear_closes_everything() {
    let dir = TempDir::new().unwrap();
    let files = make_files(&dir, "f", 3);
    let mut cache = LinkCache::new(8);
    let handles: Vec<_> = files
        .iter()
        .map(|f| cache.open(f, OpenMode::Read).unwrap())
        .collect();

    cache.clear().unwrap();
    assert!(cache.is_empty());
    assert!(handles.iter().all(|h| !h.is_open()));
}

// ---------------------------------------------------------------------------
// Tests: Scoping
// ---------------------------------------------------------------------------

#[test]
fn isolated_scope_restores_outer_cache() {
    let dir = TempDir::new().unwrap();
    let files = make_files(&dir, "f", 2);
    let config = AdafConfig {
        link_cache_capacity: 4,
        ..AdafConfig::default()
    };
    let mut scope = LinkScope::from_config(&config);
    let outer = scope.cache_mut().open(&files[0], OpenMode::Read).unwrap();

    let inner = {
        let mut guard = scope.isolated();
        assert_eq!(guard.depth(), 1);
        assert!(!guard.cache().contains(&files[0]));
        let inner = guard.cache_mut().open(&files[1], OpenMode::Read).unwrap();
        assert_eq!(guard.cache().capacity(), 4);
        inner
    };

    assert_eq!(scope.depth(), 0);
    assert!(!inner.is_open());
    assert!(outer.is_open());
    assert!(scope.cache().contains(&files[0]));
    assert!(!scope.cache().contains(&files[1]));
}
