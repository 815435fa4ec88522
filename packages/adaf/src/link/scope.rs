//! Execution scope owning the active link cache.
//!
//! Nested invocations that must not share handles with their caller enter an
//! isolated scope: a fresh cache is installed and the outer one is restored,
//! after the inner cache is cleared, when the guard drops.

use std::ops::{Deref, DerefMut};

use super::LinkCache;

pub struct LinkScope {
    current: LinkCache,
    saved: Vec<LinkCache>,
    capacity: usize,
}

impl LinkScope {
    pub fn new(capacity: usize) -> Self {
        LinkScope {
            current: LinkCache::new(capacity),
            saved: Vec::new(),
            capacity,
        }
    }

    pub fn from_config(config: &crate::config::AdafConfig) -> Self {
        Self::new(config.link_cache_capacity)
    }

    pub fn cache(&self) -> &LinkCache {
        &self.current
    }

    pub fn cache_mut(&mut self) -> &mut LinkCache {
        &mut self.current
    }

    /// Nesting depth; 0 outside any isolated scope.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Swap in `cache`, returning the one that was active.
    pub fn replace(&mut self, cache: LinkCache) -> LinkCache {
        std::mem::replace(&mut self.current, cache)
    }

    /// Enter a scope with a fresh cache of the same capacity.
    pub fn isolated(&mut self) -> ScopeGuard<'_> {
        let outer = std::mem::replace(&mut self.current, LinkCache::new(self.capacity));
        self.saved.push(outer);
        ScopeGuard { scope: self }
    }
}

pub struct ScopeGuard<'a> {
    scope: &'a mut LinkScope,
}

impl Deref for ScopeGuard<'_> {
    type Target = LinkScope;

    fn deref(&self) -> &LinkScope {
        self.scope
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut LinkScope {
        self.scope
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Some(outer) = self.scope.saved.pop() {
            let mut inner = std::mem::replace(&mut self.scope.current, outer);
            if let Err(e) = inner.clear() {
                tracing::warn!(error = %e, "Failed to clear isolated link cache");
            }
        }
    }
}
