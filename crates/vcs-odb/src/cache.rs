//! Bounded cache of parsed objects.

use std::num::NonZeroUsize;

use lru::LruCache;
use vcs_hash::ObjectId;
use vcs_object::Object;

/// Least-recently-used eviction; a capacity of zero disables caching.
pub(crate) struct ObjectCache {
    entries: Option<LruCache<ObjectId, Object>>,
}

impl ObjectCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub(crate) fn resize(&mut self, capacity: usize) {
        match (NonZeroUsize::new(capacity), self.entries.as_mut()) {
            (Some(cap), Some(entries)) => entries.resize(cap),
            (cap, _) => self.entries = cap.map(LruCache::new),
        }
    }

    pub(crate) fn get(&mut self, oid: &ObjectId) -> Option<Object> {
        self.entries.as_mut()?.get(oid).cloned()
    }

    pub(crate) fn insert(&mut self, oid: ObjectId, obj: Object) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(oid, obj);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }
}
