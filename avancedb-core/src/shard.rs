//! A document-collection shard: one `LazyFlatSet<Document>` guarded by a
//! `parking_lot::Mutex`, with cache-line padding so adjacent shards in the
//! database's shard array don't false-share.

use parking_lot::{Mutex, MutexGuard};

use crate::document::Document;
use crate::lfs::LazyFlatSet;

/// One shard of the database: a mutex-guarded `LazyFlatSet<Document>`.
///
/// Rather than exposing raw `lock`/`try_lock`/`unlock` the way the C++
/// original does (so that iteration can span many calls without manual
/// pairing), this hands out a `ShardGuard` that borrows the shard for as
/// long as the caller holds it — equivalent safety, no unpaired unlock.
pub struct DocumentCollection {
    lfs: Mutex<LazyFlatSet<Document>>,
    // Cache-line isolation: a `Vec<DocumentCollection>` shard array must not
    // let two adjacent shards' mutexes share a cache line under contention.
    _padding: [u8; 64],
}

impl DocumentCollection {
    pub fn new(max_unsorted: usize, max_nursery: usize) -> Self {
        DocumentCollection {
            lfs: Mutex::new(LazyFlatSet::new(max_unsorted, max_nursery)),
            _padding: [0; 64],
        }
    }

    /// Acquires the shard's mutex, blocking until available.
    pub fn lock(&self) -> ShardGuard<'_> {
        ShardGuard {
            guard: self.lfs.lock(),
        }
    }

    /// Acquires the shard's mutex without blocking, if immediately available.
    pub fn try_lock(&self) -> Option<ShardGuard<'_>> {
        self.lfs.try_lock().map(|guard| ShardGuard { guard })
    }

    /// Snapshots the shard's documents into a fresh vector; acquires and
    /// releases the mutex internally.
    pub fn copy(&self, sort: bool) -> Vec<Document> {
        self.lfs.lock().copy(sort)
    }

    pub fn len(&self) -> usize {
        self.lfs.lock().len()
    }
}

/// A held lock over one shard's `LazyFlatSet<Document>`. All mutating
/// operations and iteration go through this handle.
pub struct ShardGuard<'a> {
    guard: MutexGuard<'a, LazyFlatSet<Document>>,
}

impl ShardGuard<'_> {
    pub fn insert(&mut self, doc: Document) {
        self.guard.insert(doc);
    }

    pub fn erase(&mut self, doc: &Document) -> usize {
        self.guard.erase(doc)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Document> {
        self.guard.find_by(|d| d.id().as_bytes().cmp(id.as_bytes()))
    }

    pub fn copy(&self, sort: bool) -> Vec<Document> {
        self.guard.copy(sort)
    }

    pub fn iter_sorted(&self) -> impl Iterator<Item = &Document> {
        self.guard.iter_sorted()
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }
}
