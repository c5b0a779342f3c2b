//! The database layer: document identity, revision assignment, tombstones,
//! and update-sequence semantics layered over a fixed vector of
//! `DocumentCollection` shards. `AtomicU64` counters bumped with
//! `fetch_add`/`Ordering::SeqCst` track document counts and the global
//! update sequence lock-free; every other operation goes through the
//! hashed shard it belongs to.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHasher;
use serde_json::Value;

use crate::document::{Document, Revision};
use crate::error::{AvanceError, Result};
use crate::logging::LogLevel;
use crate::options::{DatabaseConfig, PostAllDocumentsOptions};
use crate::shard::DocumentCollection;
use crate::value::body_size;
use crate::{log_debug, log_trace};

/// One input row to `post_bulk_documents`.
#[derive(Debug, Clone)]
pub struct BulkDocumentInput {
    pub id: String,
    /// Required for deletes and for conflict-checked updates; `None` means
    /// "whatever the current revision is" for a plain upsert.
    pub rev: Option<String>,
    pub deleted: bool,
    pub body: Value,
}

impl BulkDocumentInput {
    pub fn insert(id: impl Into<String>, body: Value) -> Self {
        BulkDocumentInput {
            id: id.into(),
            rev: None,
            deleted: false,
            body,
        }
    }

    pub fn delete(id: impl Into<String>, rev: impl Into<String>) -> Self {
        BulkDocumentInput {
            id: id.into(),
            rev: Some(rev.into()),
            deleted: true,
            body: Value::Null,
        }
    }
}

/// One output row of `post_bulk_documents`, in input order.
#[derive(Debug, Clone)]
pub enum BulkItemResult {
    Ok { id: String, rev: String },
    Err { id: String, error: AvanceError },
}

/// What a successfully-applied bulk entry did, so an `all_or_nothing`
/// rollback can compensate it exactly.
enum AppliedOp {
    Inserted,
    Updated(Document),
    Deleted(Document),
    /// A `set` that resurrected an id currently holding a tombstone (its
    /// revision counter reset to `1-`). Rollback must restore the
    /// tombstone itself, not just decrement `doc_count` the way a fresh
    /// `Inserted` rollback does — the id was never absent, so it must not
    /// end up absent after the undo either.
    Resurrected(Document),
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(AvanceError::InvalidArgument("document id must not be empty".into()));
    }
    Ok(())
}

/// A fixed-width array of document-collection shards, plus the global
/// update-sequence and count bookkeeping.
pub struct Database {
    shards: Vec<DocumentCollection>,
    update_sequence: AtomicU64,
    doc_count: AtomicU64,
    doc_del_count: AtomicU64,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        let shards = (0..config.shard_count)
            .map(|_| DocumentCollection::new(config.max_unsorted_entries, config.max_nursery_entries))
            .collect();

        Database {
            shards,
            update_sequence: AtomicU64::new(0),
            doc_count: AtomicU64::new(0),
            doc_del_count: AtomicU64::new(0),
        }
    }

    /// Read-only snapshot of the shard vector, for map/reduce fan-out.
    pub fn shards(&self) -> &[DocumentCollection] {
        &self.shards
    }

    /// Materializes every shard's live documents into its own sorted
    /// vector, one document array per shard for the map/reduce executor.
    /// Each shard is locked only for the duration of its own copy; the
    /// overall snapshot is not a single atomic point across shards.
    pub fn shard_snapshots(&self) -> Vec<Vec<Document>> {
        self.shards
            .iter()
            .map(|s| {
                s.lock()
                    .iter_sorted()
                    .filter(|d| !d.deleted())
                    .cloned()
                    .collect()
            })
            .collect()
    }

    fn shard_for(&self, id: &str) -> &DocumentCollection {
        let mut hasher = AHasher::default();
        hasher.write(id.as_bytes());
        let idx = (hasher.finish() as usize) & (self.shards.len() - 1);
        &self.shards[idx]
    }

    fn next_sequence(&self) -> u64 {
        self.update_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn doc_count(&self) -> u64 {
        self.doc_count.load(Ordering::SeqCst)
    }

    pub fn doc_del_count(&self) -> u64 {
        self.doc_del_count.load(Ordering::SeqCst)
    }

    pub fn update_sequence(&self) -> u64 {
        self.update_sequence.load(Ordering::SeqCst)
    }

    /// Equal to `update_sequence` in this in-memory design — there is no
    /// separate "flushed to disk" point.
    pub fn committed_update_sequence(&self) -> u64 {
        self.update_sequence()
    }

    /// Always 0: purging is a persistence concept and this store has none.
    pub fn purge_sequence(&self) -> u64 {
        0
    }

    /// Always 0: nothing is written to disk.
    pub fn disk_size(&self) -> u64 {
        0
    }

    /// Sum of live document body sizes, computed from the in-memory
    /// representation (there being no on-disk footprint to report).
    pub fn data_size(&self) -> u64 {
        self.shards
            .iter()
            .map(|s| {
                s.lock()
                    .iter_sorted()
                    .filter(|d| !d.deleted())
                    .map(|d| body_size(d.body()) as u64)
                    .sum::<u64>()
            })
            .sum()
    }

    /// Inserts or updates `id` with `body`. A tombstone at `id` is treated
    /// as absent: the revision counter resets to `1-`.
    pub fn set_document(&self, id: &str, body: Value) -> Result<Document> {
        self.set_document_checked(id, body, None)
    }

    /// As `set_document`, but if `expected_rev` is supplied it must equal
    /// the document's current revision (mismatch is a `Conflict`).
    pub fn set_document_checked(
        &self,
        id: &str,
        body: Value,
        expected_rev: Option<&str>,
    ) -> Result<Document> {
        validate_id(id)?;

        let shard = self.shard_for(id);
        let mut guard = shard.lock();

        let existing = guard.find_by_id(id).cloned();
        let (new_num, was_absent, was_tombstone) = match &existing {
            None => (1, true, false),
            Some(d) if d.deleted() => (1, true, true),
            Some(d) => (d.rev().num + 1, false, false),
        };

        if let Some(expected) = expected_rev {
            match &existing {
                Some(d) if !d.deleted() => {
                    if d.rev().to_string() != expected {
                        return Err(AvanceError::Conflict {
                            id: id.to_string(),
                            expected: d.rev().to_string(),
                            actual: expected.to_string(),
                        });
                    }
                }
                _ => {
                    return Err(AvanceError::Conflict {
                        id: id.to_string(),
                        expected: "absent".to_string(),
                        actual: expected.to_string(),
                    });
                }
            }
        }

        let rev = Revision::new(new_num, &body);
        let sequence = self.next_sequence();
        let doc = Document::new_live(id.to_string(), rev, sequence, body);
        guard.insert(doc.clone());
        drop(guard);

        if was_absent {
            self.doc_count.fetch_add(1, Ordering::SeqCst);
            if was_tombstone {
                self.doc_del_count.fetch_sub(1, Ordering::SeqCst);
            }
        }

        log_trace!("set_document {} -> {}", id, doc.rev());
        Ok(doc)
    }

    /// Looks up `id`. A tombstone or missing id is reported as absent; if
    /// `throw_if_missing` is set, absence is an error instead.
    pub fn get_document(&self, id: &str, throw_if_missing: bool) -> Result<Option<Document>> {
        let shard = self.shard_for(id);
        let guard = shard.lock();
        match guard.find_by_id(id) {
            Some(d) if !d.deleted() => Ok(Some(d.clone())),
            _ if throw_if_missing => Err(AvanceError::DocumentMissing { id: id.to_string() }),
            _ => Ok(None),
        }
    }

    /// Replaces the live document at `id` (which must exist with revision
    /// `rev`) with a tombstone.
    pub fn delete_document(&self, id: &str, rev: &str) -> Result<Document> {
        validate_id(id)?;

        let shard = self.shard_for(id);
        let mut guard = shard.lock();

        let existing = guard
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| AvanceError::DocumentMissing { id: id.to_string() })?;

        if existing.deleted() {
            return Err(AvanceError::DocumentMissing { id: id.to_string() });
        }
        if existing.rev().to_string() != rev {
            return Err(AvanceError::Conflict {
                id: id.to_string(),
                expected: existing.rev().to_string(),
                actual: rev.to_string(),
            });
        }

        let new_rev = Revision::new(existing.rev().num + 1, &Value::Null);
        let sequence = self.next_sequence();
        let tombstone = Document::new_tombstone(id.to_string(), new_rev, sequence);
        guard.insert(tombstone.clone());
        drop(guard);

        self.doc_count.fetch_sub(1, Ordering::SeqCst);
        self.doc_del_count.fetch_add(1, Ordering::SeqCst);

        log_debug!("delete_document {} -> {}", id, tombstone.rev());
        Ok(tombstone)
    }

    /// Applies every input row as a set or delete, each under its own
    /// shard lock; no cross-shard atomicity is promised. Returns one
    /// result per input, in input order.
    ///
    /// `all_or_nothing` is honored as a full-batch compensating rollback:
    /// on the first failure, every already-applied row is undone (see
    /// `AppliedOp`) and the result vector — including the failing and any
    /// not-yet-attempted rows as skipped — is returned immediately. This
    /// cannot be a true atomic rollback (there is no log to replay), only
    /// a best-effort undo of the in-memory state this call itself changed.
    pub fn post_bulk_documents(
        &self,
        items: Vec<BulkDocumentInput>,
        all_or_nothing: bool,
    ) -> Vec<BulkItemResult> {
        let mut results = Vec::with_capacity(items.len());
        let mut applied: Vec<(String, AppliedOp)> = Vec::new();

        for item in items {
            if let Err(e) = validate_id(&item.id) {
                results.push(BulkItemResult::Err { id: item.id, error: e });
                if all_or_nothing {
                    self.rollback(applied);
                    return results;
                }
                continue;
            }

            // The raw entry, tombstone included — `get_document` collapses
            // a tombstone to `None`, which would misclassify a
            // resurrecting `set` as a fresh `Inserted` below.
            let prior = self.shard_for(&item.id).lock().find_by_id(&item.id).cloned();

            let outcome = if item.deleted {
                let rev = item.rev.clone().unwrap_or_default();
                self.delete_document(&item.id, &rev)
            } else {
                self.set_document_checked(&item.id, item.body.clone(), item.rev.as_deref())
            };

            match outcome {
                Ok(doc) => {
                    let op = if item.deleted {
                        AppliedOp::Deleted(prior.expect("delete only succeeds on a live prior doc"))
                    } else {
                        match prior {
                            Some(before) if before.deleted() => AppliedOp::Resurrected(before),
                            Some(before) => AppliedOp::Updated(before),
                            None => AppliedOp::Inserted,
                        }
                    };
                    results.push(BulkItemResult::Ok {
                        id: item.id.clone(),
                        rev: doc.rev().to_string(),
                    });
                    applied.push((item.id, op));
                }
                Err(error) => {
                    results.push(BulkItemResult::Err { id: item.id, error });
                    if all_or_nothing {
                        self.rollback(applied);
                        return results;
                    }
                }
            }
        }

        results
    }

    fn rollback(&self, applied: Vec<(String, AppliedOp)>) {
        log_debug!("rolling back {} applied bulk entries", applied.len());
        for (id, op) in applied.into_iter().rev() {
            let shard = self.shard_for(&id);
            let mut guard = shard.lock();
            match op {
                AppliedOp::Inserted => {
                    if let Some(cur) = guard.find_by_id(&id).cloned() {
                        guard.erase(&cur);
                    }
                    drop(guard);
                    self.doc_count.fetch_sub(1, Ordering::SeqCst);
                }
                AppliedOp::Updated(prior) => {
                    guard.insert(prior);
                }
                AppliedOp::Deleted(prior) => {
                    guard.insert(prior);
                    drop(guard);
                    self.doc_count.fetch_add(1, Ordering::SeqCst);
                    self.doc_del_count.fetch_sub(1, Ordering::SeqCst);
                }
                AppliedOp::Resurrected(tombstone) => {
                    guard.insert(tombstone);
                    drop(guard);
                    self.doc_count.fetch_sub(1, Ordering::SeqCst);
                    self.doc_del_count.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    /// Materializes the documents matching `options.keys` (if given) or
    /// all live documents, applies `descending`, then `skip`, then
    /// `limit`. Returns the result list plus the database's totals at
    /// snapshot time.
    pub fn post_documents(&self, options: &PostAllDocumentsOptions) -> (Vec<Document>, u64, u64) {
        let total = self.doc_count();
        let seq = self.update_sequence();

        let mut docs: Vec<Document> = if let Some(keys) = &options.keys {
            keys.iter()
                .filter_map(|id| {
                    let shard = self.shard_for(id);
                    let guard = shard.lock();
                    guard.find_by_id(id).filter(|d| !d.deleted()).cloned()
                })
                .collect()
        } else {
            let mut all: Vec<Document> = self
                .shards
                .iter()
                .flat_map(|s| {
                    let guard = s.lock();
                    guard.iter_sorted().filter(|d| !d.deleted()).cloned().collect::<Vec<_>>()
                })
                .collect();
            all.sort();
            all
        };

        if options.descending {
            docs.reverse();
        }

        let skipped = docs.into_iter().skip(options.skip);
        let limited: Vec<Document> = match options.limit {
            Some(l) => skipped.take(l).collect(),
            None => skipped.collect(),
        };

        log_trace!(
            "post_documents: {} rows (skip={}, limit={:?}, descending={})",
            limited.len(),
            options.skip,
            options.limit,
            options.descending
        );

        (limited, total, seq)
    }

    /// Convenience for callers that want to raise the log threshold, since
    /// there's no CLI/config layer in this core to do it for them.
    pub fn set_log_level(level: LogLevel) {
        crate::logging::set_log_level(level);
    }
}
