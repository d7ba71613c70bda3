//! In-memory document store with unique indexes and operation counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::document::{Cursor, Document, Filter, FindOptions, UpdateResult, UpsertOutcome, Value};
use crate::error::{StoreError, StoreResult};
use crate::names::{validate_collection_name, validate_storage_key};
use crate::traits::{Collection, DocumentStore};

/// In-memory document store.
///
/// Intended for tests and embedding. Collections live in a `HashMap` behind
/// a `RwLock`; each collection keeps its documents in insertion order behind
/// its own `RwLock`. Documents are cloned on read and write.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Arc<InMemoryCollection>>>,
    stats: Arc<OpCounters>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            stats: Arc::new(OpCounters::default()),
        }
    }

    /// Reject writes that would give two documents in `collection` equal
    /// values for all of `keys`. Missing keys compare as `null`.
    pub fn create_unique_index(&self, collection: &str, keys: &[&str]) -> StoreResult<()> {
        for key in keys {
            validate_storage_key(key)?;
        }
        let coll = self.open(collection)?;
        let index: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

        let docs = read_lock(&coll.documents)?;
        for (i, doc) in docs.iter().enumerate() {
            if let Some(dup) = docs[..i].iter().find(|other| same_key(&index, doc, other)) {
                return Err(duplicate(&coll.name, &index, dup));
            }
        }
        drop(docs);

        write_lock(&coll.unique_indexes)?.push(index);
        Ok(())
    }

    /// Counts of operations issued against this store so far.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Total number of documents across all collections.
    pub fn document_count(&self) -> usize {
        match self.collections.read() {
            Ok(map) => map
                .values()
                .map(|c| c.documents.read().map(|d| d.len()).unwrap_or(0))
                .sum(),
            Err(_) => 0,
        }
    }

    /// Snapshot of every document in a collection, in insertion order.
    pub fn dump(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let map = read_lock(&self.collections)?;
        match map.get(collection) {
            Some(coll) => Ok(read_lock(&coll.documents)?.clone()),
            None => Ok(Vec::new()),
        }
    }

    fn open(&self, name: &str) -> StoreResult<Arc<InMemoryCollection>> {
        validate_collection_name(name)?;
        if let Some(coll) = read_lock(&self.collections)?.get(name) {
            return Ok(Arc::clone(coll));
        }
        let mut map = write_lock(&self.collections)?;
        let coll = map.entry(name.to_string()).or_insert_with(|| {
            Arc::new(InMemoryCollection {
                name: name.to_string(),
                documents: RwLock::new(Vec::new()),
                unique_indexes: RwLock::new(Vec::new()),
                stats: Arc::clone(&self.stats),
            })
        });
        Ok(Arc::clone(coll))
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>> {
        let coll: Arc<dyn Collection> = self.open(name)?;
        Ok(coll)
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        let map = read_lock(&self.collections)?;
        let mut names = Vec::new();
        for (name, coll) in map.iter() {
            if !read_lock(&coll.documents)?.is_empty() {
                names.push(name.clone());
            }
        }
        names.sort();
        Ok(names)
    }

    fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        let mut map = write_lock(&self.collections)?;
        Ok(map.remove(name).is_some())
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.document_count();
        f.debug_struct("InMemoryDocumentStore")
            .field("document_count", &count)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

struct InMemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
    unique_indexes: RwLock<Vec<Vec<String>>>,
    stats: Arc<OpCounters>,
}

impl InMemoryCollection {
    /// Check `candidate` against every unique index, ignoring the document
    /// at `skip` (the one being updated).
    fn check_unique(
        &self,
        docs: &[Document],
        candidate: &Document,
        skip: Option<usize>,
    ) -> StoreResult<()> {
        let indexes = read_lock(&self.unique_indexes)?;
        for index in indexes.iter() {
            let clash = docs
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, other)| same_key(index, candidate, other));
            if clash {
                return Err(duplicate(&self.name, index, candidate));
            }
        }
        Ok(())
    }

    fn insert_locked(&self, docs: &mut Vec<Document>, document: Document) -> StoreResult<()> {
        self.check_unique(docs, &document, None)?;
        docs.push(document);
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn update_locked(
        &self,
        docs: &mut [Document],
        pos: usize,
        update: &Document,
    ) -> StoreResult<bool> {
        let mut merged = docs[pos].clone();
        let changed = merged.merge(update);
        if changed {
            self.check_unique(docs, &merged, Some(pos))?;
            docs[pos] = merged;
        }
        self.stats.updates.fetch_add(1, Ordering::Relaxed);
        Ok(changed)
    }
}

impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, filter: &Filter, options: FindOptions) -> StoreResult<Cursor> {
        let docs = read_lock(&self.documents)?;
        let found: Vec<Document> = options
            .window(docs.iter().filter(|d| filter.matches(d)))
            .cloned()
            .collect();
        self.stats.finds.fetch_add(1, Ordering::Relaxed);
        debug!(collection = %self.name, %filter, matched = found.len(), "find");
        Ok(Cursor::from_documents(found))
    }

    fn insert_one(&self, document: Document) -> StoreResult<()> {
        let mut docs = write_lock(&self.documents)?;
        self.insert_locked(&mut docs, document)?;
        debug!(collection = %self.name, "insert_one");
        Ok(())
    }

    fn update_one(&self, filter: &Filter, update: &Document) -> StoreResult<UpdateResult> {
        let mut docs = write_lock(&self.documents)?;
        let result = match docs.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                let changed = self.update_locked(&mut docs, pos, update)?;
                UpdateResult {
                    matched: 1,
                    modified: u64::from(changed),
                }
            }
            None => UpdateResult::default(),
        };
        debug!(collection = %self.name, %filter, matched = result.matched, "update_one");
        Ok(result)
    }

    fn delete_one(&self, filter: &Filter) -> StoreResult<u64> {
        let mut docs = write_lock(&self.documents)?;
        let deleted = match docs.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                docs.remove(pos);
                self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                1
            }
            None => 0,
        };
        debug!(collection = %self.name, %filter, deleted, "delete_one");
        Ok(deleted)
    }

    /// Atomic: the probe and the write happen under one write lock.
    fn upsert_one(&self, filter: &Filter, set: &Document) -> StoreResult<UpsertOutcome> {
        let mut docs = write_lock(&self.documents)?;
        self.stats.finds.fetch_add(1, Ordering::Relaxed);
        let outcome = match docs.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                self.update_locked(&mut docs, pos, set)?;
                UpsertOutcome::Updated
            }
            None => {
                let mut doc = filter.to_document();
                doc.merge(set);
                self.insert_locked(&mut docs, doc)?;
                UpsertOutcome::Inserted
            }
        };
        debug!(collection = %self.name, %filter, ?outcome, "upsert_one");
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Operation counters
// ---------------------------------------------------------------------------

#[derive(Default)]
struct OpCounters {
    finds: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

impl OpCounters {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            finds: self.finds.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time operation counts of an [`InMemoryDocumentStore`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub finds: u64,
    pub inserts: u64,
    /// Update calls that matched a document.
    pub updates: u64,
    /// Delete calls that removed a document.
    pub deletes: u64,
}

impl StatsSnapshot {
    /// Inserts + updates + deletes.
    pub fn writes(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn key_value<'a>(doc: &'a Document, key: &str) -> &'a Value {
    doc.get(key).unwrap_or(&Value::Null)
}

fn same_key(index: &[String], a: &Document, b: &Document) -> bool {
    index.iter().all(|k| key_value(a, k) == key_value(b, k))
}

fn duplicate(collection: &str, index: &[String], doc: &Document) -> StoreError {
    let value: Document = index
        .iter()
        .map(|k| (k.clone(), key_value(doc, k).clone()))
        .collect();
    StoreError::DuplicateKey {
        collection: collection.to_string(),
        keys: index.to_vec(),
        value: value.to_string(),
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| StoreError::LockPoisoned(e.to_string()))
}

fn write_lock<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| StoreError::LockPoisoned(e.to_string()))
}
