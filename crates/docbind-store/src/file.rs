//! JSON-file document store.
//!
//! Each collection is stored as `<root>/<name>.json`, a pretty-printed JSON
//! array of documents in insertion order. Every write loads the array,
//! applies the change, and replaces the file atomically (temp file in the
//! same directory, then rename), so readers never observe a torn file.
//!
//! Writers take a lock owned by the canonical root directory, so every
//! handle opened on the same root in this process is serialised with the
//! others. Other processes are not coordinated.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::{debug, info};

use crate::document::{Cursor, Document, Filter, FindOptions, UpdateResult, UpsertOutcome};
use crate::error::{StoreError, StoreResult};
use crate::names::validate_collection_name;
use crate::traits::{Collection, DocumentStore};

const EXTENSION: &str = "json";

/// A document store persisted as one JSON file per collection.
///
/// Writers are serialised by a mutex shared with every collection handle and
/// every other store opened on the same root; reads go straight to disk.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let write_lock = root_lock(&root)?;
        info!(root = %root.display(), "json file store opened");
        Ok(Self { root, write_lock })
    }

    /// The directory holding the collection files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{EXTENSION}"))
    }
}

impl DocumentStore for JsonFileStore {
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>> {
        validate_collection_name(name)?;
        Ok(Arc::new(JsonFileCollection {
            name: name.to_string(),
            path: self.path_for(name),
            write_lock: Arc::clone(&self.write_lock),
        }))
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().map(|e| e == EXTENSION).unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        validate_collection_name(name)?;
        let _guard = lock(&self.write_lock)?;
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

struct JsonFileCollection {
    name: String,
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileCollection {
    fn load(&self) -> StoreResult<Vec<Document>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptCollection {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }

    fn save(&self, docs: &[Document]) -> StoreResult<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let bytes = serde_json::to_vec_pretty(docs)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// Run `f` over the loaded documents under the write lock, then persist
    /// if `f` reports a change.
    fn modify<T>(&self, f: impl FnOnce(&mut Vec<Document>) -> (T, bool)) -> StoreResult<T> {
        let _guard = lock(&self.write_lock)?;
        let mut docs = self.load()?;
        let (out, dirty) = f(&mut docs);
        if dirty {
            self.save(&docs)?;
        }
        Ok(out)
    }
}

impl Collection for JsonFileCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, filter: &Filter, options: FindOptions) -> StoreResult<Cursor> {
        let docs = self.load()?;
        let found: Vec<Document> = options
            .window(docs.into_iter().filter(|d| filter.matches(d)))
            .collect();
        debug!(collection = %self.name, %filter, matched = found.len(), "find");
        Ok(Cursor::from_documents(found))
    }

    fn insert_one(&self, document: Document) -> StoreResult<()> {
        self.modify(|docs| {
            docs.push(document);
            ((), true)
        })?;
        debug!(collection = %self.name, "insert_one");
        Ok(())
    }

    fn update_one(&self, filter: &Filter, update: &Document) -> StoreResult<UpdateResult> {
        let result = self.modify(|docs| match docs.iter_mut().find(|d| filter.matches(d)) {
            Some(doc) => {
                let changed = doc.merge(update);
                let result = UpdateResult {
                    matched: 1,
                    modified: u64::from(changed),
                };
                (result, changed)
            }
            None => (UpdateResult::default(), false),
        })?;
        debug!(collection = %self.name, %filter, matched = result.matched, "update_one");
        Ok(result)
    }

    fn delete_one(&self, filter: &Filter) -> StoreResult<u64> {
        let deleted = self.modify(|docs| match docs.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                docs.remove(pos);
                (1, true)
            }
            None => (0, false),
        })?;
        debug!(collection = %self.name, %filter, deleted, "delete_one");
        Ok(deleted)
    }

    /// Atomic with respect to other writers of this store.
    fn upsert_one(&self, filter: &Filter, set: &Document) -> StoreResult<UpsertOutcome> {
        let outcome = self.modify(|docs| match docs.iter_mut().find(|d| filter.matches(d)) {
            Some(doc) => {
                let changed = doc.merge(set);
                (UpsertOutcome::Updated, changed)
            }
            None => {
                let mut doc = filter.to_document();
                doc.merge(set);
                docs.push(doc);
                (UpsertOutcome::Inserted, true)
            }
        })?;
        debug!(collection = %self.name, %filter, ?outcome, "upsert_one");
        Ok(outcome)
    }
}

/// The writer lock for `root`, created on first use.
fn root_lock(root: &Path) -> StoreResult<Arc<Mutex<()>>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let key = fs::canonicalize(root)?;
    let mut locks = lock(LOCKS.get_or_init(Default::default))?;
    Ok(Arc::clone(locks.entry(key).or_default()))
}

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StoreError::LockPoisoned(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("db")).unwrap();
        (dir, store)
    }

    fn profile(id: &str, name: &str) -> Document {
        Document::new().with("uniqueId", id).with("username", name)
    }

    #[test]
    fn open_creates_root() {
        let (dir, store) = temp_store();
        assert!(dir.path().join("db").is_dir());
        assert_eq!(store.root(), dir.path().join("db"));
    }

    #[test]
    fn missing_collection_reads_empty() {
        let (_dir, store) = temp_store();
        let coll = store.collection("players").unwrap();
        assert_eq!(coll.count(&Filter::new()).unwrap(), 0);
        assert!(coll.find_one(&Filter::new()).unwrap().is_none());
    }

    #[test]
    fn documents_persist_across_handles() {
        let (dir, store) = temp_store();
        store
            .collection("players")
            .unwrap()
            .insert_one(profile("u1", "alice"))
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(dir.path().join("db")).unwrap();
        let doc = reopened
            .collection("players")
            .unwrap()
            .find_one(&Filter::new().eq("uniqueId", "u1"))
            .unwrap()
            .unwrap();
        assert_eq!(doc, profile("u1", "alice"));
    }

    #[test]
    fn update_merges_and_persists() {
        let (_dir, store) = temp_store();
        let coll = store.collection("players").unwrap();
        coll.insert_one(profile("u1", "alice")).unwrap();
        let result = coll
            .update_one(
                &Filter::new().eq("uniqueId", "u1"),
                &Document::new().with("username", "bob"),
            )
            .unwrap();
        assert_eq!(result.modified, 1);

        let on_disk = fs::read_to_string(store.path_for("players")).unwrap();
        assert!(on_disk.contains("bob"));
        assert!(!on_disk.contains("alice"));
    }

    #[test]
    fn upsert_and_delete() {
        let (_dir, store) = temp_store();
        let coll = store.collection("players").unwrap();
        let filter = Filter::new().eq("uniqueId", "u1");
        let set = Document::new().with("username", "alice");
        assert_eq!(coll.upsert_one(&filter, &set).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(coll.upsert_one(&filter, &set).unwrap(), UpsertOutcome::Updated);
        assert_eq!(coll.count(&Filter::new()).unwrap(), 1);

        assert_eq!(coll.delete_one(&filter).unwrap(), 1);
        assert_eq!(coll.delete_one(&filter).unwrap(), 0);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (_dir, store) = temp_store();
        fs::write(store.path_for("players"), b"{ not json").unwrap();
        let coll = store.collection("players").unwrap();
        let err = coll.find(&Filter::new(), FindOptions::new()).unwrap_err();
        assert!(matches!(err, StoreError::CorruptCollection { .. }));
    }

    #[test]
    fn collection_names_and_drop() {
        let (_dir, store) = temp_store();
        for name in ["groups", "players"] {
            store
                .collection(name)
                .unwrap()
                .insert_one(Document::new().with("a", 1))
                .unwrap();
        }
        assert_eq!(store.collection_names().unwrap(), vec!["groups", "players"]);
        assert!(store.drop_collection("groups").unwrap());
        assert!(!store.drop_collection("groups").unwrap());
        assert_eq!(store.collection_names().unwrap(), vec!["players"]);
    }

    #[test]
    fn handles_on_one_root_share_the_writer_lock() {
        let (dir, first) = temp_store();
        let second = JsonFileStore::open(dir.path().join("db").join(".")).unwrap();
        assert!(Arc::ptr_eq(&first.write_lock, &second.write_lock));

        let (_other_dir, elsewhere) = temp_store();
        assert!(!Arc::ptr_eq(&first.write_lock, &elsewhere.write_lock));
    }

    #[test]
    fn concurrent_handles_lose_no_inserts() {
        use std::thread;

        let (dir, _store) = temp_store();
        let handles: Vec<_> = (0..2)
            .map(|writer| {
                let root = dir.path().join("db");
                thread::spawn(move || {
                    let store = JsonFileStore::open(root).unwrap();
                    let coll = store.collection("players").unwrap();
                    for i in 0..50 {
                        coll.insert_one(profile(&format!("w{writer}-{i}"), "x"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread should not panic");
        }

        let reopened = JsonFileStore::open(dir.path().join("db")).unwrap();
        let coll = reopened.collection("players").unwrap();
        assert_eq!(coll.count(&Filter::new()).unwrap(), 100);
    }

    #[test]
    fn path_traversal_names_rejected() {
        let (_dir, store) = temp_store();
        assert!(store.collection("../escape").is_err());
    }
}
