//! The document store and collection traits every backend implements.

use std::sync::Arc;

use crate::document::{Cursor, Document, Filter, FindOptions, UpdateResult, UpsertOutcome};
use crate::error::StoreResult;

/// A database of named document collections.
///
/// Implementations must be safe for concurrent use (`Send + Sync`); the
/// mapper shares one store across every caller.
pub trait DocumentStore: Send + Sync {
    /// Open a collection by name, creating it lazily if it does not exist.
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>>;

    /// Names of all collections that currently hold data, sorted.
    fn collection_names(&self) -> StoreResult<Vec<String>>;

    /// Drop a collection and all its documents. Returns `true` if it existed.
    fn drop_collection(&self, name: &str) -> StoreResult<bool>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>> {
        (**self).collection(name)
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        (**self).collection_names()
    }

    fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        (**self).drop_collection(name)
    }
}

/// A single collection of schemaless documents.
///
/// All implementations must satisfy these invariants:
/// - `find` yields matches in a stable, backend-defined order (insertion
///   order for the bundled backends).
/// - `update_one` is a partial merge into the first match, never a replace.
/// - `delete_one` removes at most one document.
/// - Errors are propagated, never swallowed.
pub trait Collection: Send + Sync {
    /// The collection name.
    fn name(&self) -> &str;

    /// Query documents matching `filter`.
    fn find(&self, filter: &Filter, options: FindOptions) -> StoreResult<Cursor>;

    /// Insert a new document.
    fn insert_one(&self, document: Document) -> StoreResult<()>;

    /// Merge `update` into the first document matching `filter`.
    fn update_one(&self, filter: &Filter, update: &Document) -> StoreResult<UpdateResult>;

    /// Delete the first document matching `filter`. Returns the number
    /// deleted (0 or 1).
    fn delete_one(&self, filter: &Filter) -> StoreResult<u64>;

    /// Fetch the first document matching `filter`.
    fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        self.find(filter, FindOptions::new().limit(1))?
            .next()
            .transpose()
    }

    /// Count documents matching `filter`.
    fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let mut n = 0;
        for doc in self.find(filter, FindOptions::new())? {
            doc?;
            n += 1;
        }
        Ok(n)
    }

    /// Merge `set` into the first match, or insert `filter ++ set` if
    /// nothing matches.
    ///
    /// The default implementation probes then branches and is therefore not
    /// atomic: two concurrent callers can both observe "absent" and both
    /// insert. Backends override this when they can do better.
    fn upsert_one(&self, filter: &Filter, set: &Document) -> StoreResult<UpsertOutcome> {
        if self.find_one(filter)?.is_some() {
            self.update_one(filter, set)?;
            Ok(UpsertOutcome::Updated)
        } else {
            let mut doc = filter.to_document();
            doc.merge(set);
            self.insert_one(doc)?;
            Ok(UpsertOutcome::Inserted)
        }
    }
}
