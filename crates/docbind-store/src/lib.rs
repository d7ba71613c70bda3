//! Schemaless document collections for docbind.
//!
//! This crate is the storage boundary of the object-document mapper. It knows
//! nothing about records or field bindings: it stores ordered key/value
//! [`Document`]s in named collections and answers exact-match [`Filter`]
//! queries, the same contract a MongoDB collection offers for
//! `find`/`insertOne`/`updateOne`/`deleteOne`.
//!
//! # Backends
//!
//! All backends implement the [`DocumentStore`] and [`Collection`] traits:
//!
//! - [`InMemoryDocumentStore`] -- `RwLock`-guarded collections for tests and
//!   embedding, with optional unique indexes and operation counters
//! - [`JsonFileStore`] -- one pretty-printed JSON array per collection,
//!   rewritten atomically on every write
//!
//! # Design Rules
//!
//! 1. Documents keep their insertion order, and so do their keys.
//! 2. Filters are exact-match only; the empty filter matches everything.
//! 3. `update_one` merges the given keys into the first match, it never
//!    replaces the whole document.
//! 4. `delete_one` removes at most one document, the first match.
//! 5. All I/O and constraint errors are propagated, never silently ignored.

pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod traits;

pub use document::{Cursor, Document, Filter, FindOptions, UpdateResult, UpsertOutcome, Value};
pub use error::{StoreError, StoreResult};
pub use file::JsonFileStore;
pub use memory::{InMemoryDocumentStore, StatsSnapshot};
pub use names::{validate_collection_name, validate_storage_key};
pub use traits::{Collection, DocumentStore};
