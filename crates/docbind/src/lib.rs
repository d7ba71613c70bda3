//! Declarative object-document mapping.
//!
//! A record type declares once which collection it lives in and how each of
//! its fields maps to a storage key. The [`Mapper`] then upserts, selects
//! and deletes records against any [`DocumentStore`] with no query code at
//! the call site.
//!
//! ```
//! use docbind::{InstantiationError, Mapper, Record, SchemaBuilder, WriteOutcome};
//! use docbind::store::{Filter, InMemoryDocumentStore};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Player {
//!     unique_id: String,
//!     name: String,
//! }
//!
//! impl Record for Player {
//!     type Context = ();
//!
//!     fn describe() -> SchemaBuilder<Self> {
//!         SchemaBuilder::new()
//!             .collection("players")
//!             .identifier("uniqueId", |p: &Player| &p.unique_id, |p| &mut p.unique_id)
//!             .column("username", |p: &Player| &p.name, |p| &mut p.name)
//!     }
//!
//!     fn instantiate(_: &()) -> Result<Self, InstantiationError> {
//!         Ok(Player::default())
//!     }
//! }
//!
//! let mapper = Mapper::new(InMemoryDocumentStore::new());
//! let mut alice = Player { unique_id: "abc-1".into(), name: "Alice".into() };
//! assert_eq!(mapper.upsert(&alice).unwrap().outcome, WriteOutcome::Inserted);
//!
//! alice.name = "Bob".into();
//! assert_eq!(mapper.upsert(&alice).unwrap().outcome, WriteOutcome::Updated);
//!
//! let found = mapper
//!     .select_one::<Player>(&(), &Filter::new().eq("uniqueId", "abc-1"))
//!     .unwrap();
//! assert_eq!(found, Some(alice));
//! ```
//!
//! # Crate Layout
//!
//! - [`schema`] -- the [`Record`] trait and the [`SchemaBuilder`] field table
//! - [`codec`] -- field codecs between native values and wire values
//! - [`registry`] -- per-type schema cache
//! - [`mapper`] -- the three operations and their failure posture
//! - [`report`] -- structured results, including everything skipped
//! - [`config`] -- [`MapperConfig`] and its TOML form
//!
//! Storage backends live in the `docbind-store` crate, re-exported here as
//! [`store`].

pub mod codec;
pub mod config;
pub mod error;
pub mod mapper;
pub mod registry;
pub mod report;
pub mod schema;

pub use docbind_store as store;

pub use codec::{
    CodecKind, DefaultCodec, FieldCodec, IdentifierCodec, NullableCodec, ParseCodec, Scalar,
    ScalarCodec, SerializedCodec, Serializer, SerializerError, NULL_MARKER,
};
pub use config::MapperConfig;
pub use error::{
    AbortReason, CodecError, ConfigError, InstantiationError, MapperError, MapperResult,
    SchemaError,
};
pub use mapper::Mapper;
pub use registry::SchemaRegistry;
pub use report::{SelectReport, SkippedDocument, SkippedField, WriteOutcome, WriteReport};
pub use schema::{FieldBinding, Record, RecordSchema, SchemaBuilder};
pub use store::{Document, DocumentStore, Filter};
