//! Record types and their field bindings.
//!
//! A record type describes itself once through a [`SchemaBuilder`]: the
//! collection it lives in, and for each persisted field its storage key,
//! whether it is part of the identifier, accessors, and codec. The builder
//! replaces runtime reflection with a table the compiler checks.
//!
//! ```
//! use docbind::{InstantiationError, Record, SchemaBuilder};
//!
//! #[derive(Default)]
//! struct Player {
//!     unique_id: String,
//!     name: String,
//!     logins: u32,
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
//!             .column("logins", |p: &Player| &p.logins, |p| &mut p.logins)
//!     }
//!
//!     fn instantiate(_: &()) -> Result<Self, InstantiationError> {
//!         Ok(Player::default())
//!     }
//! }
//!
//! let schema = Player::describe().build().unwrap();
//! assert_eq!(schema.collection(), "players");
//! assert_eq!(schema.identifiers().count(), 1);
//! ```

use std::any::type_name;
use std::fmt;

use docbind_store::{validate_collection_name, validate_storage_key, Value};

use crate::codec::{CodecKind, DefaultCodec, FieldCodec, SerializedCodec, Serializer};
use crate::error::{CodecError, InstantiationError, SchemaError};

/// A type the mapper can persist.
pub trait Record: Sized + 'static {
    /// Handle passed to [`Record::instantiate`] when hydrating query results.
    type Context;

    /// Declare the collection and field bindings.
    fn describe() -> SchemaBuilder<Self>;

    /// Construct an empty record whose bound fields hold their defaults.
    fn instantiate(context: &Self::Context) -> Result<Self, InstantiationError>;
}

// ---------------------------------------------------------------------------
// Field bindings
// ---------------------------------------------------------------------------

/// Type-erased access to one field of `R` through its codec.
trait FieldAccess<R>: Send + Sync {
    fn kind(&self) -> CodecKind;
    fn encode(&self, record: &R) -> Result<Value, CodecError>;
    fn decode_into(&self, record: &mut R, wire: &Value) -> Result<(), CodecError>;
}

struct Bound<R, T, C> {
    get: fn(&R) -> &T,
    get_mut: fn(&mut R) -> &mut T,
    codec: C,
}

impl<R, T, C> FieldAccess<R> for Bound<R, T, C>
where
    R: 'static,
    T: 'static,
    C: FieldCodec<T>,
{
    fn kind(&self) -> CodecKind {
        self.codec.kind()
    }

    fn encode(&self, record: &R) -> Result<Value, CodecError> {
        self.codec.encode((self.get)(record))
    }

    fn decode_into(&self, record: &mut R, wire: &Value) -> Result<(), CodecError> {
        let value = self.codec.decode(wire)?;
        *(self.get_mut)(record) = value;
        Ok(())
    }
}

/// One persisted field: storage key, identifier flag, accessor and codec.
pub struct FieldBinding<R> {
    storage_key: String,
    identifier: bool,
    access: Box<dyn FieldAccess<R>>,
}

impl<R> FieldBinding<R> {
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Whether this field is part of the record's lookup key.
    pub fn is_identifier(&self) -> bool {
        self.identifier
    }

    pub fn kind(&self) -> CodecKind {
        self.access.kind()
    }

    /// Encode this field's current value.
    pub fn encode(&self, record: &R) -> Result<Value, CodecError> {
        self.access.encode(record)
    }

    /// Decode `wire` and assign it. On error the field is left untouched.
    pub fn decode_into(&self, record: &mut R, wire: &Value) -> Result<(), CodecError> {
        self.access.decode_into(record, wire)
    }
}

impl<R> fmt::Debug for FieldBinding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("storage_key", &self.storage_key)
            .field("identifier", &self.identifier)
            .field("kind", &self.kind())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Declarative description of a record type, consumed by
/// [`SchemaBuilder::build`].
pub struct SchemaBuilder<R> {
    collection: Option<String>,
    fields: Vec<FieldBinding<R>>,
}

impl<R: 'static> SchemaBuilder<R> {
    pub fn new() -> Self {
        Self {
            collection: None,
            fields: Vec::new(),
        }
    }

    /// Bind the record type to a collection.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Bind an identifier field with its type's default codec.
    pub fn identifier<T: DefaultCodec>(
        self,
        key: impl Into<String>,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        self.bind(key.into(), true, get, get_mut, T::Codec::default())
    }

    /// Bind a value field with its type's default codec.
    pub fn column<T: DefaultCodec>(
        self,
        key: impl Into<String>,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        self.bind(key.into(), false, get, get_mut, T::Codec::default())
    }

    /// Bind an identifier field with an explicit codec.
    pub fn identifier_with<T: 'static, C: FieldCodec<T>>(
        self,
        key: impl Into<String>,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
        codec: C,
    ) -> Self {
        self.bind(key.into(), true, get, get_mut, codec)
    }

    /// Bind a value field with an explicit codec.
    pub fn column_with<T: 'static, C: FieldCodec<T>>(
        self,
        key: impl Into<String>,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
        codec: C,
    ) -> Self {
        self.bind(key.into(), false, get, get_mut, codec)
    }

    /// Bind a value field converted by a custom [`Serializer`].
    pub fn serialized<T: 'static, S: Serializer<T>>(
        self,
        key: impl Into<String>,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
        serializer: S,
    ) -> Self {
        self.bind(key.into(), false, get, get_mut, SerializedCodec(serializer))
    }

    fn bind<T: 'static, C: FieldCodec<T>>(
        mut self,
        storage_key: String,
        identifier: bool,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
        codec: C,
    ) -> Self {
        self.fields.push(FieldBinding {
            storage_key,
            identifier,
            access: Box::new(Bound {
                get,
                get_mut,
                codec,
            }),
        });
        self
    }

    /// Validate the declaration.
    ///
    /// Fails on a missing collection, an invalid name, or a storage key bound
    /// twice. A schema without identifiers is valid here; upsert and delete
    /// reject it.
    pub fn build(self) -> Result<RecordSchema<R>, SchemaError> {
        let type_name = type_name::<R>();
        let collection = self
            .collection
            .ok_or(SchemaError::MissingCollection { type_name })?;
        validate_collection_name(&collection).map_err(|e| SchemaError::InvalidName {
            type_name,
            reason: e.to_string(),
        })?;

        for (i, field) in self.fields.iter().enumerate() {
            validate_storage_key(&field.storage_key).map_err(|e| SchemaError::InvalidName {
                type_name,
                reason: e.to_string(),
            })?;
            if self.fields[..i]
                .iter()
                .any(|f| f.storage_key == field.storage_key)
            {
                return Err(SchemaError::DuplicateStorageKey {
                    type_name,
                    key: field.storage_key.clone(),
                });
            }
        }

        Ok(RecordSchema {
            type_name,
            collection,
            fields: self.fields,
        })
    }
}

impl<R: 'static> Default for SchemaBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Resolved schema
// ---------------------------------------------------------------------------

/// The validated metadata of a record type.
pub struct RecordSchema<R> {
    type_name: &'static str,
    collection: String,
    fields: Vec<FieldBinding<R>>,
}

impl<R> RecordSchema<R> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// All bindings in declaration order.
    pub fn fields(&self) -> &[FieldBinding<R>] {
        &self.fields
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &FieldBinding<R>> {
        self.fields.iter().filter(|f| f.identifier)
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldBinding<R>> {
        self.fields.iter().filter(|f| !f.identifier)
    }

    pub fn binding(&self, storage_key: &str) -> Option<&FieldBinding<R>> {
        self.fields.iter().find(|f| f.storage_key == storage_key)
    }

    pub fn has_identifier(&self) -> bool {
        self.fields.iter().any(|f| f.identifier)
    }

    /// Err unless at least one field is an identifier.
    pub fn require_identifier(&self) -> Result<(), SchemaError> {
        if self.has_identifier() {
            Ok(())
        } else {
            Err(SchemaError::MissingIdentifier {
                type_name: self.type_name,
            })
        }
    }
}

impl<R> fmt::Debug for RecordSchema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("type_name", &self.type_name)
            .field("collection", &self.collection)
            .field("fields", &self.fields)
            .finish()
    }
}
