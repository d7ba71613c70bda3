//! Error types for the mapper.
//!
//! Only [`MapperError`] is ever returned from a mapper call. The other types
//! describe problems the mapper absorbs in lenient mode and lists in its
//! reports; strict mode returns the first of them wrapped in a
//! [`MapperError`].

use docbind_store::StoreError;
use thiserror::Error;

use crate::codec::CodecKind;

/// A record type is missing a required binding or declares an invalid one.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No collection name was declared.
    #[error("no collection binding declared for {type_name}")]
    MissingCollection { type_name: &'static str },

    /// No field is marked as an identifier (required by upsert and delete).
    #[error("no identifier field declared for {type_name}")]
    MissingIdentifier { type_name: &'static str },

    /// Two fields share a storage key.
    #[error("storage key {key:?} is bound twice in {type_name}")]
    DuplicateStorageKey { type_name: &'static str, key: String },

    /// A collection name or storage key violates the store's naming rules.
    #[error("invalid name in {type_name}: {reason}")]
    InvalidName {
        type_name: &'static str,
        reason: String,
    },
}

/// A single field value could not be converted to or from its wire form.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The wire value could not be parsed into the field type.
    #[error("cannot decode {wire} as {kind}: {reason}")]
    Decode {
        kind: CodecKind,
        wire: String,
        reason: String,
    },

    /// The field value could not be rendered to its wire form.
    #[error("cannot encode {kind} value: {reason}")]
    Encode { kind: CodecKind, reason: String },

    /// The wire value has a shape the codec never accepts (array, object).
    #[error("{kind} field does not accept a {found} wire value")]
    Unsupported {
        kind: CodecKind,
        found: &'static str,
    },
}

/// A record could not be constructed for a result document.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("cannot instantiate {type_name}: {reason}")]
pub struct InstantiationError {
    pub type_name: &'static str,
    pub reason: String,
}

impl InstantiationError {
    pub fn new<R>(reason: impl Into<String>) -> Self {
        Self {
            type_name: std::any::type_name::<R>(),
            reason: reason.into(),
        }
    }
}

/// Why a write was abandoned before reaching the store.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AbortReason {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An identifier value could not be encoded, so the target document is
    /// unknown.
    #[error("identifier field {key:?} could not be encoded: {error}")]
    Identifier { key: String, error: CodecError },
}

/// Errors returned by mapper operations.
#[derive(Debug, Error)]
pub enum MapperError {
    /// The store failed; always propagated.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Strict mode: the operation was aborted.
    #[error("operation aborted: {0}")]
    Aborted(#[from] AbortReason),

    /// Strict mode: a field could not be converted.
    #[error("field {key:?}: {error}")]
    Codec {
        key: String,
        #[source]
        error: CodecError,
    },

    /// Strict mode: a result document could not be hydrated.
    #[error(transparent)]
    Instantiation(#[from] InstantiationError),
}

impl From<SchemaError> for MapperError {
    fn from(e: SchemaError) -> Self {
        Self::Aborted(AbortReason::Schema(e))
    }
}

/// Result alias for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

/// Errors from loading a [`MapperConfig`](crate::MapperConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid mapper config: {0}")]
    Parse(#[from] toml::de::Error),
}
