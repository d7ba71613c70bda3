/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A collection name or storage key violates the naming rules.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A write would create a second document with the same unique key.
    #[error("duplicate key in {collection} on ({}): {value}", keys.join(", "))]
    DuplicateKey {
        collection: String,
        keys: Vec<String>,
        value: String,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted collection cannot be decoded.
    #[error("corrupt collection {name}: {reason}")]
    CorruptCollection { name: String, reason: String },

    /// A lock guarding backend state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
