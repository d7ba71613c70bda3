//! Per-type cache of resolved record schemas.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::SchemaError;
use crate::schema::{Record, RecordSchema};

type CachedSchema = Result<Arc<dyn Any + Send + Sync>, SchemaError>;

/// Resolves [`Record::describe`] once per type and caches the outcome,
/// failures included.
///
/// Resolution is pure, so the cache is an optimisation only: if the lock is
/// poisoned the registry resolves afresh on every call.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<TypeId, CachedSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The schema for `R`, building and caching it on first use.
    pub fn resolve<R: Record>(&self) -> Result<Arc<RecordSchema<R>>, SchemaError> {
        let key = TypeId::of::<R>();
        if let Ok(map) = self.schemas.read() {
            if let Some(cached) = map.get(&key) {
                if let Some(hit) = downcast::<R>(cached) {
                    return hit;
                }
            }
        }

        let built = R::describe().build().map(Arc::new);
        debug!(
            record = std::any::type_name::<R>(),
            ok = built.is_ok(),
            "resolved record schema"
        );
        if let Ok(mut map) = self.schemas.write() {
            let entry = match &built {
                Ok(schema) => Ok(Arc::clone(schema) as Arc<dyn Any + Send + Sync>),
                Err(e) => Err(e.clone()),
            };
            map.insert(key, entry);
        }
        built
    }

    /// Whether `R` has been resolved (successfully or not).
    pub fn is_cached<R: Record>(&self) -> bool {
        self.schemas
            .read()
            .map(|map| map.contains_key(&TypeId::of::<R>()))
            .unwrap_or(false)
    }

    /// Number of cached record types.
    pub fn len(&self) -> usize {
        self.schemas.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cached schema.
    pub fn clear(&self) {
        if let Ok(mut map) = self.schemas.write() {
            map.clear();
        }
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("cached", &self.len())
            .finish()
    }
}

/// `None` if the cached entry is not a schema for `R`.
fn downcast<R: Record>(
    cached: &CachedSchema,
) -> Option<Result<Arc<RecordSchema<R>>, SchemaError>> {
    match cached {
        Ok(any) => Arc::clone(any).downcast::<RecordSchema<R>>().ok().map(Ok),
        Err(e) => Some(Err(e.clone())),
    }
}
