//! The record mapper: upsert, select and delete without query code.
//!
//! # Failure posture
//!
//! Store errors always propagate. Everything else is absorbed in lenient
//! mode (the default) so one malformed field or document never blocks the
//! rest:
//!
//! - a misconfigured record type aborts the call before any store access and
//!   is logged at `error`;
//! - a field that fails to encode is omitted from the write, one that fails
//!   to decode keeps its constructor default; both are logged at `warn`;
//! - a result document whose record cannot be constructed is skipped.
//!
//! Every absorbed problem is listed in the returned report. With
//! [`MapperConfig::strict`] the first one is returned as an error instead.
//!
//! # Upsert atomicity
//!
//! By default upsert probes for the identifier with a `limit(1)` find and
//! then inserts or updates. The two steps are separate store calls: two
//! concurrent upserts of a new identifier can both insert. A unique index on
//! the identifier keys turns the loser into a `DuplicateKey` store error.
//! [`MapperConfig::atomic_upsert`] routes upsert through
//! [`Collection::upsert_one`] instead.

use docbind_store::{Collection, Document, DocumentStore, Filter, FindOptions, UpsertOutcome};
use tracing::{debug, debug_span, error, warn};

use crate::config::MapperConfig;
use crate::error::{AbortReason, MapperError, MapperResult};
use crate::registry::SchemaRegistry;
use crate::report::{SelectReport, SkippedDocument, SkippedField, WriteOutcome, WriteReport};
use crate::schema::{Record, RecordSchema};

/// Maps [`Record`] types onto collections of a [`DocumentStore`].
///
/// Holds no per-call state; share one mapper between threads when the store
/// is `Send + Sync`.
#[derive(Debug)]
pub struct Mapper<S> {
    store: S,
    registry: SchemaRegistry,
    config: MapperConfig,
}

/// Identifier filter and value document of one record.
struct SplitRecord {
    filter: Filter,
    values: Document,
    skipped: Vec<SkippedField>,
}

impl<S: DocumentStore> Mapper<S> {
    /// A lenient mapper with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, MapperConfig::default())
    }

    pub fn with_config(store: S, config: MapperConfig) -> Self {
        Self {
            store,
            registry: SchemaRegistry::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Upsert
    // -----------------------------------------------------------------------

    /// Insert `record`, or merge its value fields into the document with the
    /// same identifier.
    pub fn upsert<R: Record>(&self, record: &R) -> MapperResult<WriteReport> {
        let span = debug_span!("upsert", record = std::any::type_name::<R>());
        let _enter = span.enter();

        let schema = match self.writable_schema::<R>() {
            Ok(schema) => schema,
            Err(reason) => return self.abort("upsert", reason),
        };
        let split = match Self::split(&schema, record) {
            Ok(split) => split,
            Err(reason) => return self.abort("upsert", reason),
        };
        if self.config.strict {
            if let Some(first) = split.skipped.first() {
                return Err(MapperError::Codec {
                    key: first.key.clone(),
                    error: first.error.clone(),
                });
            }
        }
        let collection = self.store.collection(schema.collection())?;

        let outcome = if self.config.atomic_upsert {
            match collection.upsert_one(&split.filter, &split.values)? {
                UpsertOutcome::Inserted => WriteOutcome::Inserted,
                UpsertOutcome::Updated => WriteOutcome::Updated,
            }
        } else {
            probe_then_write(collection.as_ref(), &split.filter, &split.values)?
        };

        debug!(
            collection = schema.collection(),
            filter = %split.filter,
            ?outcome,
            "upsert complete"
        );
        Ok(WriteReport::new(outcome, split.skipped))
    }

    // -----------------------------------------------------------------------
    // Select
    // -----------------------------------------------------------------------

    /// Hydrate every record whose document matches `filter`, in store
    /// iteration order.
    pub fn select<R: Record>(
        &self,
        context: &R::Context,
        filter: &Filter,
    ) -> MapperResult<SelectReport<R>> {
        let span = debug_span!("select", record = std::any::type_name::<R>());
        let _enter = span.enter();

        let schema = match self.registry.resolve::<R>() {
            Ok(schema) => schema,
            Err(e) => {
                error!(error = %e, "select aborted: record type is misconfigured");
                if self.config.strict {
                    return Err(e.into());
                }
                return Ok(SelectReport::aborted(e));
            }
        };

        let collection = self.store.collection(schema.collection())?;
        let mut report = SelectReport::new();

        for (index, doc) in collection.find(filter, FindOptions::new())?.enumerate() {
            let doc = doc?;
            let mut record = match R::instantiate(context) {
                Ok(record) => record,
                Err(e) => {
                    warn!(document = index, error = %e, "skipping document");
                    if self.config.strict {
                        return Err(e.into());
                    }
                    report.skipped_documents.push(SkippedDocument { index, error: e });
                    continue;
                }
            };

            for binding in schema.fields() {
                let key = binding.storage_key();
                let Some(wire) = doc.get(key) else {
                    continue;
                };
                if wire.is_null() {
                    continue;
                }
                if let Err(e) = binding.decode_into(&mut record, wire) {
                    warn!(document = index, field = key, error = %e, "field left at default");
                    if self.config.strict {
                        return Err(MapperError::Codec {
                            key: key.to_string(),
                            error: e,
                        });
                    }
                    report.skipped_fields.push(SkippedField {
                        key: key.to_string(),
                        document: Some(index),
                        error: e,
                    });
                }
            }
            report.records.push(record);
        }

        debug!(
            collection = schema.collection(),
            %filter,
            hydrated = report.records.len(),
            skipped = report.skipped_documents.len(),
            "select complete"
        );
        Ok(report)
    }

    /// Hydrate every record in the type's collection.
    pub fn select_all<R: Record>(&self, context: &R::Context) -> MapperResult<SelectReport<R>> {
        self.select(context, &Filter::new())
    }

    /// The first hydrated record matching `filter`, if any.
    pub fn select_one<R: Record>(
        &self,
        context: &R::Context,
        filter: &Filter,
    ) -> MapperResult<Option<R>> {
        Ok(self.select(context, filter)?.records.into_iter().next())
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Delete one document with `record`'s identifier.
    ///
    /// If the identifier matches several documents, the store picks which
    /// one goes.
    pub fn delete<R: Record>(&self, record: &R) -> MapperResult<WriteReport> {
        let span = debug_span!("delete", record = std::any::type_name::<R>());
        let _enter = span.enter();

        let schema = match self.writable_schema::<R>() {
            Ok(schema) => schema,
            Err(reason) => return self.abort("delete", reason),
        };
        let filter = match identifier_filter(&schema, record) {
            Ok(filter) => filter,
            Err(reason) => return self.abort("delete", reason),
        };

        let collection = self.store.collection(schema.collection())?;
        let deleted = collection.delete_one(&filter)?;
        let outcome = if deleted > 0 {
            WriteOutcome::Deleted
        } else {
            WriteOutcome::NoMatch
        };

        debug!(collection = schema.collection(), %filter, deleted, "delete complete");
        Ok(WriteReport::new(outcome, Vec::new()))
    }

    /// The filter upsert and delete would use for `record`.
    ///
    /// Unlike the write operations this always returns configuration
    /// problems as errors, since there is no report to carry them.
    pub fn identifier_filter<R: Record>(&self, record: &R) -> MapperResult<Filter> {
        let schema = self.writable_schema::<R>()?;
        Ok(identifier_filter(&schema, record)?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn writable_schema<R: Record>(&self) -> Result<std::sync::Arc<RecordSchema<R>>, AbortReason> {
        let schema = self.registry.resolve::<R>()?;
        schema.require_identifier()?;
        Ok(schema)
    }

    fn abort(&self, op: &'static str, reason: AbortReason) -> MapperResult<WriteReport> {
        error!(op, %reason, "operation aborted, nothing written");
        if self.config.strict {
            return Err(reason.into());
        }
        Ok(WriteReport::aborted(reason))
    }

    /// Encode identifiers into a filter and value fields into a document.
    fn split<R: Record>(
        schema: &RecordSchema<R>,
        record: &R,
    ) -> Result<SplitRecord, AbortReason> {
        let filter = identifier_filter(schema, record)?;
        let mut values = Document::new();
        let mut skipped = Vec::new();

        for binding in schema.values() {
            let key = binding.storage_key();
            match binding.encode(record) {
                Ok(wire) => {
                    values.insert(key, wire);
                }
                Err(e) => {
                    warn!(field = key, error = %e, "field omitted from write");
                    skipped.push(SkippedField {
                        key: key.to_string(),
                        document: None,
                        error: e,
                    });
                }
            }
        }

        Ok(SplitRecord {
            filter,
            values,
            skipped,
        })
    }
}

/// Find with `limit(1)`, then insert `filter ++ values` or merge `values`.
fn probe_then_write(
    collection: &dyn Collection,
    filter: &Filter,
    values: &Document,
) -> MapperResult<WriteOutcome> {
    let exists = collection
        .find(filter, FindOptions::new().limit(1))?
        .next()
        .transpose()?
        .is_some();

    if exists {
        if !values.is_empty() {
            collection.update_one(filter, values)?;
        }
        Ok(WriteOutcome::Updated)
    } else {
        let mut doc = filter.to_document();
        doc.merge(values);
        collection.insert_one(doc)?;
        Ok(WriteOutcome::Inserted)
    }
}

/// Build the exact-match filter from a record's identifier fields.
fn identifier_filter<R>(schema: &RecordSchema<R>, record: &R) -> Result<Filter, AbortReason> {
    let mut filter = Filter::new();
    for binding in schema.identifiers() {
        let wire = binding
            .encode(record)
            .map_err(|error| AbortReason::Identifier {
                key: binding.storage_key().to_string(),
                error,
            })?;
        filter.insert(binding.storage_key(), wire);
    }
    Ok(filter)
}
