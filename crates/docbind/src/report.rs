//! Structured results of mapper operations.
//!
//! In lenient mode the mapper absorbs configuration, codec and instantiation
//! problems instead of failing. Reports list each absorbed problem so callers
//! can inspect them instead of scraping logs.

use crate::error::{AbortReason, CodecError, InstantiationError, SchemaError};

/// What a write did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Upsert found no document and inserted one.
    Inserted,
    /// Upsert merged the value fields into the existing document.
    Updated,
    /// Delete removed a document.
    Deleted,
    /// Delete found nothing to remove.
    NoMatch,
    /// Nothing was sent to the store.
    Aborted(AbortReason),
}

/// A field that was left at its default (select) or omitted (upsert).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedField {
    pub key: String,
    /// Position of the document in the result stream, for select.
    pub document: Option<usize>,
    pub error: CodecError,
}

/// A result document for which no record could be constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedDocument {
    pub index: usize,
    pub error: InstantiationError,
}

/// Result of an upsert or delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteReport {
    pub outcome: WriteOutcome,
    pub skipped: Vec<SkippedField>,
}

impl WriteReport {
    pub(crate) fn new(outcome: WriteOutcome, skipped: Vec<SkippedField>) -> Self {
        Self { outcome, skipped }
    }

    pub(crate) fn aborted(reason: AbortReason) -> Self {
        Self::new(WriteOutcome::Aborted(reason), Vec::new())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, WriteOutcome::Aborted(_))
    }

    /// Whether the store was changed (or, for an unchanged update, matched).
    pub fn wrote(&self) -> bool {
        matches!(
            self.outcome,
            WriteOutcome::Inserted | WriteOutcome::Updated | WriteOutcome::Deleted
        )
    }

    /// No abort and no skipped fields.
    pub fn is_clean(&self) -> bool {
        !self.is_aborted() && self.skipped.is_empty()
    }
}

/// Result of a select: the hydrated records plus everything skipped.
#[derive(Debug)]
pub struct SelectReport<R> {
    /// Records in store iteration order.
    pub records: Vec<R>,
    pub skipped_fields: Vec<SkippedField>,
    pub skipped_documents: Vec<SkippedDocument>,
    /// Set when the record type is misconfigured; `records` is then empty.
    pub aborted: Option<SchemaError>,
}

impl<R> SelectReport<R> {
    pub(crate) fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped_fields: Vec::new(),
            skipped_documents: Vec::new(),
            aborted: None,
        }
    }

    pub(crate) fn aborted(error: SchemaError) -> Self {
        Self {
            aborted: Some(error),
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Nothing skipped and not aborted.
    pub fn is_clean(&self) -> bool {
        self.aborted.is_none() && self.skipped_fields.is_empty() && self.skipped_documents.is_empty()
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}
