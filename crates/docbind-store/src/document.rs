//! Wire documents and the exact-match query types built on them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::StoreResult;

/// A wire value: string, number, boolean, null (or a nested value written by
/// a foreign client).
pub use serde_json::Value;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A schemaless document: an insertion-ordered mapping from storage key to
/// wire value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for literals in tests and filters.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String contents of a key, if the key holds a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge every key of `update` into this document (`$set` semantics).
    ///
    /// Returns `true` if any stored value changed.
    pub fn merge(&mut self, update: &Document) -> bool {
        let mut changed = false;
        for (key, value) in update.iter() {
            if self.fields.get(key) != Some(value) {
                self.fields.insert(key.to_string(), value.clone());
                changed = true;
            }
        }
        changed
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.fields).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Exact-match search criteria: every key must hold exactly the given value.
///
/// A `null` criterion also matches documents where the key is absent. The
/// empty filter matches every document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    criteria: Map<String, Value>,
}

impl Filter {
    /// The empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style criterion.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.criteria.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.criteria.get(key)
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.criteria.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether `doc` satisfies every criterion.
    pub fn matches(&self, doc: &Document) -> bool {
        self.criteria.iter().all(|(key, expected)| match doc.get(key) {
            Some(actual) => actual == expected,
            None => expected.is_null(),
        })
    }

    /// The criteria as a document, in criterion order.
    pub fn to_document(&self) -> Document {
        self.criteria
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl From<Document> for Filter {
    fn from(doc: Document) -> Self {
        Self {
            criteria: doc.fields,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.criteria).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

// ---------------------------------------------------------------------------
// Query options and results
// ---------------------------------------------------------------------------

/// Options for [`Collection::find`](crate::Collection::find).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of matching documents to skip first.
    pub skip: usize,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Apply skip and limit to a stream of matches.
    pub(crate) fn window<I: Iterator>(&self, matches: I) -> impl Iterator<Item = I::Item> {
        matches.skip(self.skip).take(self.limit.unwrap_or(usize::MAX))
    }
}

/// Result of a partial update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents matched by the filter (0 or 1).
    pub matched: u64,
    /// Documents whose stored values actually changed (0 or 1).
    pub modified: u64,
}

/// Which branch an upsert took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Iterator over the documents returned by a query.
///
/// Backends that stream from a server yield errors mid-iteration; the
/// bundled backends materialise matches up front.
pub struct Cursor {
    inner: Box<dyn Iterator<Item = StoreResult<Document>> + Send>,
}

impl Cursor {
    /// Wrap an arbitrary result stream.
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = StoreResult<Document>> + Send + 'static,
    {
        Self {
            inner: Box::new(iter),
        }
    }

    /// A cursor over already-fetched documents.
    pub fn from_documents(docs: Vec<Document>) -> Self {
        Self::new(docs.into_iter().map(Ok))
    }

    /// Drain the cursor, stopping at the first error.
    pub fn try_collect(self) -> StoreResult<Vec<Document>> {
        self.collect()
    }
}

impl Iterator for Cursor {
    type Item = StoreResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_preserves_insertion_order() {
        let doc = Document::new()
            .with("zeta", "1")
            .with("alpha", "2")
            .with("mid", "3");
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn merge_sets_only_given_keys() {
        let mut doc = Document::new().with("id", "abc-1").with("name", "Alice");
        let changed = doc.merge(&Document::new().with("name", "Bob"));
        assert!(changed);
        assert_eq!(doc.get_str("id"), Some("abc-1"));
        assert_eq!(doc.get_str("name"), Some("Bob"));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn merge_with_same_values_reports_unchanged() {
        let mut doc = Document::new().with("name", "Alice");
        assert!(!doc.merge(&Document::new().with("name", "Alice")));
    }

    #[test]
    fn merge_appends_new_keys() {
        let mut doc = Document::new().with("id", "x");
        doc.merge(&Document::new().with("rank", 3));
        assert_eq!(doc.get("rank"), Some(&json!(3)));
    }

    #[test]
    fn remove_keeps_order_of_remaining_keys() {
        let mut doc = Document::new().with("a", 1).with("b", 2).with("c", 3);
        doc.remove("b");
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&Document::new()));
        assert!(Filter::new().matches(&Document::new().with("a", 1)));
    }

    #[test]
    fn filter_requires_every_criterion() {
        let doc = Document::new().with("server", "hub").with("name", "admin");
        assert!(Filter::new().eq("server", "hub").matches(&doc));
        assert!(Filter::new()
            .eq("server", "hub")
            .eq("name", "admin")
            .matches(&doc));
        assert!(!Filter::new()
            .eq("server", "hub")
            .eq("name", "mod")
            .matches(&doc));
    }

    #[test]
    fn filter_is_type_exact() {
        let doc = Document::new().with("level", "5");
        assert!(!Filter::new().eq("level", 5).matches(&doc));
        assert!(Filter::new().eq("level", "5").matches(&doc));
    }

    #[test]
    fn null_criterion_matches_absent_key() {
        let doc = Document::new().with("a", 1);
        assert!(Filter::new().eq("missing", Value::Null).matches(&doc));
        assert!(!Filter::new().eq("a", Value::Null).matches(&doc));
    }

    #[test]
    fn filter_round_trips_through_document() {
        let filter = Filter::new().eq("id", "abc-1").eq("server", "hub");
        let back = Filter::from(filter.to_document());
        assert_eq!(back, filter);
    }

    #[test]
    fn document_serializes_as_plain_object() {
        let doc = Document::new().with("id", "abc-1").with("n", 2);
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"id":"abc-1","n":2}"#);
        assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn find_options_window() {
        let opts = FindOptions::new().skip(1).limit(2);
        let got: Vec<i32> = opts.window(1..=5).collect();
        assert_eq!(got, vec![2, 3]);

        let unbounded: Vec<i32> = FindOptions::new().window(1..=3).collect();
        assert_eq!(unbounded, vec![1, 2, 3]);
    }

    #[test]
    fn cursor_yields_documents_in_order() {
        let docs = vec![Document::new().with("i", 1), Document::new().with("i", 2)];
        let cursor = Cursor::from_documents(docs.clone());
        assert_eq!(cursor.try_collect().unwrap(), docs);
    }
}
