//! # Document store
//!
//! Capability boundary toward the hosted document database. The rest of the
//! crate only depends on what is listed here: point reads, filtered/ordered/
//! limited queries with cursor continuation, and atomic write batches with
//! server timestamps and counter increments.
//!
//! Subcollections are addressed as slash-joined collection paths, e.g.
//! `users/{uid}/liked`. The store assigns no ids; callers pick document ids.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

pub mod memory;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Lt(String, Value),
}

/// Opaque continuation marker pointing at the last document a query
/// returned. Feeding it back via [`Query::start_after`] resumes the scan
/// strictly after that document.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub(crate) order_key: Value,
    pub(crate) doc_id: String,
}

impl Cursor {
    pub(crate) fn after(doc: &Document, order_field: &str) -> Self {
        Self {
            order_key: doc.fields.get(order_field).cloned().unwrap_or(Value::Null),
            doc_id: doc.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
    pub start_after: Option<Cursor>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Set(Value),
    /// Resolved by the store at commit time.
    ServerTimestamp,
    /// Atomic counter move; a missing field counts as zero.
    Increment(i64),
}

pub fn set(key: &str, value: Value) -> (String, FieldValue) {
    (key.to_string(), FieldValue::Set(value))
}

pub fn server_timestamp(key: &str) -> (String, FieldValue) {
    (key.to_string(), FieldValue::ServerTimestamp)
}

pub fn increment(key: &str, delta: i64) -> (String, FieldValue) {
    (key.to_string(), FieldValue::Increment(delta))
}

#[derive(Debug, Clone)]
pub enum Write {
    Create {
        path: DocPath,
        fields: Vec<(String, FieldValue)>,
    },
    Update {
        path: DocPath,
        fields: Vec<(String, FieldValue)>,
    },
    Delete {
        path: DocPath,
    },
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>, StoreError>;

    /// Applies the whole batch or nothing. Updating a document that does not
    /// exist fails the batch.
    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;
}
