//! In-memory store with the full query and batch semantics. Backs the test
//! suite and the importer harness.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::clock::Clock;
use crate::error::StoreError;

use super::{Cursor, Direction, DocPath, Document, FieldValue, Fields, Filter, Query, Store, Write};

pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    collections: Mutex<HashMap<String, BTreeMap<String, Fields>>>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            collections: Mutex::new(HashMap::new()),
        }
    }
}

fn apply_fields(clock: &dyn Clock, doc: &mut Fields, fields: Vec<(String, FieldValue)>) {
    for (key, value) in fields {
        let resolved = match value {
            FieldValue::Set(value) => value,
            FieldValue::ServerTimestamp => Value::from(clock.now_ms() as i64),
            FieldValue::Increment(delta) => {
                let current = doc.get(&key).and_then(Value::as_i64).unwrap_or(0);
                Value::from(current + delta)
            }
        };
        doc.insert(key, resolved);
    }
}

/// Total order over field values: null < bool < number < string. Queries
/// only ever order by one scalar field, which keeps this sufficient.
fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (a, b) => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        _ => 4,
    }
}

fn matches(fields: &Fields, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(key, expected) => fields.get(key) == Some(expected),
        // A document without the field never matches a range filter.
        Filter::Lt(key, bound) => fields
            .get(key)
            .is_some_and(|value| value_cmp(value, bound) == Ordering::Less),
    }
}

/// Strictly-after test for cursor continuation, with the document id as the
/// tie-breaker so equal order keys still page deterministically.
fn past_cursor(key: &Value, id: &str, cursor: &Cursor, direction: Direction) -> bool {
    match value_cmp(key, &cursor.order_key) {
        Ordering::Equal => id > cursor.doc_id.as_str(),
        Ordering::Less => direction == Direction::Descending,
        Ordering::Greater => direction == Direction::Ascending,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.lock().unwrap();

        Ok(collections
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .map(|fields| Document {
                id: path.id.clone(),
                fields: fields.clone(),
            }))
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.lock().unwrap();

        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| query.filters.iter().all(|f| matches(fields, f)))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let Some((field, direction)) = &query.order_by {
            // Documents missing the order field drop out of an ordered scan.
            docs.retain(|doc| doc.fields.contains_key(field));
            // The direction applies to the order key only; ties always fall
            // back to ascending document id, matching the cursor predicate.
            docs.sort_by(|a, b| {
                let keys = value_cmp(
                    a.fields.get(field).unwrap_or(&Value::Null),
                    b.fields.get(field).unwrap_or(&Value::Null),
                );
                let keys = match direction {
                    Direction::Ascending => keys,
                    Direction::Descending => keys.reverse(),
                };
                keys.then_with(|| a.id.cmp(&b.id))
            });

            if let Some(cursor) = &query.start_after {
                let direction = *direction;
                let field = field.clone();
                docs.retain(|doc| {
                    past_cursor(
                        doc.fields.get(&field).unwrap_or(&Value::Null),
                        &doc.id,
                        cursor,
                        direction,
                    )
                });
            }
        }

        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }

        Ok(docs)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().unwrap();

        // Validate the batch up front so it applies atomically or not at all.
        for write in &writes {
            if let Write::Update { path, .. } = write {
                let exists = collections
                    .get(&path.collection)
                    .is_some_and(|docs| docs.contains_key(&path.id));
                if !exists {
                    return Err(StoreError::NotFound(path.to_string()));
                }
            }
        }

        for write in writes {
            match write {
                Write::Create { path, fields } => {
                    let doc = collections
                        .entry(path.collection)
                        .or_default()
                        .entry(path.id)
                        .or_default();
                    apply_fields(self.clock.as_ref(), doc, fields);
                }
                Write::Update { path, fields } => {
                    let doc = collections
                        .get_mut(&path.collection)
                        .and_then(|docs| docs.get_mut(&path.id))
                        .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
                    apply_fields(self.clock.as_ref(), doc, fields);
                }
                Write::Delete { path } => {
                    if let Some(docs) = collections.get_mut(&path.collection) {
                        docs.remove(&path.id);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::clock::ManualClock;
    use crate::store::{
        increment, set, server_timestamp, Cursor, Direction, DocPath, Filter, Query, Store, Write,
    };

    use super::MemoryStore;

    fn store() -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(50_000));
        let store = MemoryStore::new(clock.clone());
        (clock, store)
    }

    async fn seed_videos(store: &MemoryStore, count: i64) {
        let writes: Vec<Write> = (1..=count)
            .map(|n| Write::Create {
                path: DocPath::new("videos", format!("v{n}")),
                fields: vec![
                    set("created_at", json!(n * 1000)),
                    set("is_public", json!(true)),
                ],
            })
            .collect();
        store.commit(writes).await.unwrap();
    }

    #[tokio::test]
    async fn get_and_create() {
        let (_, store) = store();
        store
            .commit(vec![Write::Create {
                path: DocPath::new("videos", "v1"),
                fields: vec![set("title", json!("first"))],
            }])
            .await
            .unwrap();

        let doc = store
            .get(&DocPath::new("videos", "v1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.str_field("title"), Some("first"));
        assert!(store
            .get(&DocPath::new("videos", "v2"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn server_timestamp_comes_from_clock() {
        let (clock, store) = store();
        clock.advance(1234);
        store
            .commit(vec![Write::Create {
                path: DocPath::new("videos", "v1"),
                fields: vec![server_timestamp("created_at")],
            }])
            .await
            .unwrap();

        let doc = store
            .get(&DocPath::new("videos", "v1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.i64_field("created_at"), Some(51_234));
    }

    #[tokio::test]
    async fn increments_treat_missing_as_zero() {
        let (_, store) = store();
        store
            .commit(vec![Write::Create {
                path: DocPath::new("videos", "v1"),
                fields: vec![increment("likes", 1)],
            }])
            .await
            .unwrap();
        store
            .commit(vec![Write::Update {
                path: DocPath::new("videos", "v1"),
                fields: vec![increment("likes", 2)],
            }])
            .await
            .unwrap();

        let doc = store
            .get(&DocPath::new("videos", "v1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.i64_field("likes"), Some(3));
    }

    #[tokio::test]
    async fn update_of_missing_doc_rejects_whole_batch() {
        let (_, store) = store();
        let result = store
            .commit(vec![
                Write::Create {
                    path: DocPath::new("videos", "v1"),
                    fields: vec![set("title", json!("kept out"))],
                },
                Write::Update {
                    path: DocPath::new("videos", "missing"),
                    fields: vec![increment("likes", 1)],
                },
            ])
            .await;

        assert!(result.is_err());
        assert!(store
            .get(&DocPath::new("videos", "v1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn filters_order_and_limit() {
        let (_, store) = store();
        seed_videos(&store, 7).await;
        store
            .commit(vec![Write::Create {
                path: DocPath::new("videos", "private"),
                fields: vec![
                    set("created_at", json!(99_000)),
                    set("is_public", json!(false)),
                ],
            }])
            .await
            .unwrap();

        let docs = store
            .query(
                "videos",
                Query::new()
                    .filter(Filter::Eq("is_public".to_string(), json!(true)))
                    .order_by("created_at", Direction::Descending)
                    .limit(3),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["v7", "v6", "v5"]);
    }

    #[tokio::test]
    async fn lt_filter_skips_missing_fields() {
        let (_, store) = store();
        store
            .commit(vec![
                Write::Create {
                    path: DocPath::new("channels", "stale"),
                    fields: vec![set("last_checked", json!(10))],
                },
                Write::Create {
                    path: DocPath::new("channels", "never"),
                    fields: vec![],
                },
            ])
            .await
            .unwrap();

        let docs = store
            .query(
                "channels",
                Query::new().filter(Filter::Lt("last_checked".to_string(), json!(100))),
            )
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "stale");
    }

    #[tokio::test]
    async fn cursor_pages_through_tied_order_keys() {
        let (_, store) = store();
        let writes: Vec<Write> = ["a", "b", "c"]
            .iter()
            .map(|id| Write::Create {
                path: DocPath::new("videos", *id),
                fields: vec![set("created_at", json!(5_000))],
            })
            .collect();
        store.commit(writes).await.unwrap();

        let first = store
            .query(
                "videos",
                Query::new()
                    .order_by("created_at", Direction::Descending)
                    .limit(2),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = first.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let rest = store
            .query(
                "videos",
                Query::new()
                    .order_by("created_at", Direction::Descending)
                    .limit(2)
                    .start_after(Cursor::after(first.last().unwrap(), "created_at")),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = rest.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[tokio::test]
    async fn cursor_resumes_strictly_after() {
        let (_, store) = store();
        seed_videos(&store, 7).await;

        let first = store
            .query(
                "videos",
                Query::new()
                    .order_by("created_at", Direction::Descending)
                    .limit(5),
            )
            .await
            .unwrap();
        let cursor = Cursor::after(first.last().unwrap(), "created_at");

        let second = store
            .query(
                "videos",
                Query::new()
                    .order_by("created_at", Direction::Descending)
                    .limit(5)
                    .start_after(cursor.clone()),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = second.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v1"]);

        let third = store
            .query(
                "videos",
                Query::new()
                    .order_by("created_at", Direction::Descending)
                    .limit(5)
                    .start_after(Cursor::after(second.last().unwrap(), "created_at")),
            )
            .await
            .unwrap();
        assert!(third.is_empty());
    }
}
