use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::mpsc;

use super::r#trait::{
    CollectionSnapshot, CollectionStore, RawRecords, SnapshotResult, StoreError, Subscription,
    SubscriptionId,
};
use super::write::{parse_path, record_path, WriteBatch, WriteOp};

#[derive(Debug, Default)]
struct Inner {
    collections: BTreeMap<String, RawRecords>,
    listeners: HashMap<SubscriptionId, Listener>,
    next_id: u64,
    failing_writes: usize,
    denied: HashSet<String>,
    committed: u64,
}

#[derive(Debug)]
struct Listener {
    collection: String,
    sender: mpsc::UnboundedSender<SnapshotResult>,
}

/// In-memory collection store.
///
/// Intended for tests/dev. Pushes the full collection to every listener after
/// each committed write, and supports failure injection:
/// - `fail_next_writes(n)` makes the next `n` writes fail with a transport error
/// - `deny_collection(name)` makes subscriptions to `name` end with permission denied
/// - `push_error(name, err)` delivers a terminal error to current listeners
#[derive(Debug, Default)]
pub struct InMemoryCollectionStore {
    inner: Mutex<Inner>,
}

impl InMemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Transport("lock poisoned".to_string()))
    }

    /// Insert a record directly, notifying listeners.
    pub fn seed<T: Serialize>(&self, collection: &str, key: &str, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.seed_value(collection, key, value)
    }

    pub fn seed_value(&self, collection: &str, key: &str, value: JsonValue) -> Result<(), StoreError> {
        parse_path(&record_path(collection, key))?;
        let mut inner = self.lock()?;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        inner.broadcast(collection);
        Ok(())
    }

    /// Current raw contents of a collection.
    pub fn records(&self, collection: &str) -> RawRecords {
        self.lock()
            .ok()
            .and_then(|inner| inner.collections.get(collection).cloned())
            .unwrap_or_default()
    }

    /// Value at a `collection/key[/field...]` path.
    pub fn value_at(&self, path: &str) -> Option<JsonValue> {
        let segments = parse_path(path).ok()?;
        let inner = self.lock().ok()?;
        inner.read(&segments).cloned()
    }

    pub fn fail_next_writes(&self, count: usize) {
        if let Ok(mut inner) = self.lock() {
            inner.failing_writes = count;
        }
    }

    pub fn deny_collection(&self, collection: &str) {
        if let Ok(mut inner) = self.lock() {
            inner.denied.insert(collection.to_string());
        }
    }

    /// Deliver a terminal error to every listener of `collection` and drop them.
    pub fn push_error(&self, collection: &str, error: StoreError) {
        if let Ok(mut inner) = self.lock() {
            inner.listeners.retain(|_, l| {
                if l.collection == collection {
                    let _ = l.sender.send(Err(error.clone()));
                    false
                } else {
                    true
                }
            });
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().map(|i| i.listeners.len()).unwrap_or(0)
    }

    /// Number of batches committed so far.
    pub fn committed_writes(&self) -> u64 {
        self.lock().map(|i| i.committed).unwrap_or(0)
    }
}

impl Inner {
    fn snapshot(&self, collection: &str) -> CollectionSnapshot {
        CollectionSnapshot {
            collection: collection.to_string(),
            records: self.collections.get(collection).cloned().unwrap_or_default(),
        }
    }

    fn broadcast(&mut self, collection: &str) {
        let snapshot = self.snapshot(collection);
        self.listeners.retain(|_, l| {
            l.collection != collection || l.sender.send(Ok(snapshot.clone())).is_ok()
        });
    }

    fn read(&self, segments: &[&str]) -> Option<&JsonValue> {
        let (collection, rest) = segments.split_first()?;
        let (key, fields) = rest.split_first()?;
        let mut value = self.collections.get(*collection)?.get(*key)?;
        for field in fields {
            value = value.as_object()?.get(*field)?;
        }
        Some(value)
    }
}

fn not_an_object(path: &str) -> StoreError {
    StoreError::InvalidPath(format!("{path}: parent is not an object"))
}

fn apply(collections: &mut BTreeMap<String, RawRecords>, op: &WriteOp) -> Result<(), StoreError> {
    let segments = parse_path(op.path())?;
    let records = collections.entry(segments[0].to_string()).or_default();
    let key = segments[1];
    let fields = &segments[2..];

    match op {
        WriteOp::Set { value, .. } => match fields.split_last() {
            None => {
                records.insert(key.to_string(), value.clone());
            }
            Some((last, parents)) => {
                let mut node = records
                    .entry(key.to_string())
                    .or_insert_with(|| JsonValue::Object(Map::new()));
                for field in parents {
                    node = node
                        .as_object_mut()
                        .ok_or_else(|| not_an_object(op.path()))?
                        .entry(field.to_string())
                        .or_insert_with(|| JsonValue::Object(Map::new()));
                }
                node.as_object_mut()
                    .ok_or_else(|| not_an_object(op.path()))?
                    .insert(last.to_string(), value.clone());
            }
        },
        WriteOp::Delete { .. } => match fields.split_last() {
            None => {
                records.remove(key);
            }
            Some((last, parents)) => {
                let mut node = records.get_mut(key);
                for field in parents {
                    node = node
                        .and_then(|n| n.as_object_mut())
                        .and_then(|o| o.get_mut(*field));
                }
                if let Some(obj) = node.and_then(|n| n.as_object_mut()) {
                    obj.remove(*last);
                }
            }
        },
    }
    Ok(())
}

#[async_trait]
impl CollectionStore for InMemoryCollectionStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        let (sender, receiver) = mpsc::unbounded_channel();

        if inner.denied.contains(collection) {
            let _ = sender.send(Err(StoreError::PermissionDenied(collection.to_string())));
            return Ok(Subscription::new(id, collection, receiver));
        }

        let _ = sender.send(Ok(inner.snapshot(collection)));
        inner.listeners.insert(
            id,
            Listener {
                collection: collection.to_string(),
                sender,
            },
        );
        Ok(Subscription::new(id, collection, receiver))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut inner) = self.lock() {
            inner.listeners.remove(&id);
        }
    }

    async fn atomic_write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(StoreError::Transport("injected write failure".to_string()));
        }

        for guard in batch.guards() {
            let segments = parse_path(&guard.path)?;
            let actual = inner.read(&segments);
            if actual != guard.expected.as_ref() {
                return Err(StoreError::PreconditionFailed {
                    path: guard.path.clone(),
                    expected: describe(guard.expected.as_ref()),
                    actual: describe(actual),
                });
            }
        }

        // Stage on a copy so a failing operation leaves nothing applied.
        let mut staged = inner.collections.clone();
        for op in batch.ops() {
            apply(&mut staged, op)?;
        }
        inner.collections = staged;
        inner.committed += 1;

        for collection in batch.collections() {
            inner.broadcast(collection);
        }
        Ok(())
    }
}

fn describe(value: Option<&JsonValue>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "<absent>".to_string())
}
