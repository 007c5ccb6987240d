//! In-memory backend for tests.
//!
//! [`MockBackend`] stores records per collection, counts calls per
//! operation, remembers the last list query and can be told to fail. Filter
//! expressions are recorded but not evaluated; paging and the sort direction
//! of the default sort are applied. Every mutation is pushed to open change
//! feeds for its collection.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use serde_json::{Map, Value};
use tessera_core::{
    BackendErrorPayload, ChangeAction, ChangeEvent, Failure, ListQuery, ListResult, RecordQuery,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::backend::{BackendResult, ChangeFeed, CollectionBackend, Payload};

/// Backend operations, for call counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    List,
    GetOne,
    Create,
    Update,
    Delete,
    Subscribe,
}

#[derive(Default)]
struct Faults {
    next: HashMap<MockOperation, VecDeque<Failure>>,
    by_id: HashMap<String, Failure>,
}

struct Subscriber {
    collection: String,
    topic: String,
    sender: UnboundedSender<ChangeEvent<Value>>,
}

/// In-memory [`CollectionBackend`].
#[derive(Default)]
pub struct MockBackend {
    records: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<HashMap<MockOperation, usize>>,
    last_list_query: Mutex<Option<ListQuery>>,
    faults: Mutex<Faults>,
    subscribers: Mutex<Vec<Subscriber>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found() -> Failure {
    BackendErrorPayload::new(404, "The requested resource wasn't found.").into()
}

fn now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}

impl MockBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting a call or emitting an event.
    ///
    /// A missing `id` is generated. Returns the stored record.
    pub fn insert(&self, collection: &str, record: Value) -> Value {
        let mut fields = match record {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        stamp_new(&mut fields);
        let record = Value::Object(fields);
        lock(&self.records)
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        record
    }

    /// Every record in `collection`, in insertion order.
    pub fn records(&self, collection: &str) -> Vec<Value> {
        lock(&self.records)
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn calls(&self, op: MockOperation) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    /// Reset every call counter.
    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Query passed to the most recent `list` call.
    pub fn last_list_query(&self) -> Option<ListQuery> {
        lock(&self.last_list_query).clone()
    }

    /// Fail the next call to `op` with `failure`. Queued failures are used in
    /// order.
    pub fn fail_next(&self, op: MockOperation, failure: impl Into<Failure>) {
        lock(&self.faults)
            .next
            .entry(op)
            .or_default()
            .push_back(failure.into());
    }

    /// Fail every call that targets `id` until the faults are cleared.
    pub fn fail_id(&self, id: impl Into<String>, failure: impl Into<Failure>) {
        lock(&self.faults).by_id.insert(id.into(), failure.into());
    }

    pub fn clear_faults(&self) {
        let mut faults = lock(&self.faults);
        faults.next.clear();
        faults.by_id.clear();
    }

    /// Push an event to every open feed on `collection`, as if another client
    /// had made the change.
    pub fn emit(&self, collection: &str, action: ChangeAction, record: Value) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|sub| !sub.sender.is_closed());
        for sub in subscribers.iter() {
            if sub.collection != collection || !topic_matches(&sub.topic, &record) {
                continue;
            }
            // A closed receiver is pruned on the next emit.
            let _ = sub.sender.send(ChangeEvent::new(action, record.clone()));
        }
    }

    /// Open feeds on `collection` whose receiver is still alive.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        lock(&self.subscribers)
            .iter()
            .filter(|sub| sub.collection == collection && !sub.sender.is_closed())
            .count()
    }

    fn record_call(&self, op: MockOperation) {
        *lock(&self.calls).entry(op).or_insert(0) += 1;
    }

    /// Count the call, then surface any injected fault.
    fn enter(&self, op: MockOperation, id: Option<&str>) -> BackendResult<()> {
        self.record_call(op);
        let mut faults = lock(&self.faults);
        if let Some(failure) = faults.next.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(failure);
        }
        if let Some(failure) = id.and_then(|id| faults.by_id.get(id)) {
            return Err(failure.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl CollectionBackend for MockBackend {
    async fn list(&self, collection: &str, query: &ListQuery) -> BackendResult<ListResult<Value>> {
        self.enter(MockOperation::List, None)?;
        *lock(&self.last_list_query) = Some(query.clone());

        let mut all = self.records(collection);
        if query.sort.starts_with('-') {
            all.reverse();
        }

        let total = all.len() as u64;
        let per_page = query.per_page as usize;
        let skip = (query.page.max(1) as usize - 1).saturating_mul(per_page);
        let items = all
            .into_iter()
            .skip(skip)
            .take(per_page)
            .map(|record| project(record, query.fields.as_deref()))
            .collect();

        Ok(ListResult::new(items, total, query.page, query.per_page))
    }

    async fn get_one(&self, collection: &str, id: &str, query: &RecordQuery) -> BackendResult<Value> {
        self.enter(MockOperation::GetOne, Some(id))?;
        lock(&self.records)
            .get(collection)
            .and_then(|records| records.iter().find(|record| record_id(record) == Some(id)))
            .cloned()
            .map(|record| project(record, query.fields.as_deref()))
            .ok_or_else(not_found)
    }

    async fn create(&self, collection: &str, payload: Payload) -> BackendResult<Value> {
        self.enter(MockOperation::Create, None)?;

        let mut fields = payload.fields;
        attach(&mut fields, &payload.attachments);
        stamp_new(&mut fields);
        let record = Value::Object(fields);

        lock(&self.records)
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        self.emit(collection, ChangeAction::Create, record.clone());
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, payload: Payload) -> BackendResult<Value> {
        self.enter(MockOperation::Update, Some(id))?;

        let updated = {
            let mut records = lock(&self.records);
            let record = records
                .get_mut(collection)
                .and_then(|records| {
                    records
                        .iter_mut()
                        .find(|record| record_id(record) == Some(id))
                })
                .ok_or_else(not_found)?;

            if let Value::Object(existing) = record {
                let mut changes = payload.fields;
                changes.remove("id");
                attach(&mut changes, &payload.attachments);
                existing.extend(changes);
                existing.insert("updated".to_string(), Value::String(now()));
            }
            record.clone()
        };

        self.emit(collection, ChangeAction::Update, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()> {
        self.enter(MockOperation::Delete, Some(id))?;

        let removed = {
            let mut records = lock(&self.records);
            let records = records.get_mut(collection).ok_or_else(not_found)?;
            let index = records
                .iter()
                .position(|record| record_id(record) == Some(id))
                .ok_or_else(not_found)?;
            records.remove(index)
        };

        self.emit(collection, ChangeAction::Delete, removed);
        Ok(())
    }

    async fn subscribe(&self, collection: &str, topic: &str) -> BackendResult<ChangeFeed> {
        self.enter(MockOperation::Subscribe, None)?;

        let (sender, receiver) = unbounded_channel();
        lock(&self.subscribers).push(Subscriber {
            collection: collection.to_string(),
            topic: topic.to_string(),
            sender,
        });
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

fn topic_matches(topic: &str, record: &Value) -> bool {
    topic == "*" || record_id(record) == Some(topic)
}

fn stamp_new(fields: &mut Map<String, Value>) {
    let has_id = fields
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if !has_id {
        fields.insert(
            "id".to_string(),
            Value::String(Uuid::now_v7().simple().to_string()),
        );
    }
    let stamp = now();
    fields
        .entry("created")
        .or_insert_with(|| Value::String(stamp.clone()));
    fields.insert("updated".to_string(), Value::String(stamp));
}

/// Store attachments the way a file field is returned: by file name.
fn attach(fields: &mut Map<String, Value>, attachments: &[crate::backend::Attachment]) {
    for attachment in attachments {
        fields.insert(
            attachment.field.clone(),
            Value::String(attachment.file_name.clone()),
        );
    }
}

/// Keep only the comma-separated `fields`, when given.
fn project(record: Value, fields: Option<&str>) -> Value {
    let Some(fields) = fields else {
        return record;
    };
    let wanted: Vec<&str> = fields.split(',').map(str::trim).collect();
    match record {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| wanted.contains(&key.as_str()))
                .collect(),
        ),
        other => other,
    }
}
