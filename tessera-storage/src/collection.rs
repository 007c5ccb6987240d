//! Cached, typed accessor for one remote collection.
//!
//! # Caching
//!
//! Reads (`list`, `get_one`, `count` and everything built on them) consult
//! the accessor's [`TtlCache`] first and fall through to the backend on a
//! miss. Concurrent misses on the same signature each hit the backend; the
//! last response to arrive wins the cache slot.
//!
//! # Invalidation
//!
//! Mutations clear the whole cache once the backend confirms success. A
//! failed mutation leaves the cache untouched. `batch_delete` waits for every
//! delete to settle and clears the cache if at least one succeeded.
//!
//! # Existence checks
//!
//! `exists` asks the backend for the id only and never decodes the record,
//! so it can report `true` for a record that `get_one` fails to decode.
//!
//! # Errors
//!
//! Every public operation returns a classified [`AppError`]. Each failure is
//! passed through the session's [`ErrorClassifier`](tessera_core::ErrorClassifier)
//! exactly once, including hook and decode failures.

use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tessera_core::{
    AppError, AppResult, ChangeEvent, Failure, FieldReasons, ListParams, ListQuery, ListResult,
    RecordParams, RecordQuery,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::{Attachment, Payload};
use crate::cache::{CacheStats, QuerySignature, TtlCache};
use crate::realtime::{spawn_bridge, Subscription};
use crate::schema::CollectionSchema;
use crate::session::Session;

const LIST_OP: &str = "list";
const GET_ONE_OP: &str = "getOne";
const COUNT_OP: &str = "count";

/// Topic that matches every record in a collection.
pub const WILDCARD_TOPIC: &str = "*";

/// What a cache slot holds for one signature.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue<E> {
    List(ListResult<E>),
    Record(E),
    Count(u64),
}

pub(crate) type SharedCache<E> = Arc<RwLock<TtlCache<CachedValue<E>>>>;

/// Per-id outcome of [`Collection::batch_delete`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchDeleteReport {
    /// One entry per requested id, in request order.
    pub outcomes: Vec<(String, Result<(), AppError>)>,
}

impl BatchDeleteReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Ids that were deleted.
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Ids that were not deleted, with the reason.
    pub fn failed(&self) -> Vec<(&str, &AppError)> {
        self.outcomes
            .iter()
            .filter_map(|(id, result)| result.as_ref().err().map(|err| (id.as_str(), err)))
            .collect()
    }

    /// True when every delete succeeded.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|(_, result)| result.is_ok())
    }

    /// Collapse to the first failure, in request order.
    pub fn into_result(self) -> AppResult<()> {
        self.outcomes
            .into_iter()
            .find_map(|(_, result)| result.err())
            .map_or(Ok(()), Err)
    }
}

/// Typed accessor for one collection.
///
/// Clones share the cache and schema.
pub struct Collection<S: CollectionSchema> {
    name: String,
    schema: Arc<S>,
    session: Session,
    cache: SharedCache<S::Entity>,
}

impl<S: CollectionSchema> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            schema: Arc::clone(&self.schema),
            session: self.session.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S: CollectionSchema> fmt::Debug for Collection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<S: CollectionSchema> Collection<S> {
    pub fn new(name: impl Into<String>, schema: S, session: Session) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(schema),
            session,
            cache: Arc::new(RwLock::new(TtlCache::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Fetch one page of records.
    pub async fn list(&self, params: &ListParams) -> AppResult<ListResult<S::Entity>> {
        let query = params.resolve();
        debug!(collection = %self.name, page = query.page, per_page = query.per_page, "list");
        self.fetch_list(&query).await.map_err(|failure| self.handle(failure))
    }

    /// Fetch one record by id.
    pub async fn get_one(&self, id: &str, params: &RecordParams) -> AppResult<S::Entity> {
        let query = params.resolve();
        debug!(collection = %self.name, id, "get_one");
        self.fetch_one(id, &query).await.map_err(|failure| self.handle(failure))
    }

    /// Free-text search over the schema's searchable fields, combined with
    /// any filter already in `params`.
    pub async fn search(&self, query: &str, params: &ListParams) -> AppResult<ListResult<S::Entity>> {
        let search = self.schema.build_search_filter(query);
        let filter = match params.filter.clone() {
            Some(existing) => existing.and(search),
            None => search,
        };
        debug!(collection = %self.name, query, "search");
        self.list(&params.clone().with_filter(filter)).await
    }

    /// First record of `list(params)` with a page size of one.
    pub async fn get_first(&self, params: &ListParams) -> AppResult<Option<S::Entity>> {
        let page = self.list(&params.clone().with_per_page(1)).await?;
        Ok(page.items.into_iter().next())
    }

    /// `true` if the record exists, `false` on NotFound, any other error is
    /// returned.
    ///
    /// Asks the backend for the id field only and does not decode or cache
    /// the record. A record that exists but cannot be decoded therefore
    /// yields `true` here while [`get_one`](Self::get_one) fails with a
    /// Generic error.
    pub async fn exists(&self, id: &str) -> AppResult<bool> {
        let query = RecordParams::new().with_fields("id").resolve();
        debug!(collection = %self.name, id, "exists");
        match self.session.backend().get_one(&self.name, id, &query).await {
            Ok(_) => Ok(true),
            Err(failure) => {
                let error = self.handle(failure);
                if error.is_not_found() {
                    Ok(false)
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Total number of records matching `params.filter`.
    ///
    /// Cached separately from `list` under the shorter count TTL.
    pub async fn count(&self, params: &ListParams) -> AppResult<u64> {
        let query = params
            .clone()
            .with_page(1)
            .with_per_page(1)
            .with_fields("id")
            .resolve();
        debug!(collection = %self.name, filter = ?query.filter, "count");
        self.fetch_count(&query).await.map_err(|failure| self.handle(failure))
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Create a record. `data` must serialize to a JSON object.
    pub async fn create<D>(&self, data: &D, attachments: Vec<Attachment>) -> AppResult<S::Entity>
    where
        D: Serialize + ?Sized,
    {
        debug!(collection = %self.name, attachments = attachments.len(), "create");
        let result = async {
            let payload = self.prepare(data, attachments)?;
            let record = self.session.backend().create(&self.name, payload).await?;
            self.invalidate("create").await;
            self.decode(record)
        }
        .await;
        result.map_err(|failure| self.handle(failure))
    }

    /// Update a record. `data` must serialize to a JSON object.
    pub async fn update<D>(
        &self,
        id: &str,
        data: &D,
        attachments: Vec<Attachment>,
    ) -> AppResult<S::Entity>
    where
        D: Serialize + ?Sized,
    {
        debug!(collection = %self.name, id, attachments = attachments.len(), "update");
        let result = async {
            let payload = self.prepare(data, attachments)?;
            let record = self.session.backend().update(&self.name, id, payload).await?;
            self.invalidate("update").await;
            self.decode(record)
        }
        .await;
        result.map_err(|failure| self.handle(failure))
    }

    /// Delete a record. Returns `true` once the backend confirms.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        debug!(collection = %self.name, id, "delete");
        self.session
            .backend()
            .delete(&self.name, id)
            .await
            .map_err(|failure| self.handle(failure))?;
        self.invalidate("delete").await;
        Ok(true)
    }

    /// Delete every id concurrently and report each outcome.
    ///
    /// Deletes that succeed are not rolled back when others fail.
    pub async fn batch_delete<I>(&self, ids: I) -> BatchDeleteReport
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        debug!(collection = %self.name, count = ids.len(), "batch_delete");

        let backend = self.session.backend();
        let results = join_all(ids.iter().map(|id| backend.delete(&self.name, id))).await;

        let outcomes: Vec<(String, Result<(), AppError>)> = ids
            .into_iter()
            .zip(results)
            .map(|(id, result)| (id, result.map_err(|failure| self.handle(failure))))
            .collect();

        if outcomes.iter().any(|(_, result)| result.is_ok()) {
            self.invalidate("batch_delete").await;
        }
        BatchDeleteReport { outcomes }
    }

    // ========================================================================
    // REALTIME
    // ========================================================================

    /// Subscribe to every change in the collection.
    ///
    /// Each event clears the cache before `callback` runs. Every call opens
    /// its own feed.
    ///
    /// Events whose record fails `transform_response` or decoding still
    /// clear the cache, but go only to the error classifier; `callback` is
    /// not invoked for them.
    pub async fn subscribe<F>(&self, callback: F) -> AppResult<Subscription>
    where
        F: Fn(ChangeEvent<S::Entity>) + Send + Sync + 'static,
    {
        let feed = self
            .session
            .backend()
            .subscribe(&self.name, WILDCARD_TOPIC)
            .await
            .map_err(|failure| self.handle(failure))?;
        debug!(collection = %self.name, "subscribed to change feed");

        Ok(spawn_bridge(
            self.name.clone(),
            feed,
            Arc::clone(&self.cache),
            Arc::clone(&self.schema),
            self.session.classifier().clone(),
            callback,
        ))
    }

    // ========================================================================
    // CACHE MANAGEMENT
    // ========================================================================

    /// Drop every cached entry. Returns how many were removed.
    pub async fn clear_cache(&self) -> usize {
        self.cache.write().await.clear()
    }

    /// Drop cached entries whose signature contains `pattern`.
    pub async fn invalidate_matching(&self, pattern: &str) -> usize {
        self.cache.write().await.invalidate_matching(pattern)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    /// Rendered signatures of every resident cache entry.
    pub async fn cached_entries(&self) -> Vec<String> {
        self.cache.read().await.keys()
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn handle(&self, failure: Failure) -> AppError {
        self.session.classifier().handle(failure)
    }

    fn decode(&self, record: Value) -> Result<S::Entity, Failure> {
        decode_record(self.schema.as_ref(), record)
    }

    async fn invalidate(&self, reason: &'static str) {
        let removed = self.cache.write().await.clear();
        debug!(collection = %self.name, reason, removed, "cache invalidated");
    }

    async fn cached(&self, key: &QuerySignature) -> Option<CachedValue<S::Entity>> {
        let hit = self.cache.write().await.get(key);
        if hit.is_some() {
            debug!(collection = %self.name, signature = %key, "cache hit");
        }
        hit
    }

    async fn store(&self, key: QuerySignature, value: CachedValue<S::Entity>, ttl: std::time::Duration) {
        self.cache.write().await.insert(key, value, ttl);
    }

    async fn fetch_list(&self, query: &ListQuery) -> Result<ListResult<S::Entity>, Failure> {
        let key = QuerySignature::new(&self.name, LIST_OP, query)?;
        if let Some(CachedValue::List(page)) = self.cached(&key).await {
            return Ok(page);
        }

        let raw = self.session.backend().list(&self.name, query).await?;
        let page = raw.try_map(|record| self.decode(record))?;
        self.store(key, CachedValue::List(page.clone()), self.session.cache_config().default_ttl)
            .await;
        Ok(page)
    }

    async fn fetch_one(&self, id: &str, query: &RecordQuery) -> Result<S::Entity, Failure> {
        let key = QuerySignature::new(&self.name, GET_ONE_OP, &json!({ "id": id, "query": query }))?;
        if let Some(CachedValue::Record(record)) = self.cached(&key).await {
            return Ok(record);
        }

        let raw = self.session.backend().get_one(&self.name, id, query).await?;
        let record = self.decode(raw)?;
        self.store(key, CachedValue::Record(record.clone()), self.session.cache_config().default_ttl)
            .await;
        Ok(record)
    }

    async fn fetch_count(&self, query: &ListQuery) -> Result<u64, Failure> {
        let key = QuerySignature::new(&self.name, COUNT_OP, query)?;
        if let Some(CachedValue::Count(total)) = self.cached(&key).await {
            return Ok(total);
        }

        let page = self.session.backend().list(&self.name, query).await?;
        self.store(key, CachedValue::Count(page.total), self.session.cache_config().count_ttl)
            .await;
        Ok(page.total)
    }

    fn prepare<D>(&self, data: &D, attachments: Vec<Attachment>) -> Result<Payload, Failure>
    where
        D: Serialize + ?Sized,
    {
        let fields = match serde_json::to_value(data)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(AppError::validation(
                    "Record data must be a JSON object",
                    FieldReasons::new(),
                )
                .into())
            }
        };
        self.schema.validate(&fields)?;
        let fields: Map<String, Value> = self.schema.transform_data(fields)?;
        Ok(Payload::new(fields).with_attachments(attachments))
    }
}

/// Run `transform_response` and decode the result into the schema's entity.
pub(crate) fn decode_record<S>(schema: &S, record: Value) -> Result<S::Entity, Failure>
where
    S: CollectionSchema + ?Sized,
{
    let shaped = schema.transform_response(record)?;
    serde_json::from_value(shaped)
        .map_err(|err| Failure::other(format!("failed to decode record: {}", err)))
}
