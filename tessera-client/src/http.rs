//! REST backend for a collection-oriented server.
//!
//! Records live under `/api/collections/{collection}/records`. Writes go as
//! JSON, or as multipart when attachments are present. Error responses carry
//! `{status, message, data}`; the HTTP status always wins over the body's.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::future::{abortable, AbortHandle};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tessera_core::{BackendErrorPayload, Failure, ListQuery, ListResult, RecordQuery};
use tessera_storage::{BackendResult, ChangeFeed, CollectionBackend, Payload};
use tracing::{debug, trace};

use crate::auth::AuthStore;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::realtime::RealtimeConnector;

/// Page envelope returned by the list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEnvelope {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    per_page: u32,
    #[serde(default)]
    total_items: i64,
    #[serde(default)]
    items: Vec<Value>,
}

type InFlight = Arc<Mutex<HashMap<String, (u64, AbortHandle)>>>;

/// [`CollectionBackend`] over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    auth: AuthStore,
    auto_cancellation: bool,
    in_flight: InFlight,
    next_request: Arc<AtomicU64>,
    realtime: RealtimeConnector,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig, auth: AuthStore) -> ClientResult<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|err| ClientError::BaseUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::BaseUrl(format!(
                "{} cannot carry a path",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        // No overall timeout: the realtime stream stays open indefinitely.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;

        let realtime = RealtimeConnector::new(
            stream_client,
            endpoint(&base_url, &["api", "realtime"])?,
            auth.clone(),
            config.reconnect.clone(),
        );

        Ok(Self {
            client,
            base_url,
            auth,
            auto_cancellation: config.auto_cancellation,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_request: Arc::new(AtomicU64::new(0)),
            realtime,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    fn records_url(&self, collection: &str) -> Result<Url, Failure> {
        endpoint(&self.base_url, &["api", "collections", collection, "records"])
            .map_err(|err| Failure::other(err.to_string()))
    }

    fn record_url(&self, collection: &str, id: &str) -> Result<Url, Failure> {
        endpoint(&self.base_url, &["api", "collections", collection, "records", id])
            .map_err(|err| Failure::other(err.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.auth.apply(self.client.request(method, url))
    }

    /// Send a request. With auto-cancellation on, a GET supersedes any
    /// pending GET to the same path.
    async fn execute(&self, method: Method, url: Url, request: RequestBuilder) -> Result<Response, Failure> {
        let cancel_key = (self.auto_cancellation && method == Method::GET)
            .then(|| format!("{} {}", method, url.path()));
        trace!(%method, url = %url, "sending request");

        let Some(key) = cancel_key else {
            let response = request.send().await.map_err(transport_failure)?;
            return check_status(response).await;
        };

        let ticket = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (send, handle) = abortable(request.send());
        if let Some((_, previous)) = lock(&self.in_flight).insert(key.clone(), (ticket, handle)) {
            debug!(request = %key, "cancelling superseded request");
            previous.abort();
        }

        let outcome = send.await;
        {
            let mut in_flight = lock(&self.in_flight);
            if in_flight.get(&key).is_some_and(|(owner, _)| *owner == ticket) {
                in_flight.remove(&key);
            }
        }

        match outcome {
            Ok(result) => check_status(result.map_err(transport_failure)?).await,
            Err(_) => Err(Failure::aborted(format!("{} was superseded by a newer request", key))),
        }
    }

    async fn send_json(&self, method: Method, url: Url, query: &[(&str, String)]) -> Result<Value, Failure> {
        let request = self.request(method.clone(), url.clone()).query(query);
        let response = self.execute(method, url, request).await?;
        read_json(response).await
    }

    async fn send_payload(&self, method: Method, url: Url, payload: Payload) -> Result<Value, Failure> {
        let request = self.request(method.clone(), url.clone());
        let request = if payload.is_multipart() {
            request.multipart(multipart_form(payload)?)
        } else {
            request.json(&Value::Object(payload.fields))
        };
        let response = self.execute(method, url, request).await?;
        read_json(response).await
    }
}

#[async_trait]
impl CollectionBackend for HttpBackend {
    async fn list(&self, collection: &str, query: &ListQuery) -> BackendResult<ListResult<Value>> {
        let url = self.records_url(collection)?;
        let body = self.send_json(Method::GET, url, &list_query_pairs(query)).await?;
        let envelope: ListEnvelope = serde_json::from_value(body)?;
        Ok(ListResult::new(
            envelope.items,
            u64::try_from(envelope.total_items).unwrap_or(0),
            if envelope.page == 0 { query.page } else { envelope.page },
            if envelope.per_page == 0 { query.per_page } else { envelope.per_page },
        ))
    }

    async fn get_one(&self, collection: &str, id: &str, query: &RecordQuery) -> BackendResult<Value> {
        let url = self.record_url(collection, id)?;
        self.send_json(Method::GET, url, &record_query_pairs(query)).await
    }

    async fn create(&self, collection: &str, payload: Payload) -> BackendResult<Value> {
        let url = self.records_url(collection)?;
        self.send_payload(Method::POST, url, payload).await
    }

    async fn update(&self, collection: &str, id: &str, payload: Payload) -> BackendResult<Value> {
        let url = self.record_url(collection, id)?;
        self.send_payload(Method::PATCH, url, payload).await
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()> {
        let url = self.record_url(collection, id)?;
        let request = self.request(Method::DELETE, url.clone());
        self.execute(Method::DELETE, url, request).await?;
        Ok(())
    }

    async fn subscribe(&self, collection: &str, topic: &str) -> BackendResult<ChangeFeed> {
        self.realtime
            .open_feed(format!("{}/{}", collection, topic))
            .await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Append path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> ClientResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::BaseUrl(format!("{} cannot carry a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn list_query_pairs(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("page", query.page.to_string()),
        ("perPage", query.per_page.to_string()),
        ("sort", query.sort.clone()),
    ];
    if let Some(filter) = &query.filter {
        pairs.push(("filter", filter.clone()));
    }
    if let Some(expand) = &query.expand {
        pairs.push(("expand", expand.clone()));
    }
    if let Some(fields) = &query.fields {
        pairs.push(("fields", fields.clone()));
    }
    pairs
}

fn record_query_pairs(query: &RecordQuery) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(expand) = &query.expand {
        pairs.push(("expand", expand.clone()));
    }
    if let Some(fields) = &query.fields {
        pairs.push(("fields", fields.clone()));
    }
    pairs
}

/// Strings go as plain text parts; everything else as JSON text.
fn multipart_form(payload: Payload) -> Result<Form, Failure> {
    let mut form = Form::new();
    for (field, value) in payload.fields {
        form = match value {
            Value::String(text) => form.text(field, text),
            Value::Null => form.text(field, String::new()),
            other => form.text(field, other.to_string()),
        };
    }
    for attachment in payload.attachments {
        let mut part = Part::bytes(attachment.bytes).file_name(attachment.file_name);
        if let Some(content_type) = &attachment.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|err| Failure::other(format!("invalid content type {}: {}", content_type, err)))?;
        }
        form = form.part(attachment.field, part);
    }
    Ok(form)
}

pub(crate) fn transport_failure(err: reqwest::Error) -> Failure {
    if err.is_decode() {
        return Failure::other(format!("failed to decode response: {}", err));
    }
    Failure::transport(err.to_string())
}

/// Pass successful responses through; turn the rest into backend failures.
pub(crate) async fn check_status(response: Response) -> Result<Response, Failure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_payload(status.as_u16(), &body).into())
}

pub(crate) fn error_payload(status: u16, body: &str) -> BackendErrorPayload {
    let mut payload = BackendErrorPayload::new(status, "");
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            if let Some(message) = map.get("message").and_then(Value::as_str) {
                payload.message = message.to_string();
            }
            if let Some(Value::Object(data)) = map.get("data") {
                payload.data = data.clone();
            }
        }
        _ => payload.message = body.trim().to_string(),
    }
    payload
}

async fn read_json(response: Response) -> Result<Value, Failure> {
    if response.status() == reqwest::StatusCode::NO_CONTENT {
        return Ok(Value::Object(Map::new()));
    }
    response.json::<Value>().await.map_err(transport_failure)
}
