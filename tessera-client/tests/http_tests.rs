//! HttpBackend tests against a wiremock server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tessera_client::{AuthStore, ClientConfig, HttpBackend};
use tessera_core::{
    AppResult, ChangeAction, ErrorClassifier, ErrorKind, Environment, Filter, ListParams,
    MemorySink, Record, RecordParams,
};
use tessera_storage::{Collection, CollectionBackend, DefaultSchema, Session};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const RECORDS: &str = "/api/collections/tasks/records";
const REALTIME: &str = "/api/realtime";

fn config(base_url: &str, auto_cancellation: bool) -> ClientConfig {
    ClientConfig::parse(&format!(
        r#"
base_url = "{}"
request_timeout_ms = 2000
auto_cancellation = {}
environment = "development"

[cache]
default_ttl_ms = 60000
count_ttl_ms = 10000

[reconnect]
initial_ms = 10
max_ms = 100
multiplier = 2.0
jitter_ms = 0
"#,
        base_url, auto_cancellation
    ))
    .expect("config")
}

fn tasks_with(
    base_url: &str,
    auth: AuthStore,
    auto_cancellation: bool,
) -> (Collection<DefaultSchema<Record>>, Arc<MemorySink>) {
    let backend = HttpBackend::new(&config(base_url, auto_cancellation), auth).expect("backend");
    let sink = Arc::new(MemorySink::new());
    let classifier = ErrorClassifier::new(Environment::Development, sink.clone());
    let session = Session::new(Arc::new(backend), classifier);
    (session.collection("tasks", DefaultSchema::default()), sink)
}

fn tasks(base_url: &str) -> (Collection<DefaultSchema<Record>>, Arc<MemorySink>) {
    tasks_with(base_url, AuthStore::new(), false)
}

fn task(id: &str, title: &str) -> Value {
    json!({"id": id, "created": "2024-01-01", "updated": "2024-01-01", "title": title})
}

fn query_of(request: &Request) -> HashMap<String, String> {
    request.url.query_pairs().into_owned().collect()
}

async fn requests(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.expect("request recording")
}

async fn mount_record(server: &MockServer, id: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", RECORDS, id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(task(id, title)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn list_decodes_envelope_and_sends_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "perPage": 20,
            "totalItems": 2,
            "totalPages": 1,
            "items": [task("a1", "one"), task("a2", "two")]
        })))
        .mount(&server)
        .await;

    let (tasks, sink) = tasks(&server.uri());
    let params = ListParams::new().with_filter(Filter::eq("status", "open"));
    let page = tasks.list(&params).await.expect("list");

    assert_eq!(page.total, 2);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.items[1].get_str("title"), Some("two"));
    assert!(sink.is_empty());

    let received = requests(&server).await;
    assert_eq!(received.len(), 1);
    let query = query_of(&received[0]);
    assert_eq!(query.get("page").map(String::as_str), Some("1"));
    assert_eq!(query.get("perPage").map(String::as_str), Some("20"));
    assert_eq!(query.get("sort").map(String::as_str), Some("-created"));
    assert_eq!(query.get("filter").map(String::as_str), Some(r#"status = "open""#));
}

#[tokio::test]
async fn repeated_get_is_served_from_cache() {
    let server = MockServer::start().await;
    mount_record(&server, "a1", "one").await;
    let (tasks, _) = tasks(&server.uri());

    let first = tasks.get_one("a1", &RecordParams::new()).await.expect("get");
    let second = tasks.get_one("a1", &RecordParams::new()).await.expect("get");

    assert_eq!(first, second);
    assert_eq!(requests(&server).await.len(), 1);
}

#[tokio::test]
async fn bearer_token_is_sent() {
    let server = MockServer::start().await;
    mount_record(&server, "a1", "one").await;
    let auth = AuthStore::with_token("secret-token");
    let (tasks, _) = tasks_with(&server.uri(), auth.clone(), false);

    tasks.get_one("a1", &RecordParams::new()).await.expect("get");
    auth.clear();
    tasks.clear_cache().await;
    tasks.get_one("a1", &RecordParams::new()).await.expect("get");

    let received = requests(&server).await;
    let authorization = |request: &Request| {
        request
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(authorization(&received[0]).as_deref(), Some("Bearer secret-token"));
    assert_eq!(authorization(&received[1]), None);
}

#[tokio::test]
async fn backend_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": 400,
            "message": "Failed to create record.",
            "data": {"title": {"code": "validation_required", "message": "Missing required value."}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/missing", RECORDS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": 404,
            "message": "The requested resource wasn't found.",
            "data": {}
        })))
        .mount(&server)
        .await;
    let (tasks, sink) = tasks(&server.uri());

    let err = tasks
        .create(&json!({"title": ""}), Vec::new())
        .await
        .expect_err("validation");
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(err.details.as_ref().is_some_and(|d| d.contains_key("title")));

    let err = tasks
        .get_one("missing", &RecordParams::new())
        .await
        .expect_err("not found");
    assert!(err.is_not_found());
    assert_eq!(sink.len(), 2);

    let post = &requests(&server).await[0];
    let body: Value = serde_json::from_slice(&post.body).expect("json body");
    assert_eq!(body, json!({"title": ""}));
}

#[tokio::test]
async fn exists_and_delete() {
    let server = MockServer::start().await;
    mount_record(&server, "a1", "one").await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/a1", RECORDS)))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let (tasks, _) = tasks(&server.uri());

    assert!(tasks.exists("a1").await.expect("exists"));
    assert!(!tasks.exists("missing").await.expect("exists"));
    assert!(tasks.delete("a1").await.expect("delete"));

    let received = requests(&server).await;
    assert_eq!(query_of(&received[0]).get("fields").map(String::as_str), Some("id"));
    assert_eq!(received[2].method.as_str(), "DELETE");
    assert_eq!(received[2].url.path(), format!("{}/a1", RECORDS));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));
    drop(listener);

    let (tasks, _) = tasks(&base_url);
    let err = tasks.list(&ListParams::new()).await.expect_err("network");
    assert!(err.is_network());
}

/// A slow read on `/records/a1` followed by a second read on the same path.
async fn overlapping_reads(auto_cancellation: bool) -> (AppResult<Record>, AppResult<Record>) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/a1", RECORDS)))
        .and(query_param("fields", "id,title"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(task("a1", "slow"))
                .set_delay(Duration::from_millis(500)),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    mount_record(&server, "a1", "fast").await;
    let (tasks, _) = tasks_with(&server.uri(), AuthStore::new(), auto_cancellation);

    let slow_params = RecordParams::new().with_fields("id,title");
    let slow = tasks.get_one("a1", &slow_params);
    let fast = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tasks.get_one("a1", &RecordParams::new()).await
    };
    tokio::join!(slow, fast)
}

#[tokio::test]
async fn newer_read_aborts_pending_read_on_same_path() {
    let (slow, fast) = overlapping_reads(true).await;

    let err = slow.expect_err("superseded");
    assert!(err.is_network());
    assert_eq!(fast.expect("newer read").get_str("title"), Some("fast"));
}

#[tokio::test]
async fn overlapping_reads_complete_without_auto_cancellation() {
    let (slow, fast) = overlapping_reads(false).await;

    assert_eq!(slow.expect("slow read").get_str("title"), Some("slow"));
    assert_eq!(fast.expect("fast read").get_str("title"), Some("fast"));
}

#[tokio::test]
async fn realtime_feed_handshakes_filters_and_reconnects() {
    let server = MockServer::start().await;
    let stream = concat!(
        "event: PB_CONNECT\n",
        "data: {\"clientId\":\"c1\"}\n\n",
        "event: notes/*\n",
        "data: {\"action\":\"create\",\"record\":{\"id\":\"n1\"}}\n\n",
        "event: tasks/*\n",
        "data: {\"action\":\"create\",\"record\":{\"id\":\"a1\",\"title\":\"one\"}}\n\n",
    );
    Mock::given(method("GET"))
        .and(path(REALTIME))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(stream, "text/event-stream"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REALTIME))
        .and(body_json(json!({"clientId": "c1", "subscriptions": ["tasks/*"]})))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&config(&server.uri(), false), AuthStore::new()).expect("backend");
    let mut feed = backend.subscribe("tasks", "*").await.expect("subscribe");

    let first = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .expect("first event in time")
        .expect("feed open");
    assert_eq!(first.action, ChangeAction::Create);
    assert_eq!(first.record["id"], "a1");

    // The canned stream ends after one body, so the next event needs a reconnect.
    let second = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .expect("event after reconnect")
        .expect("feed open");
    assert_eq!(second.record["id"], "a1");
    drop(feed);

    let registrations: Vec<Value> = requests(&server)
        .await
        .iter()
        .filter(|request| request.method.as_str() == "POST")
        .map(|request| serde_json::from_slice(&request.body).expect("json body"))
        .collect();
    assert!(registrations.len() >= 2);
    assert!(registrations
        .iter()
        .all(|body| *body == json!({"clientId": "c1", "subscriptions": ["tasks/*"]})));
}

#[tokio::test]
async fn realtime_connect_failure_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REALTIME))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "status": 403,
            "message": "forbidden",
            "data": {}
        })))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&config(&server.uri(), false), AuthStore::new()).expect("backend");
    let failure = backend.subscribe("tasks", "*").await.err().expect("connect failure");
    assert_eq!(failure.status(), Some(403));
}
