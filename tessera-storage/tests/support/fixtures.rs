//! Shared fixtures for collection tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tessera_core::{AppError, Entity, Environment, ErrorClassifier, Failure, MemorySink};
use tessera_storage::{CollectionSchema, Collection, MockBackend, Session};

pub const TASKS: &str = "tasks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for creating or updating a task.
#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub title: String,
    pub status: String,
    pub tags: Vec<String>,
}

impl NewTask {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            status: "open".to_string(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|tag| tag.to_string()).collect();
        self
    }
}

/// Tasks are searched by title; tags travel as a comma-separated string.
#[derive(Debug, Default)]
pub struct TaskSchema;

impl CollectionSchema for TaskSchema {
    type Entity = Task;

    fn validate(&self, data: &Map<String, Value>) -> Result<(), Failure> {
        let blank = data
            .get("title")
            .and_then(Value::as_str)
            .map_or(true, |title| title.trim().is_empty());
        if blank {
            return Err(AppError::invalid_field("title", "Title is required").into());
        }
        Ok(())
    }

    fn transform_data(&self, mut data: Map<String, Value>) -> Result<Map<String, Value>, Failure> {
        if let Some(Value::Array(tags)) = data.get("tags") {
            let joined = tags
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(",");
            data.insert("tags".to_string(), Value::String(joined));
        }
        Ok(data)
    }

    fn transform_response(&self, mut record: Value) -> Result<Value, Failure> {
        if let Some(Value::String(tags)) = record.get("tags") {
            let split: Vec<Value> = tags
                .split(',')
                .filter(|tag| !tag.is_empty())
                .map(|tag| json!(tag))
                .collect();
            record["tags"] = Value::Array(split);
        }
        Ok(record)
    }

    fn searchable_fields(&self) -> &[&str] {
        &["title"]
    }
}

pub struct Harness {
    pub backend: Arc<MockBackend>,
    pub sink: Arc<MemorySink>,
    pub session: Session,
}

impl Harness {
    pub fn new() -> Self {
        let backend = Arc::new(MockBackend::new());
        let sink = Arc::new(MemorySink::new());
        let classifier = ErrorClassifier::new(Environment::Development, sink.clone());
        let session = Session::new(backend.clone(), classifier);
        Self {
            backend,
            sink,
            session,
        }
    }

    pub fn tasks(&self) -> Collection<TaskSchema> {
        self.session.collection(TASKS, TaskSchema)
    }

    /// Seed `n` tasks titled `task-0` .. `task-{n-1}`.
    pub fn seed(&self, n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| {
                self.backend.insert(
                    TASKS,
                    json!({ "title": format!("task-{}", i), "status": "open", "tags": "" }),
                )
            })
            .collect()
    }
}
