//! Realtime invalidation bridge.
//!
//! A subscription runs one task per call to
//! [`Collection::subscribe`](crate::Collection::subscribe). For every event
//! on the change feed the task clears the collection cache, decodes the
//! record and then hands the event to the caller's callback.

use std::sync::Arc;

use futures_util::StreamExt;
use tessera_core::{ChangeEvent, ErrorClassifier};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backend::ChangeFeed;
use crate::collection::{decode_record, SharedCache};
use crate::schema::CollectionSchema;

/// Handle to a running change-feed subscription.
///
/// Dropping the handle detaches the task; only [`Subscription::unsubscribe`]
/// stops it.
#[must_use = "the subscription keeps running until unsubscribe() is called"]
#[derive(Debug)]
pub struct Subscription {
    collection: String,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// True while the feed is still being read.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the task and release the feed.
    pub fn unsubscribe(self) {
        self.task.abort();
        debug!(collection = %self.collection, "unsubscribed from change feed");
    }
}

pub(crate) fn spawn_bridge<S, F>(
    collection: String,
    mut feed: ChangeFeed,
    cache: SharedCache<S::Entity>,
    schema: Arc<S>,
    classifier: ErrorClassifier,
    callback: F,
) -> Subscription
where
    S: CollectionSchema,
    F: Fn(ChangeEvent<S::Entity>) + Send + Sync + 'static,
{
    let name = collection.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = feed.next().await {
            let removed = cache.write().await.clear();
            debug!(
                collection = %name,
                action = ?event.action,
                removed,
                "change event cleared cache"
            );

            match decode_record(schema.as_ref(), event.record) {
                Ok(record) => callback(ChangeEvent::new(event.action, record)),
                Err(failure) => {
                    classifier.handle(failure);
                }
            }
        }
        debug!(collection = %name, "change feed closed");
    });

    Subscription { collection, task }
}
