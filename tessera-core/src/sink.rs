//! Error-tracking sinks.
//!
//! A sink receives every classified error exactly once, after it has been
//! logged. Production deployments forward to an aggregation service; the
//! default sink re-emits the error as a `tracing` event so a subscriber layer
//! can ship it.

use std::sync::{Mutex, PoisonError};

use crate::error::AppError;

/// Destination for classified errors.
pub trait ErrorSink: Send + Sync {
    /// Record one classified error.
    fn capture(&self, error: &AppError);
}

/// Forwards captured errors as `tracing` events under `tessera::error_sink`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn capture(&self, error: &AppError) {
        tracing::warn!(
            target: "tessera::error_sink",
            kind = %error.kind,
            code = %error.code,
            http_status = error.http_status,
            "captured error"
        );
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ErrorSink for NoopSink {
    fn capture(&self, _error: &AppError) {}
}

/// Keeps captured errors in memory. Useful for assertions in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    errors: Mutex<Vec<AppError>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything captured so far, oldest first.
    pub fn captured(&self) -> Vec<AppError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ErrorSink for MemorySink {
    fn capture(&self, error: &AppError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.capture(&AppError::network("first"));
        sink.capture(&AppError::not_found("Ticket"));

        let captured = sink.captured();
        assert_eq!(captured.len(), 2);
        assert!(captured[0].is_network());
        assert!(captured[1].is_not_found());

        sink.clear();
        assert!(sink.is_empty());
    }
}
