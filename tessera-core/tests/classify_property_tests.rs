//! Property-Based Tests for Failure Classification
//!
//! **Property: Status mapping is total and stable**
//!
//! Every backend status maps to exactly one kind; statuses outside the
//! classified set become Generic errors coded `HTTP_<status>`.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use tessera_core::{
    classify, total_pages, BackendErrorPayload, Environment, ErrorClassifier, ErrorKind, Failure,
    ListResult, MemorySink,
};

proptest! {
    #[test]
    fn unclassified_status_is_generic(status in 1u16..1000) {
        prop_assume!(![400, 401, 403, 404].contains(&status));
        let err = classify(BackendErrorPayload::new(status, "failure").into());
        prop_assert_eq!(err.kind, ErrorKind::Generic);
        prop_assert_eq!(err.code, format!("HTTP_{}", status));
        prop_assert_eq!(err.http_status, status);
    }

    #[test]
    fn validation_carries_field_map(field in "[a-z_]{1,12}", reason in "[a-zA-Z ]{0,30}") {
        let payload = BackendErrorPayload::new(400, "bad").with_data(field.clone(), json!(reason.clone()));
        let err = classify(payload.into());
        prop_assert_eq!(err.kind, ErrorKind::Validation);
        let details = err.details.expect("details");
        prop_assert_eq!(details.get(&field), Some(&json!(reason)));
    }

    #[test]
    fn user_message_never_echoes_backend_text(status in 0u16..600, message in "[a-z]{12,20}") {
        let err = classify(BackendErrorPayload::new(status, message.clone()).into());
        prop_assert!(!err.user_message.contains(&message));
    }

    #[test]
    fn list_result_invariants(len in 0usize..50, total in 0u64..500, per_page in 1u32..100) {
        let result = ListResult::new(vec![(); len], total, 1, per_page);
        prop_assert!(result.total >= result.items.len() as u64);
        prop_assert_eq!(result.total_pages, total_pages(result.total, per_page));
        prop_assert_eq!(
            u64::from(result.total_pages),
            (result.total + u64::from(per_page) - 1) / u64::from(per_page)
        );
    }
}

#[test]
fn every_handle_call_reports_once() {
    let sink = Arc::new(MemorySink::new());
    let classifier = ErrorClassifier::new(Environment::Production, sink.clone());

    let failures = vec![
        Failure::from(BackendErrorPayload::new(404, "gone")),
        Failure::transport("connection reset by peer"),
        Failure::other("unexpected"),
    ];
    for failure in failures {
        classifier.handle(failure);
    }

    let captured = sink.captured();
    assert_eq!(captured.len(), 3);
    assert_eq!(captured[0].kind, ErrorKind::NotFound);
    assert_eq!(captured[1].kind, ErrorKind::Network);
    assert_eq!(captured[2].kind, ErrorKind::Generic);
}
