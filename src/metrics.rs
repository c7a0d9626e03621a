//! Prometheus counters for the purchasing workflow.
//!
//! Counters are registered lazily in the default registry so any embedding
//! application can expose them with `prometheus::gather()`.

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    pub static ref STATUS_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "purchasing_status_transitions_total",
        "Lifecycle transitions by entity type and target status",
        &["entity_type", "to_status"]
    )
    .expect("metric can be created");
    pub static ref AUTHORIZATION_DENIALS: IntCounterVec = register_int_counter_vec!(
        "purchasing_authorization_denials_total",
        "Operations rejected by the authorization gate",
        &["action", "role"]
    )
    .expect("metric can be created");
    pub static ref DOCUMENTS_NUMBERED: IntCounterVec = register_int_counter_vec!(
        "purchasing_documents_numbered_total",
        "Document numbers allocated by category",
        &["category"]
    )
    .expect("metric can be created");
    pub static ref OPERATION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "purchasing_operation_failures_total",
        "Failed workflow operations by error kind",
        &["operation", "error_type"]
    )
    .expect("metric can be created");
}

pub fn record_transition(entity_type: &str, to_status: &str) {
    STATUS_TRANSITIONS
        .with_label_values(&[entity_type, to_status])
        .inc();
}

pub fn record_denial(action: &str, role: &str) {
    AUTHORIZATION_DENIALS.with_label_values(&[action, role]).inc();
}

pub fn record_document_numbered(category: &str) {
    DOCUMENTS_NUMBERED.with_label_values(&[category]).inc();
}

pub fn record_failure(operation: &str, error_type: &str) {
    OPERATION_FAILURES
        .with_label_values(&[operation, error_type])
        .inc();
}
