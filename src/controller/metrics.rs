//! Prometheus metrics for the hub operator

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicI64;

/// Labels identifying a Project
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProjectLabels {
    pub namespace: String,
    pub name: String,
}

/// Outcome of a reconcile pass: success, requeue or error
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    pub result: String,
}

/// Backend call outcome
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BackendRequestLabels {
    pub operation: String,
    pub outcome: String,
}

/// Reconcile passes by result
pub static RECONCILIATIONS: Lazy<Family<ReconcileLabels, Counter>> = Lazy::new(Family::default);

/// Current retry counter per Project
pub static PROJECT_RETRY_COUNT: Lazy<Family<ProjectLabels, Gauge<i64, AtomicI64>>> =
    Lazy::new(Family::default);

/// Backend calls by operation and outcome
pub static BACKEND_REQUESTS: Lazy<Family<BackendRequestLabels, Counter>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();
    registry.register(
        "hub_operator_reconciliations",
        "Reconcile passes by result",
        RECONCILIATIONS.clone(),
    );
    registry.register(
        "hub_operator_project_retry_count",
        "Consecutive failed sync attempts of a Project",
        PROJECT_RETRY_COUNT.clone(),
    );
    registry.register(
        "hub_operator_backend_requests",
        "Calls to the hub backend API by operation and outcome",
        BACKEND_REQUESTS.clone(),
    );
    registry
});

/// Count a finished reconcile pass
pub fn record_reconcile(result: &str) {
    let labels = ReconcileLabels {
        result: result.to_string(),
    };
    RECONCILIATIONS.get_or_create(&labels).inc();
}

/// Update the retry gauge for a Project
pub fn set_retry_count(namespace: &str, name: &str, retry_count: u32) {
    let labels = ProjectLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    PROJECT_RETRY_COUNT
        .get_or_create(&labels)
        .set(i64::from(retry_count));
}

/// Drop the retry gauge of a Project that no longer exists
pub fn forget_project(namespace: &str, name: &str) {
    let labels = ProjectLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    PROJECT_RETRY_COUNT.remove(&labels);
}

/// Count a backend call
pub fn record_backend_request(operation: &str, outcome: &str) {
    let labels = BackendRequestLabels {
        operation: operation.to_string(),
        outcome: outcome.to_string(),
    };
    BACKEND_REQUESTS.get_or_create(&labels).inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_registry_exposes_operator_metrics() {
        record_reconcile("success");
        set_retry_count("metrics-test", "demo", 3);
        record_backend_request("create", "rejected");

        let mut buffer = String::new();
        encode(&mut buffer, &REGISTRY).unwrap();

        assert!(buffer.contains("hub_operator_reconciliations_total"));
        assert!(buffer.contains(r#"namespace="metrics-test",name="demo""#));
        assert!(buffer.contains(r#"operation="create",outcome="rejected""#));
    }

    #[test]
    fn test_forget_project_removes_gauge() {
        set_retry_count("metrics-forget", "gone", 1);
        forget_project("metrics-forget", "gone");

        let mut buffer = String::new();
        encode(&mut buffer, &REGISTRY).unwrap();
        assert!(!buffer.contains(r#"namespace="metrics-forget""#));
    }
}
