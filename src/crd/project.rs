//! Project Custom Resource Definition
//!
//! A Project declares a catalog entry that the operator keeps in sync with
//! the hub backend API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kube::runtime::reflector::ObjectRef;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::controller::calculate_backoff;

/// Identity of a Project as delivered to the reconciler (namespace + name)
pub type ProjectKey = ObjectRef<Project>;

/// The Project CRD represents one entry of the hub catalog.
///
/// # Example
///
/// ```yaml
/// apiVersion: hub.0xhub.io/v1
/// kind: Project
/// metadata:
///   name: demo
///   namespace: default
/// spec:
///   name: Demo
///   description: A demo project
///   url: https://demo.io
///   category: tooling
///   status: active
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "hub.0xhub.io",
    version = "v1",
    kind = "Project",
    namespaced,
    status = "ProjectStatus",
    shortname = "proj",
    printcolumn = r#"{"name":"Display Name","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Synced","type":"boolean","jsonPath":".status.synced"}"#,
    printcolumn = r#"{"name":"Retries","type":"integer","jsonPath":".status.retryCount"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// Display name shown in the catalog
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Project homepage
    pub url: String,

    /// Icon URL or identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,

    /// Catalog category (e.g., "tooling", "defi")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,

    /// Status label shown next to the entry (e.g., "active", "beta")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
}

/// Status subresource for Project
///
/// Reports the outcome of the last sync attempt against the backend.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// True once the backend record matches the spec
    #[serde(default)]
    pub synced: bool,

    /// Last sync error, empty when synced
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// Time of the last successful sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Time of the last failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<DateTime<Utc>>,

    /// Consecutive failed attempts since the last success
    #[serde(default)]
    pub retry_count: u32,
}

impl ProjectStatus {
    /// Record a successful create, update or no-op sync
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.synced = true;
        self.error.clear();
        self.last_synced_at = Some(now);
        self.last_retry_at = None;
        self.retry_count = 0;
    }

    /// Record a failed attempt; `last_synced_at` is left untouched
    ///
    /// Returns the delay before the next attempt, computed from the retry
    /// count as it was before this failure.
    pub fn mark_failed(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Duration {
        let delay = calculate_backoff(self.retry_count);
        self.synced = false;
        self.error = message.into();
        self.last_retry_at = Some(now);
        self.retry_count = self.retry_count.saturating_add(1);
        delay
    }

    /// Record a successful backend delete
    pub fn mark_deleted(&mut self) {
        self.error.clear();
        self.retry_count = 0;
    }
}

impl Project {
    /// Key used by the work queue and the store
    pub fn key(&self) -> ProjectKey {
        ObjectRef::from_obj(self)
    }

    /// True once removal has been requested
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Current status, or the default for a never-reconciled resource
    pub fn current_status(&self) -> ProjectStatus {
        self.status.clone().unwrap_or_default()
    }

    /// Namespace with the Kubernetes default applied
    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }
}
