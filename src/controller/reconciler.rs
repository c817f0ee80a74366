//! One reconciliation pass for a single Project key
//!
//! The pass re-reads the Project, pushes its spec into the hub backend and
//! records the outcome on the Project status. Backend failures never escape:
//! they are written to `status.error` and turned into a backoff requeue.
//! Only store failures (read or status write) are returned as errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::metrics;
use super::status::commit_status;
use super::store::ProjectStore;
use crate::backend::{BackendClient, BackendError, BackendRecord};
use crate::crd::{Project, ProjectKey};
use crate::error::Result;

/// Shared state for the controller
pub struct ControllerState {
    pub backend: Arc<dyn BackendClient>,
    pub store: Arc<dyn ProjectStore>,
    ready: AtomicBool,
}

impl ControllerState {
    pub fn new(backend: Arc<dyn BackendClient>, store: Arc<dyn ProjectStore>) -> Self {
        Self {
            backend,
            store,
            ready: AtomicBool::new(false),
        }
    }

    /// True while the workers are running
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }
}

/// Backend write chosen for a present Project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncAction {
    Create,
    Update,
}

impl SyncAction {
    fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Create => "create",
            SyncAction::Update => "update",
        }
    }
}

/// Reconcile the Project identified by `key`
///
/// Returns the delay after which the key should be delivered again, or
/// `None` when no requeue is needed.
#[instrument(skip(ctx), fields(name = %key.name, namespace = key.namespace.as_deref()))]
pub async fn reconcile(key: &ProjectKey, ctx: &ControllerState) -> Result<Option<Duration>> {
    let project = match ctx.store.get(key).await? {
        Some(project) => project,
        None => {
            delete_absent(key, ctx).await;
            return Ok(None);
        }
    };

    if project.is_being_deleted() {
        return delete_marked(&project, ctx).await;
    }

    sync_project(&project, ctx).await
}

/// The Project is gone from the cluster: remove its backend record, best effort
///
/// There is no status left to report on, so failures are only logged.
async fn delete_absent(key: &ProjectKey, ctx: &ControllerState) {
    info!(
        "Project {} not found, removing it from the backend",
        key.name
    );

    if let Err(e) = ctx.backend.delete(&key.name).await {
        debug!("Best-effort backend delete of {} failed: {}", key.name, e);
    }

    let namespace = key.namespace.as_deref().unwrap_or("default");
    metrics::forget_project(namespace, &key.name);
}

/// The Project carries a deletion timestamp: remove its record and retry on failure
async fn delete_marked(project: &Project, ctx: &ControllerState) -> Result<Option<Duration>> {
    let name = project.name_any();
    info!("Project {} is being deleted, removing it from the backend", name);

    if let Err(e) = ctx.backend.delete(&name).await {
        return record_failure(project, ctx, "delete", e).await;
    }

    let mut status = project.current_status();
    status.mark_deleted();
    if let Err(e) = commit_status(ctx.store.as_ref(), project, status).await {
        warn!("Failed to update status after deleting {}: {}", name, e);
    }

    Ok(None)
}

/// Create or update the backend record so it matches the Project spec
async fn sync_project(project: &Project, ctx: &ControllerState) -> Result<Option<Duration>> {
    let name = project.name_any();
    let desired = BackendRecord::from_spec(&name, &project.spec);

    let action = match ctx.backend.get(&name).await {
        Ok(Some(existing)) if existing.needs_update(&desired) => {
            debug!(
                "Project {} differs from backend in {:?}",
                name,
                existing.changed_fields(&desired)
            );
            Some(SyncAction::Update)
        }
        Ok(Some(_)) => {
            info!("Project {} already in sync", name);
            None
        }
        Ok(None) => Some(SyncAction::Create),
        Err(e) => {
            // A failed lookup is treated like a missing record.
            warn!("Backend lookup of {} failed ({}), attempting create", name, e);
            Some(SyncAction::Create)
        }
    };

    if let Some(action) = action {
        info!("Running backend {} for project {}", action.as_str(), name);
        let result = match action {
            SyncAction::Create => ctx.backend.create(&desired).await,
            SyncAction::Update => ctx.backend.update(&name, &desired).await,
        };
        if let Err(e) = result {
            return record_failure(project, ctx, action.as_str(), e).await;
        }
    }

    let mut status = project.current_status();
    status.mark_synced(Utc::now());
    commit_status(ctx.store.as_ref(), project, status).await?;

    info!("Successfully synced project {} to backend", name);
    Ok(None)
}

/// Record a failed backend write on the status and schedule the retry
async fn record_failure(
    project: &Project,
    ctx: &ControllerState,
    action: &str,
    error: BackendError,
) -> Result<Option<Duration>> {
    let name = project.name_any();
    let mut status = project.current_status();

    warn!(
        "Failed to {} project {} in backend (retryCount={}): {}",
        action, name, status.retry_count, error
    );

    let delay = status.mark_failed(format!("Failed to {}: {}", action, error), Utc::now());
    let retry_count = status.retry_count;
    commit_status(ctx.store.as_ref(), project, status).await?;

    info!(
        "Will retry {} of project {} (retryCount={}) in {:?}",
        action, name, retry_count, delay
    );
    Ok(Some(delay))
}
