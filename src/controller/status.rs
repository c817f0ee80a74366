//! Persisting sync outcomes onto the Project status subresource

use kube::ResourceExt;
use tracing::{debug, warn};

use super::metrics;
use super::store::ProjectStore;
use crate::crd::{Project, ProjectStatus};
use crate::error::{Error, Result};

/// Overwrite the status of `project` with `status`
///
/// The write carries the resource version `project` was read at, so a
/// concurrent writer surfaces as [`Error::StatusConflict`] instead of being
/// silently overwritten.
pub async fn commit_status(
    store: &dyn ProjectStore,
    project: &Project,
    status: ProjectStatus,
) -> Result<Project> {
    let namespace = project.namespace_or_default();
    let name = project.name_any();
    let retry_count = status.retry_count;

    let mut updated = project.clone();
    updated.status = Some(status);

    match store.replace_status(&updated).await {
        Ok(stored) => {
            debug!(
                "Status committed for {}/{} (retryCount={})",
                namespace, name, retry_count
            );
            metrics::set_retry_count(&namespace, &name, retry_count);
            Ok(stored)
        }
        Err(e @ Error::StatusConflict { .. }) => {
            debug!("Status of {}/{} changed underneath us", namespace, name);
            Err(e)
        }
        Err(e) => {
            warn!("Failed to update status of {}/{}: {}", namespace, name, e);
            Err(e)
        }
    }
}
