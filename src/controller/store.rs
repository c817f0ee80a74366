//! Access to Project resources in the cluster
//!
//! The reconciler only needs three things from the cluster: read a Project,
//! overwrite its status, and learn which keys changed. [`ProjectStore`]
//! captures that surface so the reconcile logic can run against an in-memory
//! store in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{future, StreamExt};
use kube::api::{Api, ListParams, PostParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, ResourceExt};
use tracing::debug;

use crate::crd::{Project, ProjectKey};
use crate::error::{Error, Result};

/// A Project change observed on the watch stream
#[derive(Clone, Debug)]
pub enum ProjectEvent {
    /// Added or modified, including status-only writes
    Applied(Project),
    /// Removed from the cluster
    Deleted(Project),
}

impl ProjectEvent {
    pub fn key(&self) -> ProjectKey {
        match self {
            ProjectEvent::Applied(p) | ProjectEvent::Deleted(p) => p.key(),
        }
    }
}

/// Desired-state fingerprint of a Project: spec generation and deletion marker
type DesiredState = (Option<i64>, bool);

/// Drops watch events that do not change a Project's desired state
///
/// Status writes bump `resourceVersion` but not `metadata.generation`, so the
/// controller's own writes are filtered out here and requeue timing stays
/// with the backoff. Deletions always pass.
#[derive(Debug, Default)]
pub struct ChangeFilter {
    seen: HashMap<ProjectKey, DesiredState>,
}

impl ChangeFilter {
    /// Returns the key to enqueue, or `None` when the event can be ignored
    pub fn admit(&mut self, event: &ProjectEvent) -> Option<ProjectKey> {
        match event {
            ProjectEvent::Applied(project) => {
                let key = project.key();
                let state = (project.metadata.generation, project.is_being_deleted());
                if self.seen.get(&key) == Some(&state) {
                    debug!("Ignoring status-only change of {}", key.name);
                    return None;
                }
                self.seen.insert(key.clone(), state);
                Some(key)
            }
            ProjectEvent::Deleted(project) => {
                let key = project.key();
                self.seen.remove(&key);
                Some(key)
            }
        }
    }
}

/// Read/watch/status-write access to Project resources
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Load the current Project; `Ok(None)` when it no longer exists
    async fn get(&self, key: &ProjectKey) -> Result<Option<Project>>;

    /// Overwrite the status subresource of `project`
    ///
    /// `metadata.resourceVersion` is sent along; a stale version fails with
    /// [`Error::StatusConflict`].
    async fn replace_status(&self, project: &Project) -> Result<Project>;

    /// Projects that were added, changed or removed, starting with the current list
    fn watch(&self) -> BoxStream<'static, Result<ProjectEvent>>;

    /// Verify the Project CRD is served
    async fn ensure_installed(&self) -> Result<()> {
        Ok(())
    }
}

/// [`ProjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeProjectStore {
    client: Client,
    namespace: Option<String>,
}

impl KubeProjectStore {
    /// Watch Projects in `namespace`, or in all namespaces when `None`
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    fn api_for(&self, namespace: Option<&str>) -> Api<Project> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::default_namespaced(self.client.clone()),
        }
    }

    fn watch_api(&self) -> Api<Project> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl ProjectStore for KubeProjectStore {
    async fn get(&self, key: &ProjectKey) -> Result<Option<Project>> {
        let api = self.api_for(key.namespace.as_deref());
        api.get_opt(&key.name).await.map_err(Error::KubeError)
    }

    async fn replace_status(&self, project: &Project) -> Result<Project> {
        let name = project.name_any();
        let api = self.api_for(project.namespace().as_deref());
        let data = serde_json::to_vec(project)?;

        match api.replace_status(&name, &PostParams::default(), data).await {
            Ok(updated) => Ok(updated),
            Err(kube::Error::Api(response)) if response.code == 409 => {
                debug!("Status update conflict for {}: {}", name, response.message);
                Err(Error::StatusConflict { name })
            }
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    fn watch(&self) -> BoxStream<'static, Result<ProjectEvent>> {
        watcher(self.watch_api(), watcher::Config::default())
            .default_backoff()
            .filter_map(|event| {
                future::ready(match event {
                    Ok(watcher::Event::Apply(project)) | Ok(watcher::Event::InitApply(project)) => {
                        Some(Ok(ProjectEvent::Applied(project)))
                    }
                    Ok(watcher::Event::Delete(project)) => Some(Ok(ProjectEvent::Deleted(project))),
                    Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => None,
                    Err(e) => Some(Err(Error::WatchError(e))),
                })
            })
            .boxed()
    }

    async fn ensure_installed(&self) -> Result<()> {
        self.watch_api()
            .list(&ListParams::default().limit(1))
            .await
            .map(|_| ())
            .map_err(|e| Error::ConfigError(format!("Project CRD not installed: {}", e)))
    }
}
