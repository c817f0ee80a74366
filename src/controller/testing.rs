//! In-memory stand-ins for the backend and the cluster store

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;

use super::store::{ProjectEvent, ProjectStore};
use crate::backend::{BackendClient, BackendError, BackendRecord};
use crate::crd::{Project, ProjectKey, ProjectSpec, ProjectStatus};
use crate::error::{Error, Result};

/// Build a Project the way the API server would return it
pub fn project(namespace: &str, name: &str, spec: ProjectSpec) -> Project {
    let mut project = Project::new(name, spec);
    project.metadata.namespace = Some(namespace.to_string());
    project
}

pub fn demo_spec() -> ProjectSpec {
    ProjectSpec {
        name: "Demo".to_string(),
        url: "https://demo.io".to_string(),
        ..Default::default()
    }
}

pub fn mark_deleted(project: &mut Project) {
    project.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    project.metadata.finalizers = Some(vec!["hub.0xhub.io/cleanup".to_string()]);
}

/// Backend fake that records every call and can be told to fail per operation
#[derive(Default)]
pub struct FakeBackend {
    records: Mutex<HashMap<String, BackendRecord>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, BackendError>>,
}

impl FakeBackend {
    pub fn with_record(self, record: BackendRecord) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
        self
    }

    /// Make every call to `operation` fail with `error`
    pub fn fail(&self, operation: &'static str, error: BackendError) {
        self.failures.lock().unwrap().insert(operation, error);
    }

    pub fn recover(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    pub fn record(&self, id: &str) -> Option<BackendRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    fn enter(&self, operation: &'static str, id: &str) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", operation, id));
        match self.failures.lock().unwrap().get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BackendClient for FakeBackend {
    async fn create(&self, record: &BackendRecord) -> Result<(), BackendError> {
        self.enter("create", &record.id)?;
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, id: &str, record: &BackendRecord) -> Result<(), BackendError> {
        self.enter("update", id)?;
        self.records
            .lock()
            .unwrap()
            .insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.enter("delete", id)?;
        match self.records.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(BackendError::Rejected {
                status: 404,
                body: r#"{"error":"project not found"}"#.to_string(),
            }),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<BackendRecord>, BackendError> {
        self.enter("get", id)?;
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        self.enter("health", "")
    }
}

/// Cluster store fake with resource-version checks on status writes
///
/// Like the API server, every write (status writes included) is echoed to
/// watchers, and `metadata.generation` only moves when the spec or the
/// deletion marker changes.
pub struct MemoryStore {
    projects: Mutex<HashMap<(String, String), Project>>,
    watchers: Mutex<Vec<UnboundedSender<Result<ProjectEvent>>>>,
    fail_get: Mutex<bool>,
    fail_status: Mutex<Option<fn(String) -> Error>>,
    status_writes: Mutex<usize>,
    installed: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            projects: Mutex::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
            fail_get: Mutex::new(false),
            fail_status: Mutex::new(None),
            status_writes: Mutex::new(0),
            installed: true,
        }
    }
}

impl MemoryStore {
    pub fn uninstalled() -> Self {
        Self {
            installed: false,
            ..Default::default()
        }
    }

    /// Create or replace a Project, as `kubectl apply` would
    pub fn insert(&self, mut project: Project) {
        let key = (project.namespace_or_default(), project.name_any());
        let mut projects = self.projects.lock().unwrap();
        match projects.get(&key) {
            Some(existing) => {
                let changed = existing.spec != project.spec
                    || existing.is_being_deleted() != project.is_being_deleted();
                let generation = existing.metadata.generation.unwrap_or(1);
                project.metadata.generation =
                    Some(if changed { generation + 1 } else { generation });
                project.metadata.resource_version = Some(next_version(
                    existing.metadata.resource_version.as_deref(),
                ));
            }
            None => {
                project.metadata.generation.get_or_insert(1);
                project
                    .metadata
                    .resource_version
                    .get_or_insert_with(|| "1".to_string());
            }
        }
        projects.insert(key, project.clone());
        drop(projects);
        self.publish(ProjectEvent::Applied(project));
    }

    /// Remove a Project outright, without a deletion marker
    pub fn remove(&self, namespace: &str, name: &str) {
        let removed = self
            .projects
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
        if let Some(project) = removed {
            self.publish(ProjectEvent::Deleted(project));
        }
    }

    fn publish(&self, event: ProjectEvent) {
        self.watchers
            .lock()
            .unwrap()
            .retain(|tx| tx.unbounded_send(Ok(event.clone())).is_ok());
    }

    pub fn project(&self, namespace: &str, name: &str) -> Option<Project> {
        self.projects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn status(&self, namespace: &str, name: &str) -> ProjectStatus {
        self.project(namespace, name)
            .and_then(|p| p.status)
            .unwrap_or_default()
    }

    /// Simulate a store outage on reads
    pub fn fail_reads(&self) {
        *self.fail_get.lock().unwrap() = true;
    }

    /// Make every status write fail with the error built by `make_error`
    pub fn fail_status_writes(&self, make_error: fn(String) -> Error) {
        *self.fail_status.lock().unwrap() = Some(make_error);
    }

    /// Bump the stored resource version, as a concurrent writer would
    pub fn touch(&self, namespace: &str, name: &str) {
        let mut projects = self.projects.lock().unwrap();
        if let Some(p) = projects.get_mut(&(namespace.to_string(), name.to_string())) {
            let next = next_version(p.metadata.resource_version.as_deref());
            p.metadata.resource_version = Some(next);
        }
    }

    pub fn status_writes(&self) -> usize {
        *self.status_writes.lock().unwrap()
    }
}

fn next_version(current: Option<&str>) -> String {
    let n: u64 = current.and_then(|v| v.parse().ok()).unwrap_or(0);
    (n + 1).to_string()
}

pub fn conflict(name: String) -> Error {
    Error::StatusConflict { name }
}

pub fn store_outage(_name: String) -> Error {
    Error::KubeError(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: "etcdserver: request timed out".to_string(),
        reason: "ServiceUnavailable".to_string(),
        code: 503,
    }))
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get(&self, key: &ProjectKey) -> Result<Option<Project>> {
        if *self.fail_get.lock().unwrap() {
            return Err(store_outage(key.name.clone()));
        }
        let namespace = key.namespace.clone().unwrap_or_else(|| "default".to_string());
        Ok(self.project(&namespace, &key.name))
    }

    async fn replace_status(&self, project: &Project) -> Result<Project> {
        let name = project.name_any();
        if let Some(make_error) = *self.fail_status.lock().unwrap() {
            return Err(make_error(name));
        }

        let mut projects = self.projects.lock().unwrap();
        let stored = projects
            .get_mut(&(project.namespace_or_default(), name.clone()))
            .ok_or_else(|| store_outage(name.clone()))?;

        if stored.metadata.resource_version != project.metadata.resource_version {
            return Err(Error::StatusConflict { name });
        }

        stored.status = project.status.clone();
        stored.metadata.resource_version =
            Some(next_version(stored.metadata.resource_version.as_deref()));
        let stored = stored.clone();
        drop(projects);

        *self.status_writes.lock().unwrap() += 1;
        self.publish(ProjectEvent::Applied(stored.clone()));
        Ok(stored)
    }

    fn watch(&self) -> BoxStream<'static, Result<ProjectEvent>> {
        let (tx, rx) = mpsc::unbounded();
        for project in self.projects.lock().unwrap().values() {
            let _ = tx.unbounded_send(Ok(ProjectEvent::Applied(project.clone())));
        }
        self.watchers.lock().unwrap().push(tx);
        rx.boxed()
    }

    async fn ensure_installed(&self) -> Result<()> {
        if self.installed {
            Ok(())
        } else {
            Err(Error::ConfigError("the server could not find the requested resource".to_string()))
        }
    }
}
