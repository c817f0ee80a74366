//! Custom Resource Definitions for the hub operator
//!
//! This module defines the Kubernetes CRD for catalog projects.

mod project;

pub use project::{Project, ProjectKey, ProjectSpec, ProjectStatus};
