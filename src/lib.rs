//! Kubernetes operator that keeps the hub catalog backend in sync with
//! `Project` resources.

pub mod backend;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod probes;

pub use error::{Error, Result};
