//! Client side of the hub backend API
//!
//! The operator pushes Project specs into the hub catalog through the
//! [`BackendClient`] trait. [`HttpBackendClient`] is the production
//! implementation; tests substitute in-memory fakes.

mod client;
mod error;
mod record;

pub use client::{BackendClient, HttpBackendClient, DEFAULT_BACKEND_TIMEOUT};
pub use error::BackendError;
pub use record::BackendRecord;
