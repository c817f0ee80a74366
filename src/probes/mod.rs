//! Health, readiness and metrics endpoints
//!
//! Served on the health probe address so the kubelet and Prometheus can
//! reach the operator without going through the API server.

mod server;

pub use server::{router, run_server};
