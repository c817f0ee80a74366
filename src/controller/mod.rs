//! Controller module for Project reconciliation
//!
//! This module contains the main controller loop, the per-key reconcile
//! pass, and the work queue and store seams it runs on.

mod backoff;
pub mod metrics;
mod queue;
mod reconciler;
mod runner;
mod status;
mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use backoff::{calculate_backoff, BASE_RETRY_DELAY, MAX_RETRY_COUNT, MAX_RETRY_DELAY};
pub use queue::{ReconcileQueue, WorkQueue};
pub use reconciler::{reconcile, ControllerState};
pub use runner::{error_policy, run_controller, ControllerConfig};
pub use status::commit_status;
pub use store::{ChangeFilter, KubeProjectStore, ProjectEvent, ProjectStore};
