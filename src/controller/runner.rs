//! Controller main loop: watch events in, reconcile passes out
//!
//! The watch pump turns Project events into queue keys, skipping events
//! that leave the desired state unchanged, such as our own status writes.
//! A fixed pool of workers pulls keys off the [`WorkQueue`] and runs one
//! reconcile pass per key under a deadline. Requeue decisions go back into the same queue.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::metrics;
use super::queue::{ReconcileQueue, WorkQueue};
use super::reconciler::{reconcile, ControllerState};
use super::store::ChangeFilter;
use crate::crd::ProjectKey;
use crate::error::{Error, Result};

/// Delay before retrying a pass that failed with a retriable error
const RETRIABLE_ERROR_DELAY: Duration = Duration::from_secs(15);

/// Delay before retrying a pass that failed with any other error
const ERROR_DELAY: Duration = Duration::from_secs(60);

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of keys reconciled concurrently
    pub workers: usize,
    /// Deadline for a single reconcile pass
    pub reconcile_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            reconcile_timeout: Duration::from_secs(60),
        }
    }
}

/// Main entry point to start the controller
///
/// Runs until `shutdown` resolves. In-flight passes are aborted on shutdown;
/// their keys are picked up again from the initial list after a restart.
pub async fn run_controller<F>(
    state: Arc<ControllerState>,
    config: ControllerConfig,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    info!("Starting Project controller");

    // Verify CRD exists
    match state.store.ensure_installed().await {
        Ok(()) => info!("Project CRD is available"),
        Err(e) => {
            error!(
                "Project CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError("Project CRD not installed".to_string()));
        }
    }

    let queue: Arc<dyn WorkQueue<ProjectKey>> = Arc::new(ReconcileQueue::new());

    let pump = {
        let events = state.store.watch();
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            let mut events = events;
            let mut filter = ChangeFilter::default();
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if let Some(key) = filter.admit(&event) {
                            queue.add(key).await;
                        }
                    }
                    Err(e) => warn!("Project watch error: {}", e),
                }
            }
            debug!("Project watch stream ended");
        })
    };

    let workers: Vec<_> = (0..config.workers.max(1))
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                Arc::clone(&state),
                Arc::clone(&queue),
                config.reconcile_timeout,
            ))
        })
        .collect();

    state.set_ready(true);
    info!("Project controller running with {} worker(s)", workers.len());

    shutdown.await;

    info!("Shutting down Project controller");
    state.set_ready(false);
    pump.abort();
    queue.shut_down().await;
    for worker in workers {
        worker.abort();
        if let Err(e) = worker.await {
            if !e.is_cancelled() {
                error!("Reconcile worker failed: {}", e);
            }
        }
    }

    Ok(())
}

/// Pull keys until the queue shuts down
async fn run_worker(
    id: usize,
    state: Arc<ControllerState>,
    queue: Arc<dyn WorkQueue<ProjectKey>>,
    reconcile_timeout: Duration,
) {
    debug!("Reconcile worker {} started", id);

    while let Some(key) = queue.dequeue().await {
        process_key(&key, &state, queue.as_ref(), reconcile_timeout).await;
        queue.done(&key).await;
    }

    debug!("Reconcile worker {} stopped", id);
}

/// Run one pass for `key` and feed the outcome back into the queue
pub(crate) async fn process_key(
    key: &ProjectKey,
    state: &ControllerState,
    queue: &dyn WorkQueue<ProjectKey>,
    reconcile_timeout: Duration,
) {
    let result = match tokio::time::timeout(reconcile_timeout, reconcile(key, state)).await {
        Ok(result) => result,
        Err(_) => Err(Error::ReconcileTimeout {
            key: key.to_string(),
            timeout: reconcile_timeout,
        }),
    };

    match result {
        Ok(None) => {
            metrics::record_reconcile("success");
            info!("Reconciled: {}", key);
        }
        Ok(Some(delay)) => {
            metrics::record_reconcile("requeue");
            queue.requeue_after(key.clone(), delay).await;
        }
        Err(e) => {
            metrics::record_reconcile("error");
            let delay = error_policy(key, &e);
            queue.requeue_after(key.clone(), delay).await;
        }
    }
}

/// Error policy determines how soon a failed pass is retried
///
/// Status conflicts are retried immediately and do not touch the retry
/// counter; the next pass re-reads the Project at its new version.
pub fn error_policy(key: &ProjectKey, error: &Error) -> Duration {
    match error {
        Error::StatusConflict { .. } => {
            debug!("Status conflict for {}, requeuing immediately", key);
            Duration::ZERO
        }
        e if e.is_retriable() => {
            error!("Reconciliation error for {}: {}", key, e.status_message());
            RETRIABLE_ERROR_DELAY
        }
        e => {
            error!("Reconciliation error for {}: {}", key, e.status_message());
            ERROR_DELAY
        }
    }
}
