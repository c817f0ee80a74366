//! Operator command line and environment configuration

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::backend::DEFAULT_BACKEND_TIMEOUT;
use crate::controller::ControllerConfig;
use crate::error::{Error, Result};

/// Hub operator: syncs Project resources into the hub catalog backend
#[derive(Parser, Debug, Clone)]
#[command(name = "hub-operator", version, about)]
pub struct OperatorConfig {
    /// Base URL of the hub backend API
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8080")]
    pub backend_url: String,

    /// Timeout for a single backend request, in seconds
    #[arg(long, env = "BACKEND_TIMEOUT_SECS", default_value_t = DEFAULT_BACKEND_TIMEOUT.as_secs())]
    pub backend_timeout_secs: u64,

    /// Address the health, readiness and metrics endpoints bind to
    #[arg(long, default_value = "0.0.0.0:8081")]
    pub health_probe_bind_address: SocketAddr,

    /// Only watch Projects in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Number of Projects reconciled concurrently
    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// Deadline for one reconcile pass, in seconds
    #[arg(long, default_value = "60")]
    pub reconcile_timeout_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl OperatorConfig {
    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://"))
        {
            return Err(Error::ConfigError(format!(
                "backend URL must start with http:// or https://, got {:?}",
                self.backend_url
            )));
        }
        if self.backend_timeout_secs == 0 {
            return Err(Error::ConfigError(
                "backend timeout must be at least one second".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(Error::ConfigError("at least one worker is required".to_string()));
        }
        if self.reconcile_timeout_secs == 0 {
            return Err(Error::ConfigError(
                "reconcile timeout must be at least one second".to_string(),
            ));
        }
        if matches!(self.namespace.as_deref(), Some("")) {
            return Err(Error::ConfigError("namespace must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            workers: self.workers,
            reconcile_timeout: self.reconcile_timeout(),
        }
    }
}
