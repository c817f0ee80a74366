//! hub-operator: syncs Project resources into the hub catalog backend.
//!
//! Watches `projects.hub.0xhub.io`, pushes each spec to the backend API and
//! reports the outcome on the Project status. Health, readiness and metrics
//! are served on the probe address.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hub_operator::backend::{BackendClient, HttpBackendClient};
use hub_operator::config::OperatorConfig;
use hub_operator::controller::{run_controller, ControllerState, KubeProjectStore};
use hub_operator::probes;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hub_operator=info,kube=warn,tower_http=warn".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = OperatorConfig::parse();
    init_tracing(config.log_json);
    config.validate()?;

    info!("Starting hub-operator {}", env!("CARGO_PKG_VERSION"));
    info!("Backend URL: {}", config.backend_url);

    let backend = HttpBackendClient::new(&config.backend_url, config.backend_timeout())
        .context("failed to build backend client")?;
    match backend.health_check().await {
        Ok(()) => info!("Backend is reachable"),
        Err(e) => warn!("Backend health check failed, continuing anyway: {}", e),
    }

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    let store = KubeProjectStore::new(client, config.namespace.clone());
    match &config.namespace {
        Some(ns) => info!("Watching Projects in namespace {}", ns),
        None => info!("Watching Projects in all namespaces"),
    }

    let state = Arc::new(ControllerState::new(Arc::new(backend), Arc::new(store)));

    let probe_server = {
        let state = Arc::clone(&state);
        let addr = config.health_probe_bind_address;
        tokio::spawn(async move {
            if let Err(e) = probes::run_server(state, addr).await {
                error!("Probe server failed: {}", e);
            }
        })
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    let result = run_controller(state, config.controller_config(), shutdown).await;
    probe_server.abort();
    result?;

    info!("hub-operator stopped");
    Ok(())
}
