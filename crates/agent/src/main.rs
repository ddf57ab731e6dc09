//! runclens agent - long-running container inspection service
//!
//! Owns the container cache, keeps it warm with the periodic refresher
//! and serves it over HTTP together with health and Prometheus metrics.

use anyhow::Result;
use runclens_lib::{
    observability::{LensMetrics, StructuredLogger},
    source::Exec,
    Assembler, ContainerCache, Discovery, Refresher, RuncRuntime, Sources,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting runclens-agent");

    let config = config::AgentConfig::load()?;
    info!(
        runc_root = %config.runc_root.display(),
        use_sudo = config.use_sudo,
        "Agent configured"
    );

    // Register metrics before the first scrape
    let _metrics = LensMetrics::new();

    let logger = StructuredLogger::new("agent");
    logger.log_startup(AGENT_VERSION, &config.runc_root.to_string_lossy());

    let runtime = Arc::new(RuncRuntime::new(Exec::new(config.use_sudo), config.runc()));
    let assembler = Assembler::new(Sources::host(&config.sources()));
    let discovery = Discovery::new(runtime, assembler);
    let cache = Arc::new(ContainerCache::new(discovery, config.cache()));

    // Warm the cache once; the refresher and on-demand reads retry later
    if let Err(e) = cache.refresh().await {
        warn!(error = %e, "Initial container refresh failed");
    }

    let refresher = Refresher::new(cache.clone(), config.refresher()).spawn();

    let app_state = Arc::new(api::AppState::new(
        cache,
        logger.clone(),
        config.stale_after(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(e)) => {
                    logger.log_shutdown("API server failed");
                    refresher.shutdown().await;
                    return Err(e);
                }
                Err(e) => {
                    logger.log_shutdown("API server task panicked");
                    refresher.shutdown().await;
                    return Err(e.into());
                }
            }
        }
    }

    refresher.shutdown().await;
    info!("Shutting down");

    Ok(())
}
