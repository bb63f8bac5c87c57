//! Linkshot server binary

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linkshot::generator::{HttpMetadataFetcher, Renderer};
use linkshot::github::HttpRepoFetcher;
use linkshot::registry::{Domain, DomainRegistry, InMemoryDomainRegistry};
use linkshot::{create_router, spawn_maintenance_task, AppState, Config};

/// Main entry point for the Linkshot server.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Initialize tracing subscriber for logging
/// 3. Seed the domain registry and launch the renderer
/// 4. Start the maintenance task (runs once immediately)
/// 5. Serve until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    let default_filter = if config.debug {
        "linkshot=debug,tower_http=debug"
    } else {
        "linkshot=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Linkshot server");
    info!(
        "Configuration loaded: port={}, data_dir={}, screenshot_timeout={:?}",
        config.server_port,
        config.data_dir.display(),
        config.screenshot_timeout
    );
    for warning in config.warnings() {
        warn!("{warning}");
    }

    let registry = Arc::new(InMemoryDomainRegistry::new());
    for pattern in &config.authorized_domains {
        registry
            .upsert(Domain::from_pattern(pattern))
            .await
            .with_context(|| format!("failed to seed domain {pattern}"))?;
    }
    info!("Domain registry seeded with {} entries", config.authorized_domains.len());

    let renderer = launch_renderer().await?;
    let metadata = Arc::new(
        HttpMetadataFetcher::new(config.screenshot_timeout).context("failed to build metadata client")?,
    );

    let github = Arc::new(HttpRepoFetcher::new(config.github_timeout).context("failed to build GitHub client")?);

    let state = AppState::from_config(&config, registry.clone(), renderer, metadata, github);

    let maintenance_handle = spawn_maintenance_task(
        registry,
        state.prune_targets(),
        config.maintenance_interval,
        config.retention(),
    );
    info!("Background maintenance task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(maintenance_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(feature = "render")]
async fn launch_renderer() -> anyhow::Result<Arc<dyn Renderer>> {
    let renderer = linkshot::generator::ChromiumRenderer::launch()
        .await
        .context("failed to launch headless browser")?;
    info!("Headless browser launched");
    Ok(Arc::new(renderer))
}

#[cfg(not(feature = "render"))]
async fn launch_renderer() -> anyhow::Result<Arc<dyn Renderer>> {
    warn!("built without the render feature; link previews will fail");
    Ok(Arc::new(linkshot::generator::UnavailableRenderer))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the maintenance task and allows graceful shutdown.
async fn shutdown_signal(maintenance_handle: JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    maintenance_handle.abort();
    warn!("Maintenance task aborted");
}
