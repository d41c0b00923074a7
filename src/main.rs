//! presence-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and SSE endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use presence_gateway::app_state::AppState;
use presence_gateway::config::{GatewayConfig, LogFormat};
use presence_gateway::domain::{
    ConnectionRegistry, FailureReporter, InMemoryPresenceStore, PresenceStore, TracingReporter,
};
use presence_gateway::persistence::PostgresPresenceStore;
use presence_gateway::service::PresenceService;

/// Time sessions get to announce themselves offline during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting presence-gateway");

    // Build domain layer
    let registry = Arc::new(ConnectionRegistry::new());
    let reporter: Arc<dyn FailureReporter> = Arc::new(TracingReporter);
    let store: Arc<dyn PresenceStore> = if config.persistence_enabled {
        let store = PostgresPresenceStore::connect(&config)
            .await
            .context("connecting presence store")?;
        let reset = store
            .reset_all_offline()
            .await
            .context("resetting stale presence")?;
        tracing::info!(reset, "cleared presence left by previous run");
        Arc::new(store)
    } else {
        tracing::info!("persistence disabled, presence kept in memory");
        Arc::new(InMemoryPresenceStore::new())
    };

    // Build service layer
    let presence_service = PresenceService::new(registry, store, reporter);

    // Build application state
    let app_state = AppState {
        presence_service: presence_service.clone(),
        identity_header: config.identity_header.clone(),
        sse_keep_alive: config.sse_keep_alive(),
    };

    // Build router
    let app = presence_gateway::build_app(app_state);
    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", presence_gateway::api::ApiDoc::openapi()),
        )
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let service = presence_service.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // open streams only end once their sessions close
            service.begin_shutdown();
        })
        .await
        .context("server error")?;

    presence_service.shutdown(SHUTDOWN_GRACE).await;
    tracing::info!("presence-gateway stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
