use crate::config::Config;
use crate::pictures::PictureService;
use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use picforge_storage::BackendConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod routes_pictures;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub pictures: Arc<PictureService>,
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let local = match &ctx.config.storage.backend {
        BackendConfig::Local(options) => Some(options.clone()),
        _ => None,
    };

    let mut app = Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api", routes_pictures::picture_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Root-relative local URLs are served from the store root.
    if let Some(options) = local {
        let base = options.base_url.trim_end_matches('/');
        if options.base_url.starts_with('/') {
            tracing::info!("Serving stored files from {:?} at {}/", options.root, base);
            let files = ServeDir::new(&options.root);
            app = if base.is_empty() {
                app.fallback_service(files)
            } else {
                app.nest_service(base, files)
            };
        }
    }

    app
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config, pictures: Arc<PictureService>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext {
        config: Arc::new(config),
        pictures,
    };

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
