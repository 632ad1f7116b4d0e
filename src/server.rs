use crate::{
    config::{Config, StorageBackendKind},
    handlers,
    middleware::LoggingLayer,
    resource::ResourceService,
    storage::{MemoryStore, ObjectStore, ObjectStoreGateway, S3Store},
};
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub resources: ResourceService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        let gateway = Arc::new(ObjectStoreGateway::new(store));
        Self {
            config,
            resources: ResourceService::new(gateway),
        }
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    // Initialize storage backend
    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackendKind::S3 => Arc::new(
            S3Store::new(&config.storage)
                .await
                .context("failed to configure S3 client")?,
        ),
        StorageBackendKind::Memory => {
            info!("Using in-memory object store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(config.clone(), store));
    state
        .resources
        .gateway()
        .ensure_bucket()
        .await
        .with_context(|| format!("failed to initialize bucket {}", config.storage.bucket))?;

    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;

    info!("IronCloud listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/api/resource",
            get(handlers::get_resource_info)
                .delete(handlers::delete_resource)
                .post(handlers::upload_resources),
        )
        .route("/api/resource/download", get(handlers::download_resource))
        .route("/api/resource/move", get(handlers::move_resource))
        .route("/api/resource/search", get(handlers::search_resources))
        .route(
            "/api/directory",
            get(handlers::list_directory).post(handlers::create_directory),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::identity_middleware,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(api)
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(LoggingLayer::new());

    let app = if state.config.server.cors_allow_any {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    app.with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
