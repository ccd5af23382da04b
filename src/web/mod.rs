//! Web server module.

mod handlers;

use crate::checks::Checker;
use crate::config::ServerConfig;
use crate::db::Store;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub checker: Arc<Checker>,
}

/// HTTP API server for Uptrail.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, checker: Arc<Checker>) -> Self {
        Self {
            state: AppState {
                config,
                store,
                checker,
            },
        }
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = routes(self.state.clone());

        tracing::info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Build the router with all routes.
pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/", get(handlers::handle_root))
        // Targets
        .route(
            "/servers",
            get(handlers::handle_list_targets).post(handlers::handle_create_target),
        )
        .route(
            "/servers/{id}",
            patch(handlers::handle_update_target).delete(handlers::handle_delete_target),
        )
        .route("/servers/{id}/history", get(handlers::handle_history))
        .route("/servers/{id}/summary", get(handlers::handle_summary))
        // Outcomes across targets
        .route("/status", get(handlers::handle_latest_status))
        .route("/global-history", get(handlers::handle_global_history))
        // Checks
        .route("/check", post(handlers::handle_run_all))
        .route("/status/{id}", post(handlers::handle_run_one));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .with_state(state)
}
