//! Relay server: configuration, shared state, and the axum router

use crate::handlers::{cancel_handler, health_check, stream_handler};
use crate::upstream::UpstreamClient;
use axum::routing::{get, post};
use axum::Router;
use chatstream_core::{Result, SessionRegistry, StreamConfig};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

/// Request bodies above this are rejected outright. Sized for a 10 MB
/// attachment in base64 plus JSON overhead.
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Upstream automation webhook URL
    pub webhook_url: String,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3900,
            webhook_url: "http://localhost:5678/webhook/chat".to_string(),
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    /// Build config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("CHATSTREAM_HOST").unwrap_or(defaults.host),
            port: std::env::var("CHATSTREAM_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            webhook_url: std::env::var("CHATSTREAM_WEBHOOK_URL").unwrap_or(defaults.webhook_url),
            enable_cors: std::env::var("CHATSTREAM_ENABLE_CORS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.enable_cors),
        }
    }
}

/// Shared state for all handlers
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Per-session pipeline configuration
    pub stream: StreamConfig,

    /// In-flight session registry
    pub registry: SessionRegistry,

    /// Upstream webhook client
    pub upstream: UpstreamClient,
}

impl ServerState {
    /// Build state from a server config, reading stream tuning from the
    /// environment
    pub fn new(config: ServerConfig) -> Self {
        let upstream = UpstreamClient::new(config.webhook_url.clone());
        Self {
            config: Arc::new(config),
            stream: StreamConfig::from_env(),
            registry: SessionRegistry::new(),
            upstream,
        }
    }
}

/// Build the axum router
pub fn build_router(state: ServerState) -> Router {
    let enable_cors = state.config.enable_cors;

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/stream", post(stream_handler))
        .route("/stream/cancel", post(cancel_handler))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state);

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Bind and serve until the process is stopped
pub async fn run(config: ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = ServerState::new(config);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("SERVER_START addr={}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
