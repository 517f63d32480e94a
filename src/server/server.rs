use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use reqwest::Client;
use tracing::info;

use crate::cache::token_cache::TokenCache;
use crate::config::settings::ProxyConfig;
use crate::observability::metrics::get_metrics;
use crate::observability::routes as metrics_routes;
use crate::proxy::{stream, unary};
use crate::sources::identity::IdentityIssuer;
use crate::utils::constants::{STREAM_CONNECT_TIMEOUT_SECS, STREAM_READ_TIMEOUT_SECS};

/// Shared state injected into every handler: configuration, the token
/// cache and the upstream HTTP client.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<ProxyConfig>,
    pub cache: TokenCache,
    pub client: Client,
}

impl AppState {
    pub fn new(cfg: ProxyConfig) -> Result<Self> {
        // One client for issuer and upstream calls. Unary requests add
        // their own per-request timeout; streams rely on the connect and
        // read bounds only, so an established stream can run indefinitely.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(STREAM_CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(STREAM_READ_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        let issuer = IdentityIssuer::new(client.clone(), &cfg.issuer, cfg.tokens.default_ttl_secs);
        let cache = TokenCache::new(issuer, cfg.tokens.safety_margin_secs);

        Ok(Self {
            cfg: Arc::new(cfg),
            cache,
            client,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/photos", get(unary::photos))
        .route("/sse", get(stream::sse))
        .route("/", get(health))
        .merge(metrics_routes::router(&state.cfg.metrics))
        .with_state(state)
}

async fn health() -> &'static str {
    "Local API is running"
}

/// Bind and serve until a shutdown signal arrives.
pub async fn start(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.cfg.server.host, state.cfg.server.port);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "local proxy listening");
    get_metrics().await.up.set(1);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
