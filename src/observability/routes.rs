use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use http::{header::CONTENT_TYPE, StatusCode};
use prometheus::{Encoder, TextEncoder};

use crate::config::settings::MetricsConfig;
use crate::observability::metrics::get_metrics;
use crate::server::server::AppState;

pub fn router(metrics_config: &MetricsConfig) -> Router<AppState> {
    let mut router = Router::new();
    if metrics_config.is_enabled {
        router = router.route(metrics_config.path.as_str(), get(serve_metrics));
    }
    router
}

async fn serve_metrics() -> impl IntoResponse {
    let metrics = get_metrics().await;

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {}", e)).into_response();
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
