use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use crate::observability::metrics::get_metrics;
use crate::proxy::ProxyError;
use crate::server::server::AppState;
use crate::utils::constants::UNARY_TIMEOUT_SECS;

/// Relay `/api/photos` to the photos upstream with a fresh bearer token.
///
/// The upstream status code is relayed verbatim; the body is forwarded as
/// JSON, or wrapped in a `{"raw": ...}` envelope when it is not JSON.
pub async fn photos(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    let upstream = &state.cfg.upstreams.photos;
    let token = state.cache.get_token(&upstream.audience).await?;

    let mut url = format!("{}/api/photos", upstream.base_url);
    if let Some(q) = query.as_deref().filter(|q| !q.is_empty()) {
        url = format!("{}?{}", url, q);
    }

    let response = state
        .client
        .get(&url)
        .bearer_auth(&token)
        .timeout(Duration::from_secs(UNARY_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))?;

    get_metrics()
        .await
        .proxied_requests
        .with_label_values(&["/api/photos", status.as_str()])
        .inc();

    Ok((status, Json(passthrough_body(&text))).into_response())
}

/// Upstream bodies are forwarded as-is when they parse as JSON; anything
/// else is wrapped so the local client always receives well-formed JSON.
fn passthrough_body(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "upstream body is not JSON, wrapping as raw text");
            json!({ "raw": text })
        }
    }
}
