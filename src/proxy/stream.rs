use std::collections::HashMap;
use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::observability::metrics::get_metrics;
use crate::proxy::ProxyError;
use crate::server::server::AppState;
use crate::utils::constants::RELAY_CHANNEL_CAPACITY;

/// Relay `/sse` from the events upstream as a long-lived event stream.
///
/// The relay task is bound to the local connection: once the local client
/// disconnects, the channel backing the response body closes, the task
/// observes the failed send and drops the upstream response, which closes
/// its socket. Reconnecting is the local client's responsibility.
pub async fn sse(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    if params.get("deviceId").map_or(true, |v| v.is_empty()) {
        return Err(ProxyError::BadRequest("deviceId is required"));
    }

    // The upstream falls back to Last-Event-ID when `since` is absent, so
    // the inbound header is forwarded verbatim.
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let (tx, rx) = mpsc::channel::<String>(RELAY_CHANNEL_CAPACITY);
    tokio::spawn(relay(state, params, last_event_id, tx));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    Ok((
        [(CONTENT_TYPE, "text/event-stream"), (CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response())
}

/// Run the relay loop and emit the terminal error frame when the upstream
/// side fails or ends. A local disconnect produces no frame.
async fn relay(
    state: AppState,
    params: HashMap<String, String>,
    last_event_id: Option<String>,
    tx: mpsc::Sender<String>,
) {
    let metrics = get_metrics().await;
    metrics.sse_streams_active.inc();

    if let Some(reason) = relay_inner(&state, params, last_event_id, &tx).await {
        warn!(%reason, "event stream terminated");
        let frame = format!("event: error\ndata: {}\n\n", json!({ "error": reason }));
        // best effort: the local side may already be gone
        let _ = tx.send(frame).await;
    }

    metrics.sse_streams_active.dec();
}

/// Returns the failure description for the terminal error frame, or `None`
/// when the local client went away first.
async fn relay_inner(
    state: &AppState,
    params: HashMap<String, String>,
    last_event_id: Option<String>,
    tx: &mpsc::Sender<String>,
) -> Option<String> {
    let upstream = &state.cfg.upstreams.events;
    let token = match state.cache.get_token(&upstream.audience).await {
        Ok(token) => token,
        Err(e) => return Some(e.to_string()),
    };

    let url = format!("{}/sse", upstream.base_url);
    let mut request = state
        .client
        .get(&url)
        .query(&params)
        .header(ACCEPT, "text/event-stream")
        .bearer_auth(&token);
    if let Some(id) = last_event_id {
        request = request.header("Last-Event-ID", id);
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => return Some(format!("upstream connect failed: {}", e)),
    };
    if !response.status().is_success() {
        return Some(format!("upstream returned {}", response.status()));
    }

    info!(%url, "relaying upstream event stream");

    // Forward line by line, exactly as read. Blank separator lines are part
    // of the SSE framing and are relayed too.
    let mut upstream_body = response.bytes_stream();
    let mut buf = String::new();

    while let Some(chunk) = upstream_body.next().await {
        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => return Some(format!("upstream read failed: {}", e)),
        };
        buf.push_str(&String::from_utf8_lossy(&bytes));

        for line in drain_lines(&mut buf) {
            if tx.send(line).await.is_err() {
                debug!("local client disconnected, closing upstream stream");
                return None;
            }
        }
    }

    // trailing bytes without a newline, if the upstream ended mid-line
    if !buf.is_empty() {
        let mut line = std::mem::take(&mut buf);
        if line.ends_with('\r') {
            line.pop();
        }
        line.push('\n');
        if tx.send(line).await.is_err() {
            return None;
        }
    }

    Some("upstream stream ended".to_string())
}

/// Drain complete lines out of `buf`, normalizing CRLF to LF. Each returned
/// line keeps its trailing newline; blank lines come back as `"\n"`.
fn drain_lines(buf: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let mut line: String = buf.drain(..=pos).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        line.push('\n');
        lines.push(line);
    }
    lines
}
