//! Request handlers relaying local calls to token-protected upstreams.

pub mod stream;
pub mod unary;

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::sources::identity::CredentialError;

/// Errors the proxy handlers can produce (converted to HTTP responses).
#[derive(Debug)]
pub enum ProxyError {
    Credential(CredentialError),
    BadRequest(&'static str),
    UpstreamTransport(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential(e) => write!(f, "{}", e),
            Self::BadRequest(msg) => write!(f, "{}", msg),
            Self::UpstreamTransport(e) => write!(f, "upstream request failed: {}", e),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<CredentialError> for ProxyError {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Credential(_) | Self::UpstreamTransport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "proxy error");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let resp = ProxyError::BadRequest("deviceId is required").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn credential_and_transport_map_to_500() {
        let cases = vec![
            ProxyError::Credential(CredentialError::Exchange("issuer returned 403".into())),
            ProxyError::UpstreamTransport("connection refused".into()),
        ];
        for err in cases {
            assert_eq!(
                err.into_response().status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[test]
    fn error_display_includes_context() {
        assert_eq!(
            ProxyError::BadRequest("deviceId is required").to_string(),
            "deviceId is required"
        );
        assert!(ProxyError::UpstreamTransport("timed out".into())
            .to_string()
            .contains("timed out"));
        assert!(ProxyError::Credential(CredentialError::KeyFile("no such file".into()))
            .to_string()
            .contains("no such file"));
    }
}
