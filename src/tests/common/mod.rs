// tests/common/mod.rs
pub use axum::{body::Body, Router};
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use httpmock::{Mock, MockServer};
use reqwest::Client;

use crate::config::settings::{
    IssuerConfig, MetricsConfig, ProxyConfig, ServerConfig, TokenConfig, UpstreamConfig,
    UpstreamsConfig,
};
use crate::server::server::AppState;

pub const IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// Minimal unsigned JWT carrying only an `exp` claim.
pub fn sample_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
    format!("{}.{}.", header, payload)
}

/// Proxy configuration pointed at explicit upstream and issuer URLs.
/// Audiences default to the base URLs, as in production.
pub fn test_config(photos_base: &str, events_base: &str, issuer_base: &str) -> ProxyConfig {
    let photos_base = photos_base.trim_end_matches('/').to_string();
    let events_base = events_base.trim_end_matches('/').to_string();
    ProxyConfig {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
        upstreams: UpstreamsConfig {
            photos: UpstreamConfig {
                audience: photos_base.clone(),
                base_url: photos_base,
            },
            events: UpstreamConfig {
                audience: events_base.clone(),
                base_url: events_base,
            },
        },
        issuer: IssuerConfig {
            identity_base_url: issuer_base.trim_end_matches('/').to_string(),
            sa_key_path: None,
        },
        tokens: TokenConfig {
            safety_margin_secs: 300,
            default_ttl_secs: 600,
        },
        metrics: MetricsConfig {
            path: "/metrics".into(),
            is_enabled: false,
        },
    }
}

pub fn test_state(photos_base: &str, events_base: &str, issuer_base: &str) -> AppState {
    AppState::new(test_config(photos_base, events_base, issuer_base)).expect("app state")
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Identity endpoint double for the default service account.
pub async fn mock_identity<'a>(server: &'a MockServer, audience: &str, token: &str) -> Mock<'a> {
    let audience = audience.to_string();
    let token = token.to_string();
    server
        .mock_async(move |when, then| {
            when.method(httpmock::Method::GET)
                .path(IDENTITY_PATH)
                .query_param("audience", audience.as_str())
                .header("Metadata-Flavor", "Google");
            then.status(200).body(token.as_str());
        })
        .await
}
