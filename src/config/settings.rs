use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

use crate::utils::constants::{
    DEFAULT_ISSUER_URL, DEFAULT_SAFETY_MARGIN_SECS, DEFAULT_TOKEN_TTL_SECS,
};

/// ================================
/// Service-wide settings
/// ================================
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub upstreams: UpstreamsConfig,
    pub issuer: IssuerConfig,
    pub tokens: TokenConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// One token-protected upstream. The audience defaults to the base URL,
/// which is how Cloud Run style services scope their identity tokens.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamsConfig {
    pub photos: UpstreamConfig,
    pub events: UpstreamConfig,
}

#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Base URL of the identity endpoint (metadata-server shaped).
    pub identity_base_url: String,
    /// Optional service-account key; selects the account to mint for.
    pub sa_key_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub safety_margin_secs: u64,
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub path: String,
    pub is_enabled: bool,
}

impl ProxyConfig {
    /// Assemble and validate configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let photos_base = require_url("PHOTO_API_URL")?;
        let events_base = require_url("KIOSK_URL")?;

        Ok(Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: parse_env("PORT", 8080u16)?,
            },
            upstreams: UpstreamsConfig {
                photos: UpstreamConfig {
                    audience: env_or("PHOTO_API_AUDIENCE", &photos_base),
                    base_url: photos_base,
                },
                events: UpstreamConfig {
                    audience: env_or("KIOSK_AUDIENCE", &events_base),
                    base_url: events_base,
                },
            },
            issuer: IssuerConfig {
                identity_base_url: env_or("ISSUER_URL", DEFAULT_ISSUER_URL)
                    .trim_end_matches('/')
                    .to_string(),
                sa_key_path: env::var("SA_KEY_PATH").ok().filter(|p| !p.is_empty()),
            },
            tokens: TokenConfig {
                safety_margin_secs: parse_env("TOKEN_SAFETY_MARGIN_SECS", DEFAULT_SAFETY_MARGIN_SECS)?,
                default_ttl_secs: parse_env("TOKEN_DEFAULT_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            },
            metrics: MetricsConfig {
                path: env_or("METRICS_PATH", "/metrics"),
                is_enabled: parse_env("METRICS_ENABLED", false)?,
            },
        })
    }
}

fn require_url(key: &str) -> Result<String> {
    let value = match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().trim_end_matches('/').to_string(),
        _ => bail!("{} must be set", key),
    };
    if !value.starts_with("http://") && !value.starts_with("https://") {
        bail!("{} must be an http(s) URL, got '{}'", key, value);
    }
    Ok(value)
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {} '{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}
