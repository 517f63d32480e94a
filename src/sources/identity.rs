use std::fmt;
use std::fs;

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::token::CachedToken;
use crate::config::settings::IssuerConfig;
use crate::helpers::time::now_unix;
use crate::utils::constants::{METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE};

/// Failure minting a token: either the key material or the exchange with
/// the issuing endpoint.
#[derive(Debug)]
pub enum CredentialError {
    KeyFile(String),
    Exchange(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyFile(e) => write!(f, "service account key unusable: {}", e),
            Self::Exchange(e) => write!(f, "identity token exchange failed: {}", e),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Subset of the service-account key JSON the proxy needs. The signing
/// itself is delegated to the identity endpoint; the key only selects
/// which account to mint for.
#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Adapter around the identity endpoint: `mint(audience)` returns a
/// bearer token plus its absolute expiry. No caching here.
#[derive(Debug, Clone)]
pub struct IdentityIssuer {
    client: Client,
    identity_base_url: String,
    sa_key_path: Option<String>,
    default_ttl_secs: u64,
}

impl IdentityIssuer {
    pub fn new(client: Client, cfg: &IssuerConfig, default_ttl_secs: u64) -> Self {
        Self {
            client,
            identity_base_url: cfg.identity_base_url.clone(),
            sa_key_path: cfg.sa_key_path.clone(),
            default_ttl_secs,
        }
    }

    /// Mint an identity token scoped to `audience`.
    pub async fn mint(&self, audience: &str) -> Result<CachedToken, CredentialError> {
        // The key is read per mint, so a repaired key file takes effect
        // without a restart and a broken one fails only this request.
        let account = match &self.sa_key_path {
            Some(path) => load_key(path)?.client_email,
            None => "default".to_string(),
        };

        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/{}/identity",
            self.identity_base_url, account
        );

        let response = self
            .client
            .get(&url)
            .query(&[("audience", audience), ("format", "full")])
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
            .send()
            .await
            .map_err(|e| CredentialError::Exchange(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CredentialError::Exchange(format!(
                "issuer returned {}",
                response.status()
            )));
        }

        let token = response
            .text()
            .await
            .map_err(|e| CredentialError::Exchange(e.to_string()))?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(CredentialError::Exchange("issuer returned an empty token".into()));
        }

        let expires_at = match jwt_expiry(&token) {
            Some(exp) => exp,
            None => {
                // No usable expiry reported: assume a conservative window
                // rather than treating the token as non-expiring.
                warn!(
                    audience,
                    ttl = self.default_ttl_secs,
                    "token carries no parseable expiry, assuming default ttl"
                );
                now_unix() + self.default_ttl_secs as i64
            }
        };

        debug!(audience, expires_at, "identity token minted");
        Ok(CachedToken::new(token, expires_at))
    }
}

fn load_key(path: &str) -> Result<ServiceAccountKey, CredentialError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CredentialError::KeyFile(format!("{}: {}", path, e)))?;
    serde_json::from_str(&raw).map_err(|e| CredentialError::KeyFile(format!("{}: {}", path, e)))
}

/// Expiry from the JWT `exp` claim, if the payload decodes.
fn jwt_expiry(token: &str) -> Option<i64> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .ok()?;
    let claims: JwtClaims = serde_json::from_slice(&decoded).ok()?;
    Some(claims.exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use std::io::Write;

    fn sample_jwt(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
        format!("{}.{}.", header, payload)
    }

    #[test]
    fn jwt_expiry_reads_exp_claim() {
        assert_eq!(jwt_expiry(&sample_jwt(1_900_000_000)), Some(1_900_000_000));
    }

    #[test]
    fn jwt_expiry_rejects_opaque_tokens() {
        assert_eq!(jwt_expiry("not-a-jwt"), None);
        assert_eq!(jwt_expiry("a.b"), None);
        // three segments, but the payload is not base64 json
        assert_eq!(jwt_expiry("aaa.!!!.ccc"), None);
    }

    #[test]
    fn key_file_errors_name_the_path() {
        let err = load_key("/nonexistent/sa.json").unwrap_err();
        assert!(matches!(err, CredentialError::KeyFile(_)));
        assert!(err.to_string().contains("/nonexistent/sa.json"));
    }

    #[test]
    fn malformed_key_file_is_a_key_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = load_key(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, CredentialError::KeyFile(_)));
    }

    #[test]
    fn key_file_yields_client_email() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"type":"service_account","client_email":"kiosk@proj.iam.gserviceaccount.com","private_key_id":"abc"}}"#
        )
        .unwrap();

        let key = load_key(file.path().to_str().unwrap()).unwrap();
        assert_eq!(key.client_email, "kiosk@proj.iam.gserviceaccount.com");
    }
}
