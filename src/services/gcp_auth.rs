//! OAuth2 access tokens for a GCP service account.
//!
//! Signs a JWT bearer assertion with the account's private key and exchanges
//! it at the token endpoint. Tokens are reused until shortly before expiry.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

pub struct GcpTokenSource {
    client: Client,
    key: ServiceAccountKey,
    cached: Mutex<Option<CachedToken>>,
}

impl GcpTokenSource {
    pub fn new(key: ServiceAccountKey, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            key,
            cached: Mutex::new(None),
        })
    }

    pub fn from_file(path: &Path, timeout: Duration) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::provider_api(format!(
                "cannot read service account file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(serde_json::from_str(&raw)?, timeout)
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - REFRESH_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.assertion(now)?;
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];
        let resp = self.client.post(&self.key.token_uri).form(&params).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::provider_api(format!(
                "token exchange failed: HTTP {} - {}",
                status, text
            )));
        }

        let token: OAuthTokenResponse = resp.json().await?;
        let expires_in = if token.expires_in > 0 {
            token.expires_in
        } else {
            ASSERTION_LIFETIME_SECS
        };
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + expires_in,
        });
        Ok(token.access_token)
    }

    fn assertion(&self, now: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| Error::provider_api(format!("invalid service account key: {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| Error::provider_api(format!("failed to sign assertion: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_key_defaults_token_uri() {
        let key: ServiceAccountKey = serde_json::from_str(
            r#"{"type":"service_account","client_email":"sa@p.iam.gserviceaccount.com","private_key":"x","project_id":"p"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(key.project_id.as_deref(), Some("p"));
    }

    #[test]
    fn garbage_private_key_is_a_provider_error() {
        let key = ServiceAccountKey {
            client_email: "sa@p.iam.gserviceaccount.com".into(),
            private_key: "not a pem".into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
            project_id: None,
        };
        let source = GcpTokenSource::new(key, Duration::from_secs(5)).unwrap();
        assert!(matches!(source.assertion(0), Err(Error::ProviderApi(_))));
    }
}
