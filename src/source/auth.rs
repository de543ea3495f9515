use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::CredentialsConfig;
use crate::error::{DashboardError, Result};

pub const SCOPE_SPREADSHEETS: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const SCOPE_STORAGE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a Google service-account key file that the token exchange needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Supplies bearer tokens for the remote backends.
///
/// A static token wins when configured. Otherwise the service-account key is
/// read lazily on first use, so the dashboard starts even before credentials
/// are in place.
pub struct TokenProvider {
    static_token: Option<String>,
    key_file: PathBuf,
    scope: &'static str,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: &CredentialsConfig, scope: &'static str, client: reqwest::Client) -> Self {
        TokenProvider {
            static_token: credentials.static_token.clone(),
            key_file: credentials.key_file.clone(),
            scope,
            client,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let key = self.load_key().await?;
        let fresh = self.exchange(&key).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn load_key(&self) -> Result<ServiceAccountKey> {
        let contents = tokio::fs::read_to_string(&self.key_file).await.map_err(|e| {
            DashboardError::SourceUnavailable(format!(
                "cannot read credentials {}: {}",
                self.key_file.display(),
                e
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            DashboardError::SourceUnavailable(format!(
                "invalid credentials {}: {}",
                self.key_file.display(),
                e
            ))
        })
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<CachedToken> {
        let assertion = sign_assertion(key, self.scope, Utc::now())?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DashboardError::SourceUnavailable(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DashboardError::SourceUnavailable(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            DashboardError::SourceUnavailable(format!("unreadable token response: {}", e))
        })?;
        debug!("Obtained access token for {}", key.client_email);

        let lifetime = (token.expires_in - EXPIRY_MARGIN_SECS).max(0);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

/// Signs the RS256 JWT assertion exchanged for an OAuth access token.
pub fn sign_assertion(key: &ServiceAccountKey, scope: &str, now: DateTime<Utc>) -> Result<String> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope,
        aud: &key.token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        DashboardError::SourceUnavailable(format!("invalid service-account private key: {}", e))
    })?;

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| DashboardError::SourceUnavailable(format!("cannot sign token request: {}", e)))
}
