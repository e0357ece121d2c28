//! OAuth2 access tokens for the Sheets API.
//!
//! Service accounts authenticate by signing a short-lived RS256 JWT and
//! exchanging it at the key's token endpoint. Tokens are cached until shortly
//! before they expire.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{Result, StoreError};

/// OAuth scope granting read/write access to spreadsheets.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the token's stated expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a Google service account key file this backend uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account e-mail, used as the JWT issuer.
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Token exchange endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if the JSON lacks required fields.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::Configuration(format!("invalid service account key: {e}")))
    }

    /// Read a key file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    fn signed_assertion(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("invalid private key: {e}")))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| StoreError::Auth(format!("cannot sign assertion: {e}")))
    }
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
    expires_in: u64,
}

const fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

enum TokenSource {
    ServiceAccount(ServiceAccountKey),
    Static(String),
}

/// Where the backend gets its bearer tokens from.
pub struct SheetsCredentials {
    source: TokenSource,
    cached: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for SheetsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.source {
            TokenSource::ServiceAccount(key) => key.client_email.as_str(),
            TokenSource::Static(_) => "static token",
        };
        f.debug_tuple("SheetsCredentials").field(&kind).finish()
    }
}

impl SheetsCredentials {
    /// Authenticate as a service account.
    #[must_use]
    pub fn service_account(key: ServiceAccountKey) -> Self {
        Self {
            source: TokenSource::ServiceAccount(key),
            cached: RwLock::new(None),
        }
    }

    /// Use a fixed bearer token (for tests and emulators).
    #[must_use]
    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            cached: RwLock::new(None),
        }
    }

    /// A bearer token, exchanging a fresh assertion when the cached one is
    /// about to expire.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Auth`] if the key is unusable or the exchange is
    /// refused, and a transient error if the token endpoint is unreachable.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String> {
        let key = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(key) => key,
        };

        if let Some(cached) = self.cached.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited.
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let token = Self::exchange(key, http).await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(REFRESH_MARGIN);
        tracing::debug!(
            client_email = %key.client_email,
            expires_in = %token.expires_in,
            "Obtained Sheets access token"
        );
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn exchange(key: &ServiceAccountKey, http: &reqwest::Client) -> Result<TokenResponse> {
        let assertion = key.signed_assertion()?;
        let response = http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Transient(format!("token exchange: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StoreError::Auth(format!("malformed token response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: format!("token exchange: {body}"),
            });
        }
        Err(StoreError::Auth(format!("token exchange refused ({status}): {body}")))
    }
}
