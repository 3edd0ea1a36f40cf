//! OAuth2 access tokens for the Google APIs.
//!
//! Service accounts sign a short-lived JWT with their private key and trade it
//! for a bearer token at the token endpoint. Tokens are cached until shortly
//! before they expire.

use super::SheetError;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const JWT_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on one token exchange, connection included.
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, SheetError>;
}

/// A fixed bearer token, for tests and for tokens minted elsewhere.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, SheetError> {
        Ok(self.0.clone())
    }
}

/// Stands in when a command never touches the store; every request fails.
#[derive(Debug, Clone, Copy)]
pub struct NoCredentials;

#[async_trait]
impl TokenProvider for NoCredentials {
    async fn access_token(&self) -> Result<String, SheetError> {
        Err(SheetError::Auth(
            "no service account credentials loaded".to_string(),
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

#[derive(Debug)]
pub struct ServiceAccountAuth {
    client: Client,
    key: ServiceAccountKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey) -> Result<Self, SheetError> {
        Self::with_timeout(key, TOKEN_TIMEOUT)
    }

    pub fn with_timeout(key: ServiceAccountKey, timeout: Duration) -> Result<Self, SheetError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .user_agent(format!("reelsheet/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            key,
            cached: Mutex::new(None),
        })
    }

    pub async fn from_file(path: &Path) -> Result<Self, SheetError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            SheetError::Auth(format!(
                "Unable to read service account credentials at {}: {}",
                path.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey =
            serde_json::from_str(&raw).map_err(|e| SheetError::Decode {
                context: format!("service account file {}", path.display()),
                source: e,
            })?;
        Self::new(key)
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn signed_assertion(&self, now: i64) -> Result<String, SheetError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: self.token_uri(),
            iat: now,
            exp: now + JWT_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| SheetError::Auth(format!("invalid private key: {e}")))?;
        encode(&header, &claims, &key).map_err(|e| SheetError::Auth(e.to_string()))
    }

    async fn request_token(&self, now: i64) -> Result<CachedToken, SheetError> {
        let assertion = self.signed_assertion(now)?;
        let res = self
            .client
            .post(self.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(SheetError::Auth(format!("token endpoint {status}: {text}")));
        }
        let parsed: TokenResponse =
            serde_json::from_str(&text).map_err(|e| SheetError::Decode {
                context: "token response".to_string(),
                source: e,
            })?;
        debug!("Obtained Google access token for {}", self.key.client_email);
        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: now + parsed.expires_in.unwrap_or(JWT_LIFETIME_SECS),
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, SheetError> {
        let now = Utc::now().timestamp();
        let mut guard = self.cached.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(cached.token.clone());
            }
        }
        let fresh = self.request_token(now).await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }
}
