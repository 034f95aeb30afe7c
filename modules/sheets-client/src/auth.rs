use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tokio::sync::Mutex;

use crate::error::{Result, SheetsError};
use crate::types::{ServiceAccountKey, TokenClaims, TokenResponse};

const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

struct CachedToken {
    value: String,
    expires_at: i64,
}

enum Credentials {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Supplies bearer tokens for API calls.
pub struct TokenSource {
    credentials: Credentials,
}

impl TokenSource {
    pub fn from_static(token: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::Static(token.into()),
        }
    }

    pub fn from_service_account(key: ServiceAccountKey) -> Self {
        Self {
            credentials: Credentials::ServiceAccount {
                key,
                cached: Mutex::new(None),
            },
        }
    }

    /// Read a service-account JSON key file from disk.
    pub fn from_service_account_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SheetsError::Auth(format!("cannot read {}: {e}", path.display())))?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)?;
        Ok(Self::from_service_account(key))
    }

    pub(crate) async fn token(&self, http: &reqwest::Client) -> Result<String> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::ServiceAccount { key, cached } => {
                let mut guard = cached.lock().await;
                let now = Utc::now().timestamp();
                if let Some(ref token) = *guard {
                    if token.expires_at - EXPIRY_MARGIN_SECS > now {
                        return Ok(token.value.clone());
                    }
                }

                let fresh = exchange_assertion(http, key, now).await?;
                let value = fresh.access_token.clone();
                *guard = Some(CachedToken {
                    value: fresh.access_token,
                    expires_at: now + fresh.expires_in,
                });
                Ok(value)
            }
        }
    }
}

pub(crate) fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String> {
    let claims = TokenClaims {
        iss: &key.client_email,
        scope: SPREADSHEETS_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?)
}

async fn exchange_assertion(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    now: i64,
) -> Result<TokenResponse> {
    let assertion = sign_assertion(key, now)?;
    tracing::debug!(client_email = key.client_email.as_str(), "Exchanging service-account assertion");

    let resp = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(SheetsError::Auth(format!("token exchange failed ({status}): {message}")));
    }

    Ok(resp.json().await?)
}
