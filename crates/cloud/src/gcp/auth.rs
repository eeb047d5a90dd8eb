//! Service-account authentication for Google Cloud REST APIs.

use crate::error::{CloudError, CloudResult};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh tokens this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a service account key file the pipeline uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
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
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse the `gcpCredentials` JSON stored on a network.
    pub fn from_json(json: &str) -> CloudResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            CloudError::InvalidCredentials(format!("gcpCredentials is not a service account key: {e}"))
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: OffsetDateTime,
}

enum Source {
    ServiceAccount {
        key: ServiceAccountKey,
        http: reqwest::Client,
    },
    Static(String),
}

/// Produces bearer tokens, caching service-account tokens until near expiry.
pub struct TokenSource {
    source: Source,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn service_account(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self {
            source: Source::ServiceAccount { key, http },
            cached: Mutex::new(None),
        }
    }

    /// A fixed token (emulators and tests).
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Source::Static(token.into()),
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> CloudResult<String> {
        let (key, http) = match &self.source {
            Source::Static(token) => return Ok(token.clone()),
            Source::ServiceAccount { key, http } => (key, http),
        };

        let mut cached = self.cached.lock().await;
        let now = OffsetDateTime::now_utc();
        if let Some(token) = cached.as_ref()
            && token.expires_at - time::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
        {
            return Ok(token.value.clone());
        }

        let fresh = exchange_token(key, http, now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

fn signed_assertion(key: &ServiceAccountKey, now: OffsetDateTime) -> CloudResult<String> {
    let iat = now.unix_timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + TOKEN_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| CloudError::InvalidCredentials(format!("invalid private key: {e}")))?;
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| CloudError::Auth(format!("failed to sign assertion: {e}")))
}

async fn exchange_token(
    key: &ServiceAccountKey,
    http: &reqwest::Client,
    now: OffsetDateTime,
) -> CloudResult<CachedToken> {
    let assertion = signed_assertion(key, now)?;
    let response = http
        .post(&key.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(CloudError::Auth(format!("token exchange failed ({status}): {body}")));
    }
    let token: TokenResponse = serde_json::from_str(&body)?;
    tracing::debug!(client_email = %key.client_email, "Obtained GCP access token");
    Ok(CachedToken {
        value: token.access_token,
        expires_at: now + time::Duration::seconds(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS)),
    })
}
