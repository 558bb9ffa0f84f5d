// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Google credentials and OAuth2 access tokens for the document store.
//!
//! ## Sources
//!
//! | Source | Selected when | Token from |
//! |--------|---------------|------------|
//! | Emulator | `FIRESTORE_EMULATOR_HOST` is set | fixed `owner` token |
//! | Service account | key file with `"type": "service_account"` | RS256 JWT assertion exchanged at `token_uri` |
//! | Authorized user | key file with `"type": "authorized_user"` | refresh-token exchange |
//! | Metadata server | no key file available | GCE/GKE metadata server |
//!
//! Access tokens are cached and refreshed shortly before they expire.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// OAuth2 scope for Cloud Firestore.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Token presented to the Firestore emulator (grants admin access).
pub const EMULATOR_TOKEN: &str = "owner";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for service-account assertions.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are refreshed.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid service account private key: {0}")]
    InvalidKey(String),
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
}

/// Key material of a service account JSON key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// User credentials written by `gcloud auth application-default login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
    MetadataServer,
    Emulator,
}

impl Credentials {
    /// Load a key file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CredentialsFile =
            serde_json::from_slice(&raw).map_err(|source| CredentialsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(match file {
            CredentialsFile::ServiceAccount(key) => Credentials::ServiceAccount(key),
            CredentialsFile::AuthorizedUser(key) => Credentials::AuthorizedUser(key),
        })
    }

    /// Ambient credentials: the gcloud well-known file if present, else the
    /// metadata server.
    pub fn ambient() -> Result<Self, CredentialsError> {
        match well_known_file() {
            Some(path) if path.is_file() => {
                tracing::info!(path = %path.display(), "Using gcloud application default credentials");
                Self::from_file(path)
            }
            _ => {
                tracing::info!("No credentials file found, using the metadata server");
                Ok(Credentials::MetadataServer)
            }
        }
    }

    /// Project id carried by the credentials, if any.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Credentials::ServiceAccount(key) => key.project_id.as_deref(),
            Credentials::AuthorizedUser(key) => key.quota_project_id.as_deref(),
            Credentials::MetadataServer | Credentials::Emulator => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::ServiceAccount(_) => "service_account",
            Credentials::AuthorizedUser(_) => "authorized_user",
            Credentials::MetadataServer => "metadata_server",
            Credentials::Emulator => "emulator",
        }
    }
}

/// `~/.config/gcloud/application_default_credentials.json`, or the
/// `%APPDATA%` equivalent on Windows.
fn well_known_file() -> Option<PathBuf> {
    let base = if cfg!(windows) {
        PathBuf::from(std::env::var_os("APPDATA")?)
    } else {
        PathBuf::from(std::env::var_os("HOME")?).join(".config")
    };
    Some(base.join("gcloud").join("application_default_credentials.json"))
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
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Access token source with caching.
pub struct TokenSource {
    credentials: Credentials,
    client: reqwest::Client,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(credentials: Credentials, client: reqwest::Client) -> Self {
        Self {
            credentials,
            client,
            cache: RwLock::new(None),
        }
    }

    /// A bearer token valid for at least [`REFRESH_MARGIN`].
    pub async fn access_token(&self) -> Result<String, CredentialsError> {
        if matches!(self.credentials, Credentials::Emulator) {
            return Ok(EMULATOR_TOKEN.to_string());
        }

        {
            let cache = self.cache.read().await;
            if let Some(cached) = &*cache {
                if cached.expires_at > Instant::now() + REFRESH_MARGIN {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = &*cache {
            if cached.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(cached.token.clone());
            }
        }

        let response = self.fetch().await?;
        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(3600));
        tracing::debug!(
            source = self.credentials.kind(),
            expires_in = lifetime.as_secs(),
            "Obtained document store access token"
        );
        *cache = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }

    async fn fetch(&self) -> Result<TokenResponse, CredentialsError> {
        let request = match &self.credentials {
            Credentials::ServiceAccount(key) => {
                let assertion = sign_assertion(key)?;
                self.client.post(&key.token_uri).form(&[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ])
            }
            Credentials::AuthorizedUser(key) => self.client.post(&key.token_uri).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", key.client_id.as_str()),
                ("client_secret", key.client_secret.as_str()),
                ("refresh_token", key.refresh_token.as_str()),
            ]),
            Credentials::MetadataServer => self
                .client
                .get(METADATA_TOKEN_URL)
                .query(&[("scopes", DATASTORE_SCOPE)])
                .header("Metadata-Flavor", "Google"),
            Credentials::Emulator => {
                return Ok(TokenResponse {
                    access_token: EMULATOR_TOKEN.to_string(),
                    expires_in: None,
                })
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialsError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

fn sign_assertion(key: &ServiceAccountKey) -> Result<String, CredentialsError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| CredentialsError::InvalidKey(e.to_string()))?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let iat = chrono::Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: DATASTORE_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    encode(&header, &claims, &encoding_key).map_err(|e| CredentialsError::InvalidKey(e.to_string()))
}
