// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Startup wiring for the external collaborators.
//!
//! Resolves credentials and the project id, then connects the identity
//! verifier and the document store. Any failure here is fatal: the server
//! never starts half-configured.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::auth::{AuthError, FirebaseTokenVerifier, JwksManager};
use crate::config::Config;
use crate::credentials::{Credentials, CredentialsError, TokenSource};
use crate::storage::{FirestoreStore, StoreError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to load credentials: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("no project id: set GOOGLE_CLOUD_PROJECT or use a credential file that names one")]
    MissingProjectId,
    #[error("identity service unavailable: {0}")]
    Identity(#[from] AuthError),
    #[error("document store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Connected backends, ready to be placed into `AppState`.
pub struct Backends {
    pub project_id: String,
    pub verifier: Arc<FirebaseTokenVerifier>,
    pub store: Arc<FirestoreStore>,
}

/// Shared client for every outbound call. `timeout` bounds each request.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(CONNECT_TIMEOUT))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// The explicit project id wins; otherwise the credential file must name one.
pub fn resolve_project_id(
    explicit: Option<&str>,
    credentials: &Credentials,
) -> Result<String, BootstrapError> {
    explicit
        .or_else(|| credentials.project_id())
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or(BootstrapError::MissingProjectId)
}

fn load_credentials(config: &Config) -> Result<Credentials, CredentialsError> {
    if config.firestore_emulator_host.is_some() {
        return Ok(Credentials::Emulator);
    }
    match &config.credentials_file {
        Some(path) => Credentials::from_file(path),
        None => Credentials::ambient(),
    }
}

/// Build both backends and check that each one answers.
///
/// The JWKS is fetched and an access token minted before returning, so a
/// bad configuration fails at startup instead of on the first request.
pub async fn connect(config: &Config) -> Result<Backends, BootstrapError> {
    let credentials = load_credentials(config)?;
    let project_id = resolve_project_id(config.project_id.as_deref(), &credentials)?;
    info!(
        project_id = %project_id,
        credentials = credentials.kind(),
        "Resolved project"
    );

    let client = http_client(config.upstream_timeout)?;

    let jwks = JwksManager::new(config.jwks_url.clone(), client.clone());
    let keys = jwks.refresh().await?;
    info!(jwks_url = %config.jwks_url, keys = keys.keys.len(), "Loaded identity signing keys");
    let verifier = FirebaseTokenVerifier::new(project_id.clone(), jwks);

    let endpoint = FirestoreStore::endpoint(config.firestore_emulator_host.as_deref())?;
    let tokens = TokenSource::new(credentials, client.clone());
    let store = FirestoreStore::new(
        client,
        endpoint,
        &project_id,
        &config.firestore_database,
        tokens,
    )?;
    store.connect().await?;
    info!(documents_url = %store.documents_url(), "Connected to document store");

    Ok(Backends {
        project_id,
        verifier: Arc::new(verifier),
        store: Arc::new(store),
    })
}
