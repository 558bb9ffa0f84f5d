// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! Firebase signs ID tokens with rotating Google keys published at the
//! securetoken JWKS endpoint. The endpoint advertises how long its keys may
//! be cached through `Cache-Control: max-age`, which is used as the cache
//! TTL when present.
//!
//! ## Security
//!
//! - JWKS is fetched via HTTPS only (the endpoint is configuration, not input)
//! - An unknown `kid` triggers at most one refresh per [`MIN_REFRESH_INTERVAL`]
//!   (adjustable with [`JwksManager::with_min_refresh_interval`])
//! - Only RSA keys are accepted

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use tokio::sync::RwLock;

use super::error::AuthError;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Lower bound between two refreshes forced by an unknown `kid`.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// JWKS manager with caching.
#[derive(Clone)]
pub struct JwksManager {
    jwks_url: String,
    /// TTL used when the endpoint sends no `max-age`
    default_ttl: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    client: reqwest::Client,
    /// Keys were supplied up front and are never refetched
    pinned: bool,
    min_refresh_interval: Duration,
}

impl JwksManager {
    /// Create a new JWKS manager that fetches through `client`.
    pub fn new(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            default_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client,
            pinned: false,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
        }
    }

    /// Create a manager serving a fixed key set, without network access.
    pub fn from_static(jwks: JwkSet) -> Self {
        Self {
            jwks_url: String::new(),
            default_ttl: Duration::MAX,
            cache: Arc::new(RwLock::new(Some(CacheEntry {
                jwks,
                fetched_at: Instant::now(),
                ttl: Duration::MAX,
            }))),
            client: reqwest::Client::new(),
            pinned: true,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
        }
    }

    /// Create with custom fallback cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Override the spacing of refreshes forced by an unknown `kid`.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self) -> Result<JwkSet, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if self.pinned || entry.is_fresh() {
                    return Ok(entry.jwks.clone());
                }
            }
        }

        self.refresh().await
    }

    /// Fetch JWKS from the endpoint, returning the keys and their lifetime.
    async fn fetch_jwks(&self) -> Result<(JwkSet, Duration), AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetchError(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(self.default_ttl);

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        Ok((jwks, ttl))
    }

    /// Get the decoding key for the given key ID.
    ///
    /// An unknown `kid` refreshes the key set once, since Google rotates
    /// keys ahead of the advertised cache lifetime.
    pub async fn get_decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let jwks = self.get_jwks().await?;
        if let Some(jwk) = find_key(&jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        if self.pinned || !self.refresh_allowed().await {
            return Err(AuthError::NoMatchingKey);
        }

        tracing::debug!(kid, "Unknown signing key id, refreshing JWKS");
        let jwks = self.refresh().await?;
        let jwk = find_key(&jwks, kid).ok_or(AuthError::NoMatchingKey)?;
        jwk_to_decoding_key(jwk)
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<JwkSet, AuthError> {
        if self.pinned {
            let cache = self.cache.read().await;
            return cache
                .as_ref()
                .map(|entry| entry.jwks.clone())
                .ok_or(AuthError::NoMatchingKey);
        }

        let (jwks, ttl) = self.fetch_jwks().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
            ttl,
        });
        Ok(jwks)
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .is_some_and(|entry| self.pinned || entry.is_fresh())
    }

    async fn refresh_allowed(&self) -> bool {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .is_none_or(|entry| entry.fetched_at.elapsed() >= self.min_refresh_interval)
    }
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Convert an RSA JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| AuthError::InternalError(format!("Failed to create RSA key: {e}"))),
        _ => Err(AuthError::InternalError(
            "Unsupported key type in JWKS".to_string(),
        )),
    }
}

/// Extract `max-age` from a `Cache-Control` header value.
fn parse_max_age(header: &str) -> Option<Duration> {
    header.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if name.eq_ignore_ascii_case("max-age") {
            value.trim().parse::<u64>().ok().map(Duration::from_secs)
        } else {
            None
        }
    })
}
