// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification against the identity service.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};

use super::claims::FirebaseClaims;
use super::jwks::JwksManager;
use super::{AuthError, AuthenticatedUser};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Firebase uids are at most 128 characters.
const MAX_SUBJECT_LEN: usize = 128;

const SECURETOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Resolves a bearer token to a user.
///
/// Called once per protected request; results are not cached.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Verifies Firebase Authentication ID tokens.
#[derive(Clone)]
pub struct FirebaseTokenVerifier {
    jwks: JwksManager,
    project_id: String,
    issuer: String,
}

impl FirebaseTokenVerifier {
    pub fn new(project_id: impl Into<String>, jwks: JwksManager) -> Self {
        let project_id = project_id.into();
        Self {
            issuer: format!("{SECURETOKEN_ISSUER_PREFIX}{project_id}"),
            project_id,
            jwks,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.project_id]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);
        validation
    }
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::MalformedToken);
        }
        let kid = header.kid.ok_or(AuthError::MalformedToken)?;

        let decoding_key = self.jwks.get_decoding_key(&kid).await?;

        let token_data = decode::<FirebaseClaims>(token, &decoding_key, &self.validation())
            .map_err(|e| AuthError::from_jwt(&e))?;
        let claims = token_data.claims;

        if claims.sub.is_empty() || claims.sub.chars().count() > MAX_SUBJECT_LEN {
            return Err(AuthError::InvalidSubject);
        }

        let latest_allowed = chrono::Utc::now().timestamp() + CLOCK_SKEW_LEEWAY as i64;
        if claims.iat > latest_allowed
            || claims.auth_time.is_some_and(|t| t > latest_allowed)
        {
            return Err(AuthError::TokenNotYetValid);
        }

        Ok(AuthenticatedUser::from_claims(claims))
    }
}
