// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Authentication error type.
///
/// Every variant except the key-fetch and internal failures is a client
/// problem and maps to 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingAuthHeader,
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    #[error("Token is malformed")]
    MalformedToken,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token issuer is invalid")]
    InvalidIssuer,
    #[error("Token audience is invalid")]
    InvalidAudience,
    /// `iat`, `nbf` or `auth_time` lies in the future.
    #[error("Token is not yet valid")]
    TokenNotYetValid,
    /// `sub` is empty or longer than 128 characters.
    #[error("Token subject is invalid")]
    InvalidSubject,
    #[error("Failed to fetch signing keys: {0}")]
    JwksFetchError(String),
    #[error("No matching key found in JWKS")]
    NoMatchingKey,
    #[error("Internal authentication error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InvalidSubject => "invalid_subject",
            AuthError::JwksFetchError(_) => "jwks_fetch_error",
            AuthError::NoMatchingKey => "no_matching_key",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::JwksFetchError(_) | AuthError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Map a `jsonwebtoken` validation failure onto the public taxonomy.
    pub(crate) fn from_jwt(err: &jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            ErrorKind::InvalidSubject => AuthError::InvalidSubject,
            _ => AuthError::MalformedToken,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
        assert_eq!(body["error"], "Authorization header is required");
    }

    #[test]
    fn token_failures_are_unauthorized() {
        for err in [
            AuthError::InvalidAuthHeader,
            AuthError::MalformedToken,
            AuthError::TokenExpired,
            AuthError::InvalidAudience,
            AuthError::InvalidSubject,
            AuthError::NoMatchingKey,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED, "{err}");
        }
    }

    #[test]
    fn key_fetch_failure_is_server_error() {
        let err = AuthError::JwksFetchError("timeout".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "jwks_fetch_error");
    }
}
