// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase ID token claims and the authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims carried by a Firebase Authentication ID token.
///
/// See: https://firebase.google.com/docs/auth/admin/verify-id-tokens
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    /// Subject: the Firebase uid.
    pub sub: String,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,

    /// Time the user authenticated
    #[serde(default)]
    pub auth_time: Option<i64>,

    /// `https://securetoken.google.com/<project_id>`
    pub iss: String,

    /// Project id
    pub aud: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub firebase: Option<FirebaseInfo>,
}

/// The `firebase` claim object.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FirebaseInfo {
    #[serde(default)]
    pub sign_in_provider: Option<String>,
}

/// Authenticated user information extracted from a verified token.
///
/// Lives for one request in the request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user id (Firebase uid)
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// e.g. `password`, `google.com`, `anonymous`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_in_provider: Option<String>,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from verified Firebase claims.
    pub fn from_claims(claims: FirebaseClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            sign_in_provider: claims.firebase.and_then(|f| f.sign_in_provider),
            expires_at: claims.exp,
        }
    }

    /// A user known only by uid.
    pub fn with_id(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            sign_in_provider: None,
            expires_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_firebase_token_payload() {
        let payload = serde_json::json!({
            "iss": "https://securetoken.google.com/bookshelf",
            "aud": "bookshelf",
            "auth_time": 1700000000,
            "user_id": "u1",
            "sub": "u1",
            "iat": 1700000000,
            "exp": 1700003600,
            "email": "reader@example.com",
            "firebase": {
                "identities": { "email": ["reader@example.com"] },
                "sign_in_provider": "password"
            }
        });

        let claims: FirebaseClaims = serde_json::from_value(payload).unwrap();
        let user = AuthenticatedUser::from_claims(claims);

        assert_eq!(user.user_id, "u1");
        assert_eq!(user.email.as_deref(), Some("reader@example.com"));
        assert_eq!(user.sign_in_provider.as_deref(), Some("password"));
        assert_eq!(user.expires_at, 1700003600);
    }

    #[test]
    fn optional_claims_may_be_absent() {
        let payload = serde_json::json!({
            "iss": "https://securetoken.google.com/bookshelf",
            "aud": "bookshelf",
            "sub": "anon",
            "iat": 1,
            "exp": 2
        });

        let claims: FirebaseClaims = serde_json::from_value(payload).unwrap();
        let user = AuthenticatedUser::from_claims(claims);
        assert_eq!(user, AuthenticatedUser { expires_at: 2, ..AuthenticatedUser::with_id("anon") });
    }
}
