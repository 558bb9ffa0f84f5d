// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Firebase Authentication ID tokens for the bookshelf API.
//!
//! ## Auth Flow
//!
//! 1. The client signs in with Firebase and obtains an ID token
//! 2. The client sends `Authorization: Bearer <ID token>`
//! 3. The server:
//!    - Fetches Google's securetoken JWKS via HTTPS (cached)
//!    - Verifies RS256 signature, expiry, issuer and audience (project id)
//!    - Extracts `sub` as the canonical uid
//!
//! ## Security
//!
//! - Only `/books` routes require authentication; `/health` and preflight
//!   requests never reach the verifier
//! - Verification results are never cached between requests
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod verifier;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::JwksManager;
pub use middleware::require_auth;
pub use verifier::{FirebaseTokenVerifier, TokenVerifier};
