// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Applied as a route layer on every protected route:
//!
//! ```rust,ignore
//! let books = Router::new()
//!     .route("/books", get(list_books).post(add_book))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         require_auth,
//!     ));
//! ```
//!
//! On success the verified [`AuthenticatedUser`] is inserted into the
//! request extensions, where the [`Auth`](super::Auth) extractor picks it up.
//! On failure the chain is aborted and no handler runs.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_str = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Verify the bearer token of a request against the configured verifier.
pub async fn authenticate(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(headers)?;
    state.verifier.verify(token).await
}

/// Authentication middleware function.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &state).await {
        Ok(user) => {
            tracing::debug!(user_id = %user.user_id, "Request authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::info!(
                error_code = e.error_code(),
                path = %request.uri().path(),
                "Rejected unauthenticated request"
            );
            e.into_response()
        }
    }
}
