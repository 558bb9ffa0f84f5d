// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{body::Bytes, extract::State, Json};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{AddBookRequest, BookListResponse, MessageResponse},
    state::AppState,
    storage::BookRepository,
};

/// List the caller's books.
#[utoipa::path(
    get,
    path = "/books",
    tag = "Books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Every book owned by the caller", body = BookListResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Books could not be read")
    )
)]
pub async fn list_books(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<BookListResponse>, ApiError> {
    let books = BookRepository::new(state.store.as_ref())
        .list(&user.user_id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.user_id, error = %e, "Failed to list books");
            ApiError::internal("failed to load books")
        })?;

    Ok(Json(BookListResponse { books }))
}

/// Save a book for the caller.
#[utoipa::path(
    post,
    path = "/books",
    request_body = AddBookRequest,
    tag = "Books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Book saved", body = MessageResponse),
        (status = 400, description = "Body is not a valid book"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Book could not be written")
    )
)]
pub async fn add_book(
    Auth(user): Auth,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    // Parsed regardless of Content-Type.
    let request: AddBookRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(user_id = %user.user_id, error = %e, "Rejected book body");
        ApiError::bad_request("invalid json")
    })?;

    let book = BookRepository::new(state.store.as_ref())
        .add(&user.user_id, request)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.user_id, error = %e, "Failed to save book");
            ApiError::internal("failed to save book")
        })?;

    tracing::info!(user_id = %user.user_id, book_id = %book.id, "Book saved");
    Ok(Json(MessageResponse::new("book saved")))
}
