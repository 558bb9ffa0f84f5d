// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Book repository.
//!
//! Each book is one document under `users/{uid}/books/`. The uid is always
//! the verified caller, so no ownership filter is needed on reads.

use chrono::Utc;

use super::super::{
    paths, DocumentCursor, DocumentStore, FieldValue, Fields, StoreError, StoreResult,
};
use crate::models::{AddBookRequest, Book};
use crate::storage::Document;

pub const TITLE_FIELD: &str = "title";
pub const STATUS_FIELD: &str = "status";
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Repository for book operations on the document store.
pub struct BookRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> BookRepository<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// List every book owned by a user.
    ///
    /// Fails if any page of the collection cannot be read or any document
    /// does not decode as a book.
    pub async fn list(&self, owner_user_id: &str) -> StoreResult<Vec<Book>> {
        let cursor = DocumentCursor::new(self.store, paths::user_books(owner_user_id));
        cursor
            .collect()
            .await?
            .into_iter()
            .map(book_from_document)
            .collect()
    }

    /// Save a new book for a user, stamped with the current time.
    pub async fn add(&self, owner_user_id: &str, request: AddBookRequest) -> StoreResult<Book> {
        let created_at = Utc::now();
        let fields = Fields::from([
            (TITLE_FIELD.to_string(), FieldValue::from(request.title.as_str())),
            (STATUS_FIELD.to_string(), FieldValue::from(request.status.as_str())),
            (CREATED_AT_FIELD.to_string(), FieldValue::from(created_at)),
        ]);

        let id = self
            .store
            .add(&paths::user_books(owner_user_id), fields)
            .await?;

        Ok(Book {
            id,
            title: request.title,
            status: request.status,
            created_at,
        })
    }
}

fn book_from_document(document: Document) -> StoreResult<Book> {
    let malformed = |reason: &str| StoreError::Malformed {
        id: document.id.clone(),
        reason: reason.to_string(),
    };

    let text = |name: &str| {
        document
            .field(name)
            .and_then(FieldValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| malformed(&format!("missing string field {name}")))
    };

    let title = text(TITLE_FIELD)?;
    let status = text(STATUS_FIELD)?;
    let created_at = document
        .field(CREATED_AT_FIELD)
        .and_then(FieldValue::as_timestamp)
        .ok_or_else(|| malformed("missing timestamp field createdAt"))?;

    Ok(Book {
        id: document.id.clone(),
        title,
        status,
        created_at,
    })
}
