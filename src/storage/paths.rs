// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Collection paths for the document store layout.
//!
//! ```text
//! users/{uid}/
//!   books/{book_id}     # one document per book
//! ```
//!
//! The uid segment always comes from a verified token, never from request
//! input, so every user is confined to their own subtree.

use std::fmt;

pub const USERS_COLLECTION: &str = "users";
pub const BOOKS_COLLECTION: &str = "books";

/// Path to a collection: `collection(/document/collection)*`.
///
/// Segments are kept unencoded; each store encodes them for its own
/// addressing scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    /// A top-level collection.
    pub fn root(collection_id: impl Into<String>) -> Self {
        Self {
            segments: vec![collection_id.into()],
        }
    }

    /// A sub-collection of document `document_id` in this collection.
    pub fn child(&self, document_id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(document_id.into());
        segments.push(collection_id.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment: the collection id.
    pub fn collection_id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// `users/{user_id}/books`
pub fn user_books(user_id: &str) -> CollectionPath {
    CollectionPath::root(USERS_COLLECTION).child(user_id, BOOKS_COLLECTION)
}
