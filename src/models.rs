// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A book on the caller's shelf.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Identifier assigned by the document store.
    pub id: String,
    pub title: String,
    /// Free-form reading status (e.g. `reading`, `finished`).
    pub status: String,
    /// Server time at which the book was saved.
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /books`. Both fields are required.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AddBookRequest {
    pub title: String,
    pub status: String,
}

/// Body of `GET /books`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookListResponse {
    pub books: Vec<Book>,
}

/// Plain confirmation message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn book_serializes_with_camel_case_timestamp() {
        let book = Book {
            id: "abc".into(),
            title: "Dune".into(),
            status: "reading".into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };

        assert_eq!(
            serde_json::to_value(&book).unwrap(),
            serde_json::json!({
                "id": "abc",
                "title": "Dune",
                "status": "reading",
                "createdAt": "2024-05-01T12:00:00Z"
            })
        );
    }

    #[test]
    fn add_request_requires_both_fields() {
        assert!(serde_json::from_str::<AddBookRequest>(r#"{"title":"Dune"}"#).is_err());
        assert!(serde_json::from_str::<AddBookRequest>(r#"{"title":1,"status":"x"}"#).is_err());
        let ok: AddBookRequest =
            serde_json::from_str(r#"{"title":"Dune","status":"reading"}"#).unwrap();
        assert_eq!(ok.status, "reading");
    }
}
