// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Document model and the store contract.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::CollectionPath;
use crate::credentials::CredentialsError;

/// Error type for document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to document store failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("document store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response from document store: {0}")]
    InvalidResponse(String),
    #[error("invalid page token {0:?}")]
    InvalidPageToken(String),
    #[error("document {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },
    #[error("document store credentials: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A typed field value, mirroring Firestore's value model.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(Fields),
}

pub type Fields = BTreeMap<String, FieldValue>;

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// A stored document and its store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// One page of a collection listing.
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    /// `None` once the collection is exhausted.
    pub next_page_token: Option<String>,
}

/// Hierarchical, path-addressed document persistence.
///
/// Implementations must be safe for concurrent use by many requests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a document with a store-generated id and return that id.
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<String>;

    /// Fetch one page of `collection`, starting after `page_token`.
    async fn list_page(
        &self,
        collection: &CollectionPath,
        page_token: Option<&str>,
    ) -> StoreResult<DocumentPage>;
}

/// Cursor over every document of a collection.
///
/// `next` yields `Ok(Some(_))` per document, `Ok(None)` once exhausted and
/// `Err(_)` when a page cannot be read.
pub struct DocumentCursor<'a> {
    store: &'a dyn DocumentStore,
    collection: CollectionPath,
    buffer: VecDeque<Document>,
    next_page_token: Option<String>,
    exhausted: bool,
}

impl<'a> DocumentCursor<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: CollectionPath) -> Self {
        Self {
            store,
            collection,
            buffer: VecDeque::new(),
            next_page_token: None,
            exhausted: false,
        }
    }

    pub async fn next(&mut self) -> StoreResult<Option<Document>> {
        loop {
            if let Some(document) = self.buffer.pop_front() {
                return Ok(Some(document));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .store
                .list_page(&self.collection, self.next_page_token.as_deref())
                .await?;
            self.buffer.extend(page.documents);
            self.exhausted = page.next_page_token.is_none();
            self.next_page_token = page.next_page_token;
        }
    }

    /// Drain the cursor. Fails on the first unreadable page.
    pub async fn collect(mut self) -> StoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        while let Some(document) = self.next().await? {
            documents.push(document);
        }
        Ok(documents)
    }
}
