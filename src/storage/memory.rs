// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process document store.
//!
//! Backs the router and repository tests.
//! Documents are kept in insertion order; page tokens are offsets.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CollectionPath, Document, DocumentPage, DocumentStore, Fields, StoreError, StoreResult};

const DEFAULT_PAGE_SIZE: usize = 100;

pub struct MemoryStore {
    collections: RwLock<HashMap<CollectionPath, Vec<Document>>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Number of documents stored in `collection`.
    pub async fn len(&self, collection: &CollectionPath) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.clone())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });
        Ok(id)
    }

    async fn list_page(
        &self,
        collection: &CollectionPath,
        page_token: Option<&str>,
    ) -> StoreResult<DocumentPage> {
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidPageToken(token.to_string()))?,
            None => 0,
        };

        let collections = self.collections.read().await;
        let all = collections.get(collection).map(Vec::as_slice).unwrap_or_default();
        let end = (offset + self.page_size).min(all.len());
        let documents = all.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();

        Ok(DocumentPage {
            documents,
            next_page_token: (end < all.len()).then(|| end.to_string()),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Memory store that fails on demand.
    pub struct FlakyStore {
        inner: MemoryStore,
        fail_writes: bool,
        fail_continuation_pages: bool,
    }

    impl FlakyStore {
        /// Serves the first page, then fails every follow-up page.
        pub fn failing_after_first_page(page_size: usize) -> Self {
            Self {
                inner: MemoryStore::with_page_size(page_size),
                fail_writes: false,
                fail_continuation_pages: true,
            }
        }

        /// Rejects every write.
        pub fn failing_writes() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_writes: true,
                fail_continuation_pages: false,
            }
        }

        pub fn inner(&self) -> &MemoryStore {
            &self.inner
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn add(&self, collection: &CollectionPath, fields: Fields) -> StoreResult<String> {
            if self.fail_writes {
                return Err(StoreError::Unavailable("write rejected".into()));
            }
            self.inner.add(collection, fields).await
        }

        async fn list_page(
            &self,
            collection: &CollectionPath,
            page_token: Option<&str>,
        ) -> StoreResult<DocumentPage> {
            if self.fail_continuation_pages && page_token.is_some() {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.list_page(collection, page_token).await
        }
    }
}
