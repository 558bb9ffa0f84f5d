// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Document Storage Module
//!
//! Persistence for user data, addressed by hierarchical collection paths.
//!
//! ## Storage Layout
//!
//! ```text
//! users/{uid}/
//!   books/
//!     {auto_id}   # title, status, createdAt
//! ```
//!
//! ## Backends
//!
//! - [`FirestoreStore`] talks to Cloud Firestore (or its emulator) over REST
//! - [`MemoryStore`] keeps documents in process memory
//!
//! Both implement [`DocumentStore`]; handlers only ever see the trait.

pub mod document;
pub mod firestore;
pub mod memory;
pub mod paths;
pub mod repository;

pub use document::{
    Document, DocumentCursor, DocumentPage, DocumentStore, FieldValue, Fields, StoreError,
    StoreResult,
};
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use paths::CollectionPath;
pub use repository::BookRepository;
