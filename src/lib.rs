// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bookshelf - Authenticated Books API
//!
//! A small JSON API that lets signed-in users keep a personal list of books.
//! Identity comes from Firebase Authentication ID tokens; books are stored in
//! Cloud Firestore under each user's own subtree.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Firebase ID token verification
//! - `bootstrap` - Startup wiring of the identity service and document store
//! - `credentials` - Google OAuth2 access tokens for Firestore
//! - `storage` - Document store abstraction, Firestore and in-memory backends

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
