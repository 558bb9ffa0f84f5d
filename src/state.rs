// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::storage::DocumentStore;

/// Long-lived backend handles shared by every request.
///
/// Built once at startup and injected into the router.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { store, verifier }
    }
}
