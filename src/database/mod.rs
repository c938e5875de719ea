// ABOUTME: Storage layer consumed by the engine: repository contracts and the in-memory store
// ABOUTME: Bundles tenant, user, client, code, token, key, OTP and authorize-state collaborators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Storage
//!
//! The engine never talks to a database directly. It consumes the traits in
//! [`repositories`]; production deployments implement them over their own
//! persistence, and [`memory::InMemoryStore`] implements all of them for tests
//! and single-process embedding.

/// In-memory implementation of every repository
pub mod memory;
/// Repository and ephemeral store contracts
pub mod repositories;

use std::sync::Arc;

pub use memory::InMemoryStore;
pub use repositories::{
    AuthorizeStateStore, ClientRepository, CodeRepository, KeyRepository, OtpRepository,
    TenantRepository, TokenRepository, UserRepository,
};

/// Handles to every storage collaborator
#[derive(Clone)]
pub struct Storage {
    /// Tenant records
    pub tenants: Arc<dyn TenantRepository>,
    /// User records
    pub users: Arc<dyn UserRepository>,
    /// OAuth clients
    pub clients: Arc<dyn ClientRepository>,
    /// Authorization codes
    pub codes: Arc<dyn CodeRepository>,
    /// Token records
    pub tokens: Arc<dyn TokenRepository>,
    /// Signing keys
    pub keys: Arc<dyn KeyRepository>,
    /// Ephemeral authorize state
    pub authorize_states: Arc<dyn AuthorizeStateStore>,
    /// One-time sign-in codes
    pub otps: Arc<dyn OtpRepository>,
}

impl Storage {
    /// Route every collaborator to one in-memory store
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()))
    }

    /// Route every collaborator to a store implementing all of the traits
    #[must_use]
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: TenantRepository
            + UserRepository
            + ClientRepository
            + CodeRepository
            + TokenRepository
            + KeyRepository
            + AuthorizeStateStore
            + OtpRepository
            + 'static,
    {
        Self {
            tenants: store.clone(),
            users: store.clone(),
            clients: store.clone(),
            codes: store.clone(),
            tokens: store.clone(),
            keys: store.clone(),
            authorize_states: store.clone(),
            otps: store,
        }
    }
}
