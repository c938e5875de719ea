// ABOUTME: Main library entry point for the Tollgate token and authorization protocol engine
// ABOUTME: Multi-tenant OAuth 2.0 / OIDC code flow, token lifecycle and signing key management
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Tollgate
//!
//! The token and authorization protocol engine of a multi-tenant identity
//! provider. It issues and validates OAuth 2.0 / OIDC credentials for first
//! and third party client applications.
//!
//! ## Features
//!
//! - **Authorization code flow** with PKCE (RFC 7636) and cross-request
//!   continuation so a password or OTP login can resume an authorize request
//! - **RS256 access tokens** signed with a per-tenant key, verified by kid
//! - **Refresh token rotation** with reuse detection that revokes the lineage
//! - **Revocation** (RFC 7009) and **JWKS** publication (RFC 7517)
//! - **Strict tenant isolation**: every lookup re-checks ownership after fetch
//!
//! ## Architecture
//!
//! - **`oauth2_server`**: client registry, authorization state machine, token
//!   lifecycle and the [`oauth2_server::OAuth2AuthorizationServer`] facade
//! - **`jwks`**: signing key lifecycle
//! - **`identity`**: identity verification strategies
//! - **`database`**: storage contracts and an in-memory implementation
//! - **`tenant`**: request context and isolation checks
//! - **`config`**, **`logging`**, **`bootstrap`**: host process concerns
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tollgate::config::EngineConfig;
//! use tollgate::database::Storage;
//! use tollgate::oauth2_server::OAuth2AuthorizationServer;
//! use tollgate_core::ids::IdGenerator;
//! use tollgate_core::models::TenantId;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::from_env()?;
//! let storage = Storage::in_memory();
//! let server = OAuth2AuthorizationServer::new(&storage, Arc::new(IdGenerator::new(0)), config);
//!
//! let ctx = server.context(TenantId::new(1));
//! let jwks = server.jwks(&ctx).await?;
//! println!("{} signing keys", jwks.keys.len());
//! # Ok(())
//! # }
//! ```

/// Default-tenant seeding
pub mod bootstrap;

/// Engine configuration loaded from the environment
pub mod config;

/// Random tokens, digests and secret hashing
pub mod crypto;

/// Storage contracts and the in-memory store
pub mod database;

/// Identity verification strategies
pub mod identity;

/// Per-tenant signing keys and JWKS
pub mod jwks;

/// Structured logging setup and tenant-aware event logging
pub mod logging;

/// OAuth 2.0 authorization server
pub mod oauth2_server;

/// Request context and tenant isolation
pub mod tenant;
