// ABOUTME: Core types and constants for the Tollgate authorization engine
// ABOUTME: Foundation crate with protocol errors, tenant-scoped models, and ID allocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Tollgate Core
//!
//! Foundation crate providing shared types for the Tollgate multi-tenant
//! OAuth2/OIDC engine. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: OAuth2 error vocabulary and storage errors
//! - **constants**: Protocol identifiers, lifetimes and key sizes
//! - **models**: Tenant-scoped records shared with storage implementations
//! - **ids**: Snowflake identifier generator

/// OAuth2 error vocabulary and storage errors
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (Tenant, User, `OAuthClient`, `OAuthToken`, etc.)
pub mod models;

/// Monotonic 64-bit identifier allocation
pub mod ids;
