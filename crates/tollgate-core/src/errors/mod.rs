// ABOUTME: Unified error handling for the Tollgate authorization engine
// ABOUTME: Re-exports the OAuth2 protocol error vocabulary and storage errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Error types shared by the engine and storage implementations.
//!
//! - [`oauth2`]: the protocol error vocabulary handed to the transport layer
//! - [`database`]: errors raised by repository implementations

/// OAuth2 protocol error vocabulary with severity classes
pub mod oauth2;

/// Storage layer errors
pub mod database;

pub use database::{DatabaseError, DatabaseResult};
pub use oauth2::{ErrorSeverity, OAuth2Error, OAuth2ErrorKind, OAuth2Result};
