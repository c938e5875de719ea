// ABOUTME: OAuth 2.0 authorization server: client registry, authorization code flow and token lifecycle
// ABOUTME: Re-exports the facade and the request/response types the transport layer works with
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Authorize request lifecycle and authorization code issuance/exchange
pub mod authorization;
/// Per-tenant OAuth client registry
pub mod client_registration;
/// OAuth 2.0 authorization server endpoints
pub mod endpoints;
/// OAuth 2.0 data models and types
pub mod models;
/// PKCE (RFC 7636) support
pub mod pkce;
/// Access/refresh token lifecycle
pub mod tokens;

pub use authorization::AuthorizationStateMachine;
pub use client_registration::ClientRegistry;

/// OAuth 2.0 authorization server
pub use endpoints::OAuth2AuthorizationServer;

// OAuth 2.0 data models and request/response types

/// Authorization request
pub use models::AuthorizeRequest;
/// Handle to a pending authorization request
pub use models::AuthorizeHandle;
/// Redirect carrying an issued authorization code
pub use models::AuthorizeRedirect;
/// Client registration request
pub use models::ClientRegistrationRequest;
/// Client registration result
pub use models::ClientRegistration;
/// Token revocation request
pub use models::RevocationRequest;
/// Token revocation outcome
pub use models::RevocationOutcome;
/// Token exchange request
pub use models::TokenRequest;
/// Token exchange response
pub use models::TokenResponse;

pub use tokens::{AccessTokenClaims, TokenLifecycleManager};
