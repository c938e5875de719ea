// ABOUTME: Core data models for the Tollgate authorization engine
// ABOUTME: Re-exports tenant, user, OAuth client, code, token, OTP and signing key records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! Every record below carries the [`TenantId`] of the tenant that owns it.
//! Repositories look records up within a tenant, and the engine re-checks
//! ownership after every fetch.

mod oauth2_server;
mod otp;
mod signing_key;
mod tenant;
mod user;

pub use oauth2_server::{
    join_scopes, parse_scope, AuthorizationCode, AuthorizeState, GrantType, OAuthClient,
    OAuthToken, PkceMethod, TokenEndpointAuthMethod,
};
pub use otp::{OtpAttempt, OtpChallenge, OtpChannel};
pub use signing_key::SigningKey;
pub use tenant::{Tenant, TenantId, TenantStatus, TenantType};
pub use user::{User, UserId};
