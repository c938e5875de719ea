// ABOUTME: Identity verification strategies that hand verified users to the authorization flow
// ABOUTME: Defines the verifier contract, the verified identity, and the userinfo lookup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Identity Verification
//!
//! A strategy (password, OTP, social login) proves who the user is and
//! produces a [`VerifiedIdentity`]. The authorization state machine only
//! accepts that proof; it never sees raw credentials.

/// One-time codes sent to a user's phone
pub mod otp;
/// Argon2 password verification against the tenant's user store
pub mod password;
/// OIDC userinfo for the subject of an access token
pub mod userinfo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tollgate_core::errors::OAuth2Result;
use tollgate_core::models::{TenantId, UserId};

pub use otp::{OtpCredentials, OtpSender, OtpVerifier};
pub use password::{PasswordCredentials, PasswordVerifier};
pub use userinfo::{UserInfo, UserInfoLookup};

use crate::tenant::RequestContext;

/// A user whose identity a strategy has confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    /// Tenant the user was verified in
    pub tenant_id: TenantId,
    /// Verified user
    pub user_id: UserId,
    /// Strategy that verified the user (`password`, `otp`, ...)
    pub method: String,
    /// When verification succeeded
    pub authenticated_at: DateTime<Utc>,
}

impl VerifiedIdentity {
    /// Identity verified by `method` at `authenticated_at`
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        user_id: UserId,
        method: impl Into<String>,
        authenticated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            method: method.into(),
            authenticated_at,
        }
    }
}

/// Strategy that turns credentials into a [`VerifiedIdentity`]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// What the user presents
    type Credentials: Send + Sync;

    /// Name recorded on the verified identity
    fn method(&self) -> &'static str;

    /// Verify `credentials` within the context's tenant
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` when the credentials do not identify a user of
    /// the tenant, or `server_error` for infrastructure failures
    async fn verify(
        &self,
        ctx: &RequestContext,
        credentials: &Self::Credentials,
    ) -> OAuth2Result<VerifiedIdentity>;
}
