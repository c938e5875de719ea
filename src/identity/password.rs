// ABOUTME: Password identity strategy backed by Argon2 hashes in the tenant-scoped user store
// ABOUTME: Unknown users and wrong passwords fail identically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tollgate_core::ids::IdGenerator;
use tollgate_core::models::{User, UserId};
use tracing::error;

use super::{IdentityVerifier, VerifiedIdentity};
use crate::crypto::{hash_secret_blocking, verify_secret_blocking};
use crate::database::UserRepository;
use crate::logging::TenantLogger;
use crate::tenant::isolation::OwnedLookup;
use crate::tenant::RequestContext;

const METHOD: &str = "password";

/// Email and password as submitted on a login form
#[derive(Debug, Clone)]
pub struct PasswordCredentials {
    /// Login email
    pub email: String,
    /// Plaintext password
    pub password: String,
}

impl PasswordCredentials {
    /// Credentials for `email` and `password`
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Verifies passwords and registers password users
#[derive(Clone)]
pub struct PasswordVerifier {
    users: Arc<dyn UserRepository>,
    ids: Arc<IdGenerator>,
}

impl PasswordVerifier {
    /// Creates a verifier over the user store
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, ids: Arc<IdGenerator>) -> Self {
        Self { users, ids }
    }

    /// Create a password user in the context's tenant
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for a malformed email, an empty password or an
    /// email already registered in the tenant, and `server_error` for
    /// infrastructure failures
    pub async fn register(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> OAuth2Result<User> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(OAuth2Error::invalid_request("A valid email is required"));
        }
        if password.is_empty() {
            return Err(OAuth2Error::invalid_request("Password must not be empty"));
        }

        let user = User {
            id: UserId(self.ids.next_id()),
            tenant_id: ctx.tenant_id(),
            email,
            password_hash: Some(hash_secret_blocking(password).await?),
            email_verified_at: None,
            phone: None,
            phone_verified_at: None,
            created_at: ctx.now(),
        };

        match ctx
            .within_deadline("user.create", self.users.create(&user))
            .await?
        {
            Ok(()) => Ok(user),
            Err(e) if e.is_conflict() => Err(OAuth2Error::invalid_request(
                "Email is already registered",
            )),
            Err(e) => {
                error!(tenant_id = %ctx.tenant_id(), error = %e, "Failed to create user");
                Err(OAuth2Error::server_error("Storage operation failed"))
            }
        }
    }
}

#[async_trait]
impl IdentityVerifier for PasswordVerifier {
    type Credentials = PasswordCredentials;

    fn method(&self) -> &'static str {
        METHOD
    }

    async fn verify(
        &self,
        ctx: &RequestContext,
        credentials: &PasswordCredentials,
    ) -> OAuth2Result<VerifiedIdentity> {
        let email = normalize_email(&credentials.email);
        let user = ctx
            .storage(
                "user.get_by_email",
                self.users.get_by_email(ctx.tenant_id(), &email),
            )
            .await?
            .owned_by(ctx);

        let matches = match user.as_ref().and_then(|user| user.password_hash.as_deref()) {
            Some(hash) => verify_secret_blocking(&credentials.password, hash).await,
            None => false,
        };

        let Some(user) = user.filter(|_| matches) else {
            TenantLogger::log_auth_event(
                None,
                ctx.tenant_id(),
                METHOD,
                false,
                Some("invalid credentials"),
            );
            return Err(OAuth2Error::invalid_grant("Invalid credentials"));
        };

        TenantLogger::log_auth_event(Some(user.id), ctx.tenant_id(), METHOD, true, None);
        Ok(VerifiedIdentity::new(
            ctx.tenant_id(),
            user.id,
            METHOD,
            ctx.now(),
        ))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
