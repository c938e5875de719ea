// ABOUTME: Storage collaborator contracts consumed by the authorization engine
// ABOUTME: Tenant-scoped async repository traits plus the ephemeral authorize-state store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tollgate_core::errors::DatabaseResult;
use tollgate_core::models::{
    AuthorizationCode, AuthorizeState, OAuthClient, OAuthToken, OtpAttempt, OtpChallenge,
    SigningKey, Tenant, TenantId, User, UserId,
};

/// Tenant storage
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Look a tenant up by ID
    async fn get_by_id(&self, tenant_id: TenantId) -> DatabaseResult<Option<Tenant>>;

    /// Look a tenant up by slug
    async fn get_by_slug(&self, slug: &str) -> DatabaseResult<Option<Tenant>>;

    /// Insert a tenant
    ///
    /// Fails with `DatabaseError::Conflict` when the ID or slug is taken.
    async fn create(&self, tenant: &Tenant) -> DatabaseResult<()>;

    /// Resolve the tenant serving an inbound hostname
    async fn resolve_by_host(&self, host: &str) -> DatabaseResult<Option<Tenant>>;

    /// Number of tenants
    async fn count(&self) -> DatabaseResult<u64>;
}

/// User storage, tenant-scoped
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look a user up by (lowercased) email within a tenant
    async fn get_by_email(&self, tenant_id: TenantId, email: &str)
        -> DatabaseResult<Option<User>>;

    /// Look a user up by ID within a tenant
    async fn get_by_id(&self, tenant_id: TenantId, user_id: UserId)
        -> DatabaseResult<Option<User>>;

    /// Look a user up by E.164 phone number within a tenant
    async fn get_by_phone(&self, tenant_id: TenantId, phone: &str)
        -> DatabaseResult<Option<User>>;

    /// Insert a user
    ///
    /// Fails with `DatabaseError::Conflict` when the email is taken in the tenant.
    async fn create(&self, user: &User) -> DatabaseResult<()>;
}

/// One-time code storage, tenant-scoped and keyed by phone number
#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// Store a challenge, replacing any outstanding one for the same phone
    async fn put_challenge(&self, challenge: &OtpChallenge) -> DatabaseResult<()>;

    /// Check one guess against the live challenge for `phone`
    ///
    /// The comparison and its effect happen in one atomic step: a match marks
    /// the challenge used, a miss increments its guess counter. Challenges that
    /// are used, expired at `now` or at `max_attempts` report `Unavailable`.
    async fn attempt_challenge(
        &self,
        tenant_id: TenantId,
        phone: &str,
        code_hash: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> DatabaseResult<OtpAttempt>;
}

/// OAuth client storage, tenant-scoped
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Look a client up by its public identifier within a tenant
    async fn get_by_client_id(
        &self,
        tenant_id: TenantId,
        client_id: &str,
    ) -> DatabaseResult<Option<OAuthClient>>;

    /// Insert or replace the client keyed by `(tenant_id, client_id)`
    ///
    /// Returns the stored record; on replacement the original `id` and
    /// `created_at` are kept.
    async fn upsert(&self, client: &OAuthClient) -> DatabaseResult<OAuthClient>;
}

/// Authorization code storage, tenant-scoped and keyed by code digest
#[async_trait]
pub trait CodeRepository: Send + Sync {
    /// Insert a code
    async fn create(&self, code: &AuthorizationCode) -> DatabaseResult<()>;

    /// Look a code up by digest within a tenant
    async fn get(
        &self,
        tenant_id: TenantId,
        code_hash: &str,
    ) -> DatabaseResult<Option<AuthorizationCode>>;

    /// Set `used_at` only if the code is currently unused
    ///
    /// Returns `false` when no unused code matched; callers must treat that as
    /// "already used" and never retry.
    async fn mark_used(
        &self,
        tenant_id: TenantId,
        code_hash: &str,
        used_at: DateTime<Utc>,
    ) -> DatabaseResult<bool>;
}

/// Token record storage, tenant-scoped
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Insert a token record
    async fn create(&self, token: &OAuthToken) -> DatabaseResult<()>;

    /// Look a record up by access token digest within a tenant
    async fn get_by_access(
        &self,
        tenant_id: TenantId,
        access_token_hash: &str,
    ) -> DatabaseResult<Option<OAuthToken>>;

    /// Look a record up by refresh token digest within a tenant
    async fn get_by_refresh(
        &self,
        tenant_id: TenantId,
        refresh_token_hash: &str,
    ) -> DatabaseResult<Option<OAuthToken>>;

    /// Set `rotated_at` only if the record is unrotated and unrevoked
    ///
    /// Returns `false` when the conditional update matched nothing.
    async fn rotate_refresh(
        &self,
        tenant_id: TenantId,
        token_id: i64,
        rotated_at: DateTime<Utc>,
    ) -> DatabaseResult<bool>;

    /// Revoke one record; returns `false` if it was already revoked or absent
    async fn revoke(
        &self,
        tenant_id: TenantId,
        token_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> DatabaseResult<bool>;

    /// Revoke every record of a lineage; returns how many records changed
    async fn revoke_lineage(
        &self,
        tenant_id: TenantId,
        lineage_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> DatabaseResult<u64>;
}

/// Signing key storage, tenant-scoped
#[async_trait]
pub trait KeyRepository: Send + Sync {
    /// The tenant's active key
    async fn get_active(&self, tenant_id: TenantId) -> DatabaseResult<Option<SigningKey>>;

    /// Any retained key of the tenant by kid
    async fn get_by_kid(&self, tenant_id: TenantId, kid: &str)
        -> DatabaseResult<Option<SigningKey>>;

    /// Every retained key of the tenant, newest first
    async fn list(&self, tenant_id: TenantId) -> DatabaseResult<Vec<SigningKey>>;

    /// Insert a key
    ///
    /// Inserting an active key fails with `DatabaseError::Conflict` when the
    /// tenant already has one.
    async fn create(&self, key: &SigningKey) -> DatabaseResult<()>;

    /// Atomically deactivate the tenant's active key and insert `new_key` as active
    ///
    /// Returns the key that was deactivated, if any.
    async fn rotate(
        &self,
        tenant_id: TenantId,
        new_key: &SigningKey,
        rotated_at: DateTime<Utc>,
    ) -> DatabaseResult<Option<SigningKey>>;
}

/// Ephemeral authorize-state storage with passive TTL expiry
///
/// An entry past its TTL must be indistinguishable from one that never existed.
#[async_trait]
pub trait AuthorizeStateStore: Send + Sync {
    /// Store a payload under `key` for `ttl`
    async fn save(&self, key: &str, state: &AuthorizeState, ttl: Duration) -> DatabaseResult<()>;

    /// Fetch a live payload
    async fn get(&self, key: &str) -> DatabaseResult<Option<AuthorizeState>>;

    /// Remove a payload; returns whether a live entry was removed
    async fn delete(&self, key: &str) -> DatabaseResult<bool>;
}
