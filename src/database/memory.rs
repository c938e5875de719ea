// ABOUTME: In-memory implementation of every storage contract backed by DashMap
// ABOUTME: Honors the conditional-update atomicity the engine relies on; used for tests and embedding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tollgate_core::errors::{DatabaseError, DatabaseResult};
use tollgate_core::models::{
    AuthorizationCode, AuthorizeState, OAuthClient, OAuthToken, OtpAttempt, OtpChallenge,
    SigningKey, Tenant, TenantId, User, UserId,
};

use super::repositories::{
    AuthorizeStateStore, ClientRepository, CodeRepository, KeyRepository, OtpRepository,
    TenantRepository, TokenRepository, UserRepository,
};

/// Process-local store implementing every repository trait
///
/// Conditional updates run while holding the shard lock of the record they
/// touch, which gives the same single-winner guarantee as a conditional
/// `UPDATE ... WHERE used_at IS NULL` in a relational store.
#[derive(Default)]
pub struct InMemoryStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    users: DashMap<(TenantId, String), User>,
    clients: DashMap<(TenantId, String), OAuthClient>,
    codes: DashMap<String, AuthorizationCode>,
    tokens: DashMap<i64, OAuthToken>,
    access_index: DashMap<String, i64>,
    refresh_index: DashMap<String, i64>,
    keys: Mutex<HashMap<TenantId, Vec<SigningKey>>>,
    states: DashMap<String, (String, Instant)>,
    otps: DashMap<(TenantId, String), OtpChallenge>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn token_by_index(
        &self,
        index: &DashMap<String, i64>,
        tenant_id: TenantId,
        hash: &str,
    ) -> Option<OAuthToken> {
        let token_id = index.get(hash).map(|entry| *entry.value())?;
        self.tokens
            .get(&token_id)
            .filter(|token| token.tenant_id == tenant_id)
            .map(|token| token.value().clone())
    }
}

#[async_trait]
impl TenantRepository for InMemoryStore {
    async fn get_by_id(&self, tenant_id: TenantId) -> DatabaseResult<Option<Tenant>> {
        let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tenants.get(&tenant_id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> DatabaseResult<Option<Tenant>> {
        let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tenants.values().find(|tenant| tenant.slug == slug).cloned())
    }

    async fn create(&self, tenant: &Tenant) -> DatabaseResult<()> {
        let mut tenants = self.tenants.write().unwrap_or_else(PoisonError::into_inner);
        if tenants.contains_key(&tenant.id) {
            return Err(DatabaseError::conflict(
                "tenant",
                format!("id {} already exists", tenant.id),
            ));
        }
        if tenants.values().any(|existing| existing.slug == tenant.slug) {
            return Err(DatabaseError::conflict(
                "tenant",
                format!("slug '{}' already exists", tenant.slug),
            ));
        }
        tenants.insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn resolve_by_host(&self, host: &str) -> DatabaseResult<Option<Tenant>> {
        let host = host.trim().to_ascii_lowercase();
        let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tenants
            .values()
            .find(|tenant| tenant.domains.iter().any(|domain| *domain == host))
            .cloned())
    }

    async fn count(&self) -> DatabaseResult<u64> {
        let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tenants.len() as u64)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> DatabaseResult<Option<User>> {
        Ok(self
            .users
            .get(&(tenant_id, email.to_owned()))
            .map(|user| user.value().clone()))
    }

    async fn get_by_id(&self, tenant_id: TenantId, user_id: UserId) -> DatabaseResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|user| user.tenant_id == tenant_id && user.id == user_id)
            .map(|user| user.value().clone()))
    }

    async fn get_by_phone(&self, tenant_id: TenantId, phone: &str) -> DatabaseResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|user| user.tenant_id == tenant_id && user.phone.as_deref() == Some(phone))
            .map(|user| user.value().clone()))
    }

    async fn create(&self, user: &User) -> DatabaseResult<()> {
        match self.users.entry((user.tenant_id, user.email.clone())) {
            Entry::Occupied(_) => Err(DatabaseError::conflict(
                "user",
                format!("email '{}' already registered", user.email),
            )),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn get_by_client_id(
        &self,
        tenant_id: TenantId,
        client_id: &str,
    ) -> DatabaseResult<Option<OAuthClient>> {
        Ok(self
            .clients
            .get(&(tenant_id, client_id.to_owned()))
            .map(|client| client.value().clone()))
    }

    async fn upsert(&self, client: &OAuthClient) -> DatabaseResult<OAuthClient> {
        let stored = match self
            .clients
            .entry((client.tenant_id, client.client_id.clone()))
        {
            Entry::Occupied(mut slot) => {
                let existing = slot.get();
                let updated = OAuthClient {
                    id: existing.id,
                    created_at: existing.created_at,
                    ..client.clone()
                };
                slot.insert(updated.clone());
                updated
            }
            Entry::Vacant(slot) => {
                slot.insert(client.clone());
                client.clone()
            }
        };
        Ok(stored)
    }
}

#[async_trait]
impl CodeRepository for InMemoryStore {
    async fn create(&self, code: &AuthorizationCode) -> DatabaseResult<()> {
        match self.codes.entry(code.code_hash.clone()) {
            Entry::Occupied(_) => Err(DatabaseError::conflict(
                "authorization_code",
                "code digest collision",
            )),
            Entry::Vacant(slot) => {
                slot.insert(code.clone());
                Ok(())
            }
        }
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        code_hash: &str,
    ) -> DatabaseResult<Option<AuthorizationCode>> {
        Ok(self
            .codes
            .get(code_hash)
            .filter(|code| code.tenant_id == tenant_id)
            .map(|code| code.value().clone()))
    }

    async fn mark_used(
        &self,
        tenant_id: TenantId,
        code_hash: &str,
        used_at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        Ok(self.codes.get_mut(code_hash).is_some_and(|mut code| {
            if code.tenant_id != tenant_id || code.used_at.is_some() {
                return false;
            }
            code.used_at = Some(used_at);
            true
        }))
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn create(&self, token: &OAuthToken) -> DatabaseResult<()> {
        if self.access_index.contains_key(&token.access_token_hash) {
            return Err(DatabaseError::conflict("oauth_token", "access token digest collision"));
        }
        self.tokens.insert(token.id, token.clone());
        self.access_index
            .insert(token.access_token_hash.clone(), token.id);
        if let Some(refresh_hash) = &token.refresh_token_hash {
            self.refresh_index.insert(refresh_hash.clone(), token.id);
        }
        Ok(())
    }

    async fn get_by_access(
        &self,
        tenant_id: TenantId,
        access_token_hash: &str,
    ) -> DatabaseResult<Option<OAuthToken>> {
        Ok(self.token_by_index(&self.access_index, tenant_id, access_token_hash))
    }

    async fn get_by_refresh(
        &self,
        tenant_id: TenantId,
        refresh_token_hash: &str,
    ) -> DatabaseResult<Option<OAuthToken>> {
        Ok(self.token_by_index(&self.refresh_index, tenant_id, refresh_token_hash))
    }

    async fn rotate_refresh(
        &self,
        tenant_id: TenantId,
        token_id: i64,
        rotated_at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        Ok(self.tokens.get_mut(&token_id).is_some_and(|mut token| {
            if token.tenant_id != tenant_id || token.rotated_at.is_some() || token.revoked {
                return false;
            }
            token.rotated_at = Some(rotated_at);
            true
        }))
    }

    async fn revoke(
        &self,
        tenant_id: TenantId,
        token_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        Ok(self.tokens.get_mut(&token_id).is_some_and(|mut token| {
            if token.tenant_id != tenant_id || token.revoked {
                return false;
            }
            token.revoked = true;
            token.revoked_at = Some(revoked_at);
            true
        }))
    }

    async fn revoke_lineage(
        &self,
        tenant_id: TenantId,
        lineage_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> DatabaseResult<u64> {
        let mut revoked = 0;
        for mut token in self.tokens.iter_mut() {
            if token.tenant_id == tenant_id && token.lineage_id == lineage_id && !token.revoked {
                token.revoked = true;
                token.revoked_at = Some(revoked_at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl KeyRepository for InMemoryStore {
    async fn get_active(&self, tenant_id: TenantId) -> DatabaseResult<Option<SigningKey>> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .get(&tenant_id)
            .and_then(|tenant_keys| tenant_keys.iter().find(|key| key.active))
            .cloned())
    }

    async fn get_by_kid(
        &self,
        tenant_id: TenantId,
        kid: &str,
    ) -> DatabaseResult<Option<SigningKey>> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .get(&tenant_id)
            .and_then(|tenant_keys| tenant_keys.iter().find(|key| key.kid == kid))
            .cloned())
    }

    async fn list(&self, tenant_id: TenantId) -> DatabaseResult<Vec<SigningKey>> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tenant_keys = keys.get(&tenant_id).cloned().unwrap_or_default();
        tenant_keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tenant_keys)
    }

    async fn create(&self, key: &SigningKey) -> DatabaseResult<()> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let tenant_keys = keys.entry(key.tenant_id).or_default();
        if key.active && tenant_keys.iter().any(|existing| existing.active) {
            return Err(DatabaseError::conflict(
                "signing_key",
                format!("tenant {} already has an active key", key.tenant_id),
            ));
        }
        if tenant_keys.iter().any(|existing| existing.kid == key.kid) {
            return Err(DatabaseError::conflict(
                "signing_key",
                format!("kid '{}' already exists", key.kid),
            ));
        }
        tenant_keys.push(key.clone());
        Ok(())
    }

    async fn rotate(
        &self,
        tenant_id: TenantId,
        new_key: &SigningKey,
        rotated_at: DateTime<Utc>,
    ) -> DatabaseResult<Option<SigningKey>> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let tenant_keys = keys.entry(tenant_id).or_default();
        if tenant_keys.iter().any(|existing| existing.kid == new_key.kid) {
            return Err(DatabaseError::conflict(
                "signing_key",
                format!("kid '{}' already exists", new_key.kid),
            ));
        }

        let mut previous = None;
        for key in tenant_keys.iter_mut().filter(|key| key.active) {
            key.active = false;
            key.rotated_at = Some(rotated_at);
            previous = Some(key.clone());
        }
        tenant_keys.push(SigningKey {
            active: true,
            ..new_key.clone()
        });
        Ok(previous)
    }
}

#[async_trait]
impl OtpRepository for InMemoryStore {
    async fn put_challenge(&self, challenge: &OtpChallenge) -> DatabaseResult<()> {
        self.otps.insert(
            (challenge.tenant_id, challenge.phone.clone()),
            challenge.clone(),
        );
        Ok(())
    }

    async fn attempt_challenge(
        &self,
        tenant_id: TenantId,
        phone: &str,
        code_hash: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> DatabaseResult<OtpAttempt> {
        let Some(mut challenge) = self.otps.get_mut(&(tenant_id, phone.to_owned())) else {
            return Ok(OtpAttempt::Unavailable);
        };
        if challenge.is_used() || challenge.is_expired(now) || challenge.attempts >= max_attempts
        {
            return Ok(OtpAttempt::Unavailable);
        }
        if challenge.code_hash == code_hash {
            challenge.used_at = Some(now);
            Ok(OtpAttempt::Accepted)
        } else {
            challenge.attempts += 1;
            Ok(OtpAttempt::Rejected {
                attempts: challenge.attempts,
            })
        }
    }
}

#[async_trait]
impl AuthorizeStateStore for InMemoryStore {
    async fn save(&self, key: &str, state: &AuthorizeState, ttl: Duration) -> DatabaseResult<()> {
        let payload =
            serde_json::to_string(state).map_err(|source| DatabaseError::SerializationError {
                context: "authorize state",
                source,
            })?;
        self.states
            .insert(key.to_owned(), (payload, Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> DatabaseResult<Option<AuthorizeState>> {
        let now = Instant::now();
        if self
            .states
            .remove_if(key, |_, (_, expires_at)| *expires_at <= now)
            .is_some()
        {
            return Ok(None);
        }
        let Some(payload) = self.states.get(key).map(|entry| entry.value().0.clone()) else {
            return Ok(None);
        };
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|source| DatabaseError::SerializationError {
                context: "authorize state",
                source,
            })
    }

    async fn delete(&self, key: &str) -> DatabaseResult<bool> {
        let now = Instant::now();
        Ok(self
            .states
            .remove(key)
            .is_some_and(|(_, (_, expires_at))| expires_at > now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use tokio::time;
    use tollgate_core::models::{OtpChannel, PkceMethod};

    use super::*;

    fn sample_state(tenant_id: TenantId) -> AuthorizeState {
        AuthorizeState {
            tenant_id,
            client_id: "app-1".to_owned(),
            response_type: "code".to_owned(),
            redirect_uri: "https://a.example/cb".to_owned(),
            scopes: vec!["openid".to_owned()],
            state: Some("xyz".to_owned()),
            nonce: None,
            code_challenge: Some("abc".to_owned()),
            code_challenge_method: Some(PkceMethod::S256),
            created_at: Utc::now(),
        }
    }

    fn sample_token(id: i64, lineage_id: i64, tenant_id: TenantId) -> OAuthToken {
        let now = Utc::now();
        OAuthToken {
            id,
            tenant_id,
            client_id: "app-1".to_owned(),
            user_id: Some(UserId(9)),
            access_token_hash: format!("access-{id}"),
            refresh_token_hash: Some(format!("refresh-{id}")),
            scopes: vec!["openid".to_owned()],
            expires_at: now + ChronoDuration::hours(1),
            refresh_expires_at: Some(now + ChronoDuration::days(30)),
            lineage_id,
            parent_id: None,
            rotated_at: None,
            revoked: false,
            revoked_at: None,
            created_at: now,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_expires_passively() {
        let store = InMemoryStore::new();
        let state = sample_state(TenantId(1));
        store
            .save("authorize_state:h1", &state, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(AuthorizeStateStore::get(&store, "authorize_state:h1").await.unwrap(), Some(state));

        time::advance(Duration::from_secs(60)).await;
        assert_eq!(AuthorizeStateStore::get(&store, "authorize_state:h1").await.unwrap(), None);
        assert!(!store.delete("authorize_state:h1").await.unwrap());
    }

    #[tokio::test]
    async fn test_state_delete_reports_removal_once() {
        let store = InMemoryStore::new();
        store
            .save("k", &sample_state(TenantId(1)), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(AuthorizeStateStore::get(&store, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rotate_refresh_is_single_winner() {
        let store = InMemoryStore::new();
        let tenant = TenantId(1);
        TokenRepository::create(&store, &sample_token(10, 10, tenant))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(!store.rotate_refresh(TenantId(2), 10, now).await.unwrap());
        assert!(store.rotate_refresh(tenant, 10, now).await.unwrap());
        assert!(!store.rotate_refresh(tenant, 10, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_token_lookup_is_tenant_scoped() {
        let store = InMemoryStore::new();
        TokenRepository::create(&store, &sample_token(11, 11, TenantId(1)))
            .await
            .unwrap();

        assert!(store
            .get_by_access(TenantId(1), "access-11")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_by_access(TenantId(2), "access-11")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_by_refresh(TenantId(2), "refresh-11")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_otp_attempts_are_counted_and_capped() {
        let store = InMemoryStore::new();
        let tenant = TenantId(1);
        let now = Utc::now();
        store
            .put_challenge(&OtpChallenge {
                tenant_id: tenant,
                phone: "+15550100".to_owned(),
                code_hash: "right".to_owned(),
                channel: OtpChannel::Sms,
                attempts: 0,
                expires_at: now + ChronoDuration::minutes(5),
                used_at: None,
                created_at: now,
            })
            .await
            .unwrap();

        let phone = "+15550100";
        assert_eq!(
            store.attempt_challenge(tenant, phone, "wrong", 2, now).await.unwrap(),
            OtpAttempt::Rejected { attempts: 1 }
        );
        assert_eq!(
            store.attempt_challenge(TenantId(2), phone, "right", 2, now).await.unwrap(),
            OtpAttempt::Unavailable
        );
        assert_eq!(
            store.attempt_challenge(tenant, phone, "wrong", 2, now).await.unwrap(),
            OtpAttempt::Rejected { attempts: 2 }
        );
        // Out of guesses: even the right code is refused
        assert_eq!(
            store.attempt_challenge(tenant, phone, "right", 2, now).await.unwrap(),
            OtpAttempt::Unavailable
        );
    }

    #[tokio::test]
    async fn test_otp_challenge_is_single_use() {
        let store = InMemoryStore::new();
        let tenant = TenantId(1);
        let now = Utc::now();
        store
            .put_challenge(&OtpChallenge {
                tenant_id: tenant,
                phone: "+15550100".to_owned(),
                code_hash: "right".to_owned(),
                channel: OtpChannel::Sms,
                attempts: 0,
                expires_at: now + ChronoDuration::minutes(5),
                used_at: None,
                created_at: now,
            })
            .await
            .unwrap();

        let later = now + ChronoDuration::minutes(5);
        assert_eq!(
            store
                .attempt_challenge(tenant, "+15550100", "right", 5, later)
                .await
                .unwrap(),
            OtpAttempt::Unavailable
        );
        assert_eq!(
            store
                .attempt_challenge(tenant, "+15550100", "right", 5, now)
                .await
                .unwrap(),
            OtpAttempt::Accepted
        );
        assert_eq!(
            store
                .attempt_challenge(tenant, "+15550100", "right", 5, now)
                .await
                .unwrap(),
            OtpAttempt::Unavailable
        );
    }

    #[tokio::test]
    async fn test_revoke_lineage_counts_live_records() {
        let store = InMemoryStore::new();
        let tenant = TenantId(1);
        for id in [20, 21, 22] {
            TokenRepository::create(&store, &sample_token(id, 20, tenant))
                .await
                .unwrap();
        }
        TokenRepository::create(&store, &sample_token(30, 30, tenant))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(store.revoke(tenant, 21, now).await.unwrap());
        assert_eq!(store.revoke_lineage(tenant, 20, now).await.unwrap(), 2);
        assert_eq!(store.revoke_lineage(tenant, 20, now).await.unwrap(), 0);
        let untouched = store.get_by_access(tenant, "access-30").await.unwrap().unwrap();
        assert!(!untouched.revoked);
    }
}
