// ABOUTME: Integration tests for refresh rotation racing reuse and revocation of the same lineage
// ABOUTME: A token repository with a slow insert holds the rotated pair in flight while the race runs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{create_test_engine_with_tokens, issue_via_code_flow, register_client, TestEngine, T1};
use tokio::time::sleep;
use tollgate::database::{InMemoryStore, TokenRepository};
use tollgate::oauth2_server::{RevocationOutcome, RevocationRequest};
use tollgate_core::errors::{DatabaseResult, OAuth2ErrorKind};
use tollgate_core::models::{OAuthToken, TenantId};

/// Token repository whose inserts land only after `create_delay`
struct SlowTokens {
    inner: Arc<InMemoryStore>,
    create_delay: Duration,
    created: Mutex<Vec<OAuthToken>>,
}

impl SlowTokens {
    fn new(inner: Arc<InMemoryStore>, create_delay: Duration) -> Self {
        Self {
            inner,
            create_delay,
            created: Mutex::new(Vec::new()),
        }
    }

    fn created(&self) -> Vec<OAuthToken> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenRepository for SlowTokens {
    async fn create(&self, token: &OAuthToken) -> DatabaseResult<()> {
        sleep(self.create_delay).await;
        TokenRepository::create(&*self.inner, token).await?;
        self.created.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn get_by_access(
        &self,
        tenant_id: TenantId,
        access_token_hash: &str,
    ) -> DatabaseResult<Option<OAuthToken>> {
        self.inner.get_by_access(tenant_id, access_token_hash).await
    }

    async fn get_by_refresh(
        &self,
        tenant_id: TenantId,
        refresh_token_hash: &str,
    ) -> DatabaseResult<Option<OAuthToken>> {
        self.inner.get_by_refresh(tenant_id, refresh_token_hash).await
    }

    async fn rotate_refresh(
        &self,
        tenant_id: TenantId,
        token_id: i64,
        rotated_at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        self.inner.rotate_refresh(tenant_id, token_id, rotated_at).await
    }

    async fn revoke(
        &self,
        tenant_id: TenantId,
        token_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        self.inner.revoke(tenant_id, token_id, revoked_at).await
    }

    async fn revoke_lineage(
        &self,
        tenant_id: TenantId,
        lineage_id: i64,
        revoked_at: DateTime<Utc>,
    ) -> DatabaseResult<u64> {
        self.inner
            .revoke_lineage(tenant_id, lineage_id, revoked_at)
            .await
    }
}

fn slow_engine() -> (TestEngine, Arc<SlowTokens>) {
    let store = Arc::new(InMemoryStore::new());
    let tokens = Arc::new(SlowTokens::new(store.clone(), Duration::from_millis(200)));
    let engine = create_test_engine_with_tokens(store, tokens.clone());
    (engine, tokens)
}

async fn assert_all_revoked(engine: &TestEngine, tokens: &SlowTokens) {
    let created = tokens.created();
    assert_eq!(created.len(), 2, "original pair plus the rotated pair");
    for record in created {
        let stored = engine
            .store
            .get_by_access(T1, &record.access_token_hash)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.revoked, "record {} left live", stored.id);
    }
}

#[tokio::test]
async fn test_slow_insert_alone_still_rotates() {
    let (engine, _tokens) = slow_engine();
    let app = register_client(&engine, T1, "app-1").await;
    let pair = issue_via_code_flow(&engine, T1, &app, "u1@example.com").await;
    let ctx = engine.ctx(T1);

    let rotated = engine
        .server
        .tokens()
        .rotate_refresh_token(
            &ctx,
            &app.client,
            pair.refresh_token.as_deref().unwrap(),
            None,
            &engine.server.config().issuer,
        )
        .await
        .unwrap();
    engine.server.validate(&ctx, &rotated.access_token).await.unwrap();
}

#[tokio::test]
async fn test_reuse_during_rotation_revokes_the_new_pair() {
    let (engine, tokens) = slow_engine();
    let app = register_client(&engine, T1, "app-1").await;
    let pair = issue_via_code_flow(&engine, T1, &app, "u1@example.com").await;
    let refresh = pair.refresh_token.clone().unwrap();
    let ctx = engine.ctx(T1);
    let issuer = engine.server.config().issuer.clone();
    let manager = engine.server.tokens();

    // The replay lands while the rotated pair is still being inserted
    let (rotation, replay) = tokio::join!(
        manager.rotate_refresh_token(&ctx, &app.client, &refresh, None, &issuer),
        async {
            sleep(Duration::from_millis(50)).await;
            manager
                .rotate_refresh_token(&ctx, &app.client, &refresh, None, &issuer)
                .await
        }
    );

    assert!(replay.unwrap_err().is(OAuth2ErrorKind::InvalidGrant));
    assert!(rotation.unwrap_err().is(OAuth2ErrorKind::InvalidGrant));
    assert_all_revoked(&engine, &tokens).await;

    let err = engine
        .server
        .validate(&ctx, &pair.access_token)
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidToken));
}

#[tokio::test]
async fn test_revocation_during_rotation_revokes_the_new_pair() {
    let (engine, tokens) = slow_engine();
    let app = register_client(&engine, T1, "app-1").await;
    let pair = issue_via_code_flow(&engine, T1, &app, "u1@example.com").await;
    let refresh = pair.refresh_token.clone().unwrap();
    let ctx = engine.ctx(T1);
    let issuer = engine.server.config().issuer.clone();

    let (rotation, revocation) = tokio::join!(
        engine
            .server
            .tokens()
            .rotate_refresh_token(&ctx, &app.client, &refresh, None, &issuer),
        async {
            sleep(Duration::from_millis(50)).await;
            engine
                .server
                .revoke(
                    &ctx,
                    &RevocationRequest {
                        token: refresh.clone(),
                        token_type_hint: Some("refresh_token".to_owned()),
                    },
                )
                .await
        }
    );

    assert_eq!(revocation.unwrap(), RevocationOutcome::Revoked);
    assert!(rotation.unwrap_err().is(OAuth2ErrorKind::InvalidGrant));
    assert_all_revoked(&engine, &tokens).await;
}
