// ABOUTME: Access/refresh token lifecycle: RS256 issuance, validation, rotation with reuse detection, revocation
// ABOUTME: Refresh tokens are opaque random values persisted only as SHA-256 digests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tollgate_core::ids::IdGenerator;
use tollgate_core::models::{
    join_scopes, parse_scope, GrantType, OAuthClient, OAuthToken, TenantId, UserId,
};
use tracing::{debug, error, warn};

use super::models::{RevocationOutcome, TokenResponse};
use crate::config::EngineConfig;
use crate::crypto::{generate_random_token, sha256_hex};
use crate::database::TokenRepository;
use crate::jwks::SigningKeyManager;
use crate::logging::TenantLogger;
use crate::tenant::isolation::OwnedLookup;
use crate::tenant::RequestContext;

const JTI_BYTES: usize = 16;

/// Claims carried by every access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Tenant the token was issued in
    pub tenant: TenantId,
    /// Subject: user ID, or the client ID for client-only tokens
    pub sub: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Space-delimited granted scopes
    pub scope: String,
    /// Issuer
    pub iss: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
}

impl AccessTokenClaims {
    /// Granted scopes as a list
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        parse_scope(&self.scope)
    }
}

/// Position of a new record in an existing refresh lineage
#[derive(Debug, Clone, Copy)]
struct Lineage {
    lineage_id: i64,
    parent_id: i64,
}

/// Issues, validates, rotates and revokes access/refresh tokens
pub struct TokenLifecycleManager {
    tokens: Arc<dyn TokenRepository>,
    keys: Arc<SigningKeyManager>,
    ids: Arc<IdGenerator>,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    refresh_token_bytes: usize,
}

impl TokenLifecycleManager {
    /// Create a manager using the lifetimes and entropy from `config`
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenRepository>,
        keys: Arc<SigningKeyManager>,
        ids: Arc<IdGenerator>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            tokens,
            keys,
            ids,
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            refresh_token_bytes: config.refresh_token_bytes,
        }
    }

    /// Mint an access token, plus a refresh token when the client may use the
    /// `refresh_token` grant, and persist the record
    ///
    /// # Errors
    ///
    /// Returns `server_error` if signing, randomness or storage fails
    pub async fn issue_token_pair(
        &self,
        ctx: &RequestContext,
        client: &OAuthClient,
        user_id: Option<UserId>,
        scopes: &[String],
        issuer: &str,
    ) -> OAuth2Result<TokenResponse> {
        self.issue(ctx, client, user_id, scopes, issuer, None).await
    }

    async fn issue(
        &self,
        ctx: &RequestContext,
        client: &OAuthClient,
        user_id: Option<UserId>,
        scopes: &[String],
        issuer: &str,
        lineage: Option<Lineage>,
    ) -> OAuth2Result<TokenResponse> {
        let signer = self.keys.active_signer(ctx).await?;
        let ctx = &ctx.extended_by(signer.key_generation);
        let token_id = self.ids.next_id();
        let now = ctx.now();

        // JWT timestamps are whole seconds; the record uses the same truncated expiry
        let exp = ctx.expires_after(self.access_token_ttl)?.timestamp();
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| OAuth2Error::server_error("Lifetime out of range"))?;
        let scope = join_scopes(scopes);

        let claims = AccessTokenClaims {
            tenant: ctx.tenant_id(),
            sub: user_id.map_or_else(|| client.client_id.clone(), |user| user.to_string()),
            client_id: client.client_id.clone(),
            scope: scope.clone(),
            iss: issuer.to_owned(),
            iat: now.timestamp(),
            exp,
            jti: generate_random_token(JTI_BYTES)?,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(signer.kid.clone());
        let access_token = encode(&header, &claims, &signer.encoding_key).map_err(|e| {
            error!(tenant_id = %ctx.tenant_id(), kid = %signer.kid, "Failed to sign access token: {e}");
            OAuth2Error::server_error("Failed to sign access token")
        })?;

        let refresh_token = if client.allows_grant(GrantType::RefreshToken) {
            Some(generate_random_token(self.refresh_token_bytes)?)
        } else {
            None
        };
        let refresh_expires_at = match refresh_token {
            Some(_) => Some(ctx.expires_after(self.refresh_token_ttl)?),
            None => None,
        };

        let record = OAuthToken {
            id: token_id,
            tenant_id: ctx.tenant_id(),
            client_id: client.client_id.clone(),
            user_id,
            access_token_hash: sha256_hex(&access_token),
            refresh_token_hash: refresh_token.as_deref().map(sha256_hex),
            scopes: scopes.to_vec(),
            expires_at,
            refresh_expires_at,
            lineage_id: lineage.map_or(token_id, |l| l.lineage_id),
            parent_id: lineage.map(|l| l.parent_id),
            rotated_at: None,
            revoked: false,
            revoked_at: None,
            created_at: now,
        };
        ctx.storage("token.create", self.tokens.create(&record))
            .await?;

        TenantLogger::log_token_issued(
            ctx.tenant_id(),
            &client.client_id,
            user_id,
            &signer.kid,
            refresh_token.is_some(),
        );

        Ok(TokenResponse::bearer(
            access_token,
            exp - now.timestamp(),
            scope,
            refresh_token,
        ))
    }

    /// Verify an access token and return its claims
    ///
    /// The signature is checked with the key named by the token's kid, so
    /// tokens signed before a rotation keep verifying until they expire.
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` for any signature, issuer, tenant, expiry or
    /// revocation failure, and `server_error` if storage fails
    pub async fn validate_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        issuer: &str,
    ) -> OAuth2Result<AccessTokenClaims> {
        let header = decode_header(token).map_err(|e| {
            debug!(tenant_id = %ctx.tenant_id(), "Malformed access token header: {e}");
            OAuth2Error::invalid_token("Malformed access token")
        })?;
        let kid = header
            .kid
            .ok_or_else(|| OAuth2Error::invalid_token("Access token has no key ID"))?;

        let decoding_key = self
            .keys
            .decoding_key(ctx, &kid)
            .await?
            .ok_or_else(|| OAuth2Error::invalid_token("Unknown signing key"))?;

        // Expiry is checked below against the context timestamp, without leeway
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let claims = decode::<AccessTokenClaims>(token, &decoding_key, &validation)
            .map_err(|e| {
                debug!(tenant_id = %ctx.tenant_id(), kid = %kid, "Access token rejected: {e}");
                OAuth2Error::invalid_token("Invalid access token")
            })?
            .claims;

        if claims.tenant != ctx.tenant_id() {
            TenantLogger::log_security_event(
                ctx.tenant_id(),
                Some(&claims.client_id),
                "cross_tenant_token",
                "high",
                &format!("token issued for tenant {} presented", claims.tenant),
            );
            return Err(OAuth2Error::invalid_token("Invalid access token"));
        }

        if ctx.now().timestamp() >= claims.exp {
            return Err(OAuth2Error::invalid_token("Access token expired"));
        }

        let record = ctx
            .storage(
                "token.get_by_access",
                self.tokens
                    .get_by_access(ctx.tenant_id(), &sha256_hex(token)),
            )
            .await?
            .owned_by(ctx)
            .ok_or_else(|| OAuth2Error::invalid_token("Unknown access token"))?;

        if record.revoked {
            return Err(OAuth2Error::invalid_token("Access token revoked"));
        }

        Ok(claims)
    }

    /// Exchange a refresh token for a new pair in the same lineage
    ///
    /// Presenting a refresh token that was already rotated, or losing a
    /// concurrent rotation of the same token, revokes the whole lineage.
    /// `scope` may narrow the original grant.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` for unknown, revoked, expired, foreign or reused
    /// refresh tokens, `invalid_scope` for a scope outside the original grant,
    /// and `server_error` for infrastructure failures
    pub async fn rotate_refresh_token(
        &self,
        ctx: &RequestContext,
        client: &OAuthClient,
        refresh_token: &str,
        scope: Option<&str>,
        issuer: &str,
    ) -> OAuth2Result<TokenResponse> {
        let record = ctx
            .storage(
                "token.get_by_refresh",
                self.tokens
                    .get_by_refresh(ctx.tenant_id(), &sha256_hex(refresh_token)),
            )
            .await?
            .owned_by(ctx)
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid refresh token"))?;

        if record.client_id != client.client_id {
            warn!(
                tenant_id = %ctx.tenant_id(),
                client_id = %client.client_id,
                "Refresh token presented by a different client"
            );
            return Err(OAuth2Error::invalid_grant("Invalid refresh token"));
        }
        if record.revoked {
            return Err(OAuth2Error::invalid_grant("Refresh token revoked"));
        }
        if record.is_rotated() {
            return Err(self.revoke_on_reuse(ctx, &record).await);
        }
        if record.is_refresh_expired(ctx.now()) {
            return Err(OAuth2Error::invalid_grant("Refresh token expired"));
        }

        let scopes = match scope.map(parse_scope).filter(|s| !s.is_empty()) {
            Some(requested) => {
                if !requested.iter().all(|s| record.scopes.contains(s)) {
                    return Err(OAuth2Error::invalid_scope(
                        "Requested scope exceeds the original grant",
                    ));
                }
                requested
            }
            None => record.scopes.clone(),
        };

        let parent_digest = sha256_hex(refresh_token);
        let claimed = ctx
            .storage(
                "token.rotate_refresh",
                self.tokens
                    .rotate_refresh(ctx.tenant_id(), record.id, ctx.now()),
            )
            .await?;
        if !claimed {
            return Err(self.revoke_on_reuse(ctx, &record).await);
        }

        let response = self
            .issue(
                ctx,
                client,
                record.user_id,
                &scopes,
                issuer,
                Some(Lineage {
                    lineage_id: record.lineage_id,
                    parent_id: record.id,
                }),
            )
            .await?;

        // A reuse or revocation that swept the lineage while the child was
        // being inserted could not see it; the child must not outlive the sweep
        let parent_revoked = self
            .find_by_refresh(ctx, &parent_digest)
            .await?
            .is_none_or(|parent| parent.revoked);
        if parent_revoked {
            let records = ctx
                .storage(
                    "token.revoke_lineage",
                    self.tokens
                        .revoke_lineage(ctx.tenant_id(), record.lineage_id, ctx.now()),
                )
                .await?;
            TenantLogger::log_token_revoked(ctx.tenant_id(), record.lineage_id, records);
            warn!(
                tenant_id = %ctx.tenant_id(),
                client_id = %client.client_id,
                lineage_id = record.lineage_id,
                "Lineage revoked during rotation; new pair withdrawn"
            );
            return Err(OAuth2Error::invalid_grant("Refresh token revoked"));
        }

        TenantLogger::log_token_rotated(ctx.tenant_id(), &client.client_id, record.lineage_id);
        Ok(response)
    }

    /// Revoke the lineage of a reused refresh token; the returned error is
    /// what the caller reports
    async fn revoke_on_reuse(&self, ctx: &RequestContext, record: &OAuthToken) -> OAuth2Error {
        TenantLogger::log_security_event(
            ctx.tenant_id(),
            Some(&record.client_id),
            "refresh_token_reuse",
            "high",
            &format!("rotated refresh token of lineage {} presented again", record.lineage_id),
        );

        match ctx
            .storage(
                "token.revoke_lineage",
                self.tokens
                    .revoke_lineage(ctx.tenant_id(), record.lineage_id, ctx.now()),
            )
            .await
        {
            Ok(records) => {
                TenantLogger::log_token_revoked(ctx.tenant_id(), record.lineage_id, records);
                OAuth2Error::invalid_grant("Refresh token already used")
            }
            Err(e) => e,
        }
    }

    /// Revoke an access or refresh token (RFC 7009)
    ///
    /// A refresh token revokes its whole lineage. `token_type_hint` only
    /// changes lookup order.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if storage fails
    pub async fn revoke_token(
        &self,
        ctx: &RequestContext,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> OAuth2Result<RevocationOutcome> {
        let digest = sha256_hex(token);
        let refresh_first = token_type_hint == Some("refresh_token");

        let (record, is_refresh) = if refresh_first {
            match self.find_by_refresh(ctx, &digest).await? {
                Some(record) => (Some(record), true),
                None => (self.find_by_access(ctx, &digest).await?, false),
            }
        } else {
            match self.find_by_access(ctx, &digest).await? {
                Some(record) => (Some(record), false),
                None => (self.find_by_refresh(ctx, &digest).await?, true),
            }
        };

        let Some(record) = record else {
            debug!(tenant_id = %ctx.tenant_id(), "Revocation of unknown token");
            return Ok(RevocationOutcome::Unknown);
        };
        if record.revoked {
            return Ok(RevocationOutcome::AlreadyRevoked);
        }

        let revoked = if is_refresh {
            let records = ctx
                .storage(
                    "token.revoke_lineage",
                    self.tokens
                        .revoke_lineage(ctx.tenant_id(), record.lineage_id, ctx.now()),
                )
                .await?;
            TenantLogger::log_token_revoked(ctx.tenant_id(), record.lineage_id, records);
            records > 0
        } else {
            let revoked = ctx
                .storage(
                    "token.revoke",
                    self.tokens.revoke(ctx.tenant_id(), record.id, ctx.now()),
                )
                .await?;
            if revoked {
                TenantLogger::log_token_revoked(ctx.tenant_id(), record.lineage_id, 1);
            }
            revoked
        };

        Ok(if revoked {
            RevocationOutcome::Revoked
        } else {
            RevocationOutcome::AlreadyRevoked
        })
    }

    async fn find_by_access(
        &self,
        ctx: &RequestContext,
        digest: &str,
    ) -> OAuth2Result<Option<OAuthToken>> {
        Ok(ctx
            .storage(
                "token.get_by_access",
                self.tokens.get_by_access(ctx.tenant_id(), digest),
            )
            .await?
            .owned_by(ctx))
    }

    async fn find_by_refresh(
        &self,
        ctx: &RequestContext,
        digest: &str,
    ) -> OAuth2Result<Option<OAuthToken>> {
        Ok(ctx
            .storage(
                "token.get_by_refresh",
                self.tokens.get_by_refresh(ctx.tenant_id(), digest),
            )
            .await?
            .owned_by(ctx))
    }
}
