// ABOUTME: Interactive authorize request lifecycle and single-use authorization code issuance/exchange
// ABOUTME: Authorize state lives in the ephemeral store; its deletion is the idempotency boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Authorization Code Flow
//!
//! ```text
//! begin_authorize ──► REQUESTED (ephemeral, TTL)
//!                         │ continue_with_identity        │ abandon / TTL
//!                         ▼                               ▼
//!                    CODE_ISSUED                 ABANDONED / EXPIRED
//!                         │ exchange_code
//!                         ▼
//!                     EXCHANGED
//! ```
//!
//! Continuation deletes the stored request before a code is minted; only the
//! caller whose delete actually removed the entry gets a code. Exchange marks
//! the code used with a conditional write before any token is issued.

use std::sync::Arc;
use std::time::Duration;

use tollgate_core::constants::crypto::{AUTHORIZATION_CODE_BYTES, AUTHORIZE_HANDLE_BYTES};
use tollgate_core::constants::oauth::{AUTHORIZE_PATH, RESPONSE_TYPE_CODE};
use tollgate_core::errors::{OAuth2Error, OAuth2ErrorKind, OAuth2Result};
use tollgate_core::models::{
    join_scopes, parse_scope, AuthorizationCode, AuthorizeState, GrantType, OAuthClient,
};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use super::client_registration::ClientRegistry;
use super::models::{AuthorizeHandle, AuthorizeRedirect, AuthorizeRequest, TokenResponse};
use super::pkce;
use super::tokens::TokenLifecycleManager;
use crate::config::EngineConfig;
use crate::crypto::{generate_random_token, sha256_hex};
use crate::database::{AuthorizeStateStore, CodeRepository};
use crate::identity::VerifiedIdentity;
use crate::logging::TenantLogger;
use crate::tenant::isolation::OwnedLookup;
use crate::tenant::RequestContext;

const STATE_KEY_PREFIX: &str = "authorize_state:";

fn state_key(handle: &str) -> String {
    format!("{STATE_KEY_PREFIX}{handle}")
}

/// Owns authorize requests and authorization codes
pub struct AuthorizationStateMachine {
    clients: ClientRegistry,
    states: Arc<dyn AuthorizeStateStore>,
    codes: Arc<dyn CodeRepository>,
    tokens: Arc<TokenLifecycleManager>,
    authorize_state_ttl: Duration,
    authorization_code_ttl: Duration,
    require_pkce: bool,
}

impl AuthorizationStateMachine {
    /// Create the state machine with lifetimes and PKCE policy from `config`
    #[must_use]
    pub fn new(
        clients: ClientRegistry,
        states: Arc<dyn AuthorizeStateStore>,
        codes: Arc<dyn CodeRepository>,
        tokens: Arc<TokenLifecycleManager>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            clients,
            states,
            codes,
            tokens,
            authorize_state_ttl: config.authorize_state_ttl,
            authorization_code_ttl: config.authorization_code_ttl,
            require_pkce: config.require_pkce,
        }
    }

    /// Validate an authorize request and persist it under a fresh handle
    ///
    /// # Errors
    ///
    /// - `invalid_client` if the client is not registered in the tenant
    /// - `invalid_request` for a response type other than `code`, an
    ///   unregistered redirect URI, or missing/malformed PKCE parameters
    /// - `unauthorized_client` if the client may not use the code grant
    /// - `invalid_scope` if a requested scope is not registered for the client
    pub async fn begin_authorize(
        &self,
        ctx: &RequestContext,
        request: &AuthorizeRequest,
    ) -> OAuth2Result<AuthorizeHandle> {
        let client = match self.clients.get_client_by_id(ctx, &request.client_id).await {
            Ok(client) => client,
            Err(e) if e.is(OAuth2ErrorKind::NotFound) => {
                warn!(
                    tenant_id = %ctx.tenant_id(),
                    client_id = %request.client_id,
                    "Authorize request for unknown client"
                );
                return Err(OAuth2Error::invalid_client());
            }
            Err(e) => return Err(e),
        };

        if request.response_type != RESPONSE_TYPE_CODE {
            return Err(OAuth2Error::invalid_request(format!(
                "Unsupported response_type '{}'; only 'code' is accepted",
                request.response_type
            )));
        }

        if !client.has_redirect_uri(&request.redirect_uri) {
            warn!(
                tenant_id = %ctx.tenant_id(),
                client_id = %client.client_id,
                redirect_uri = %request.redirect_uri,
                "Authorize request with unregistered redirect_uri"
            );
            return Err(OAuth2Error::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }

        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(OAuth2Error::unauthorized_client(
                "Client is not allowed to use the authorization_code grant",
            ));
        }

        let scopes = request
            .scope
            .as_deref()
            .map(parse_scope)
            .filter(|scopes| !scopes.is_empty())
            .unwrap_or_else(|| client.scopes.clone());
        if !client.allows_scopes(&scopes) {
            return Err(OAuth2Error::invalid_scope(
                "Requested scope is not allowed for this client",
            ));
        }

        let pkce = pkce::validate_challenge(
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        )?;
        if pkce.is_none() && (self.require_pkce || client.is_public()) {
            return Err(OAuth2Error::invalid_request(
                "code_challenge is required (PKCE)",
            ));
        }
        let (code_challenge, code_challenge_method) = pkce.unzip();

        let state = AuthorizeState {
            tenant_id: ctx.tenant_id(),
            client_id: client.client_id.clone(),
            response_type: request.response_type.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scopes,
            state: request.state.clone(),
            nonce: request.nonce.clone(),
            code_challenge,
            code_challenge_method,
            created_at: ctx.now(),
        };

        let handle = generate_random_token(AUTHORIZE_HANDLE_BYTES)?;
        ctx.storage(
            "authorize_state.save",
            self.states
                .save(&state_key(&handle), &state, self.authorize_state_ttl),
        )
        .await?;

        debug!(
            tenant_id = %ctx.tenant_id(),
            client_id = %client.client_id,
            "Authorize request persisted"
        );
        Ok(AuthorizeHandle(handle))
    }

    /// The stored authorize request behind `handle`
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the handle is unknown, expired, consumed or
    /// belongs to another tenant
    pub async fn load_state(
        &self,
        ctx: &RequestContext,
        handle: &str,
    ) -> OAuth2Result<AuthorizeState> {
        ctx.storage("authorize_state.get", self.states.get(&state_key(handle)))
            .await?
            .owned_by(ctx)
            .ok_or_else(|| OAuth2Error::not_found("Authorization request not found or expired"))
    }

    /// Authorize URL that replays the stored request, for login pages that
    /// need to resume the flow
    ///
    /// # Errors
    ///
    /// Returns `not_found` under the same conditions as [`Self::load_state`]
    pub async fn resume_url(&self, ctx: &RequestContext, handle: &str) -> OAuth2Result<String> {
        let state = self.load_state(ctx, handle).await?;

        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("client_id", &state.client_id)
            .append_pair("response_type", &state.response_type)
            .append_pair("redirect_uri", &state.redirect_uri)
            .append_pair("scope", &join_scopes(&state.scopes));
        if let Some(value) = &state.state {
            query.append_pair("state", value);
        }
        if let Some(nonce) = &state.nonce {
            query.append_pair("nonce", nonce);
        }
        if let Some(challenge) = &state.code_challenge {
            query.append_pair("code_challenge", challenge);
        }
        if let Some(method) = state.code_challenge_method {
            query.append_pair("code_challenge_method", method.as_str());
        }

        Ok(format!("{AUTHORIZE_PATH}?{}", query.finish()))
    }

    /// Drop an authorize request without issuing a code
    ///
    /// # Errors
    ///
    /// Returns `not_found` if there is nothing to abandon
    pub async fn abandon(&self, ctx: &RequestContext, handle: &str) -> OAuth2Result<()> {
        self.load_state(ctx, handle).await?;
        let removed = ctx
            .storage(
                "authorize_state.delete",
                self.states.delete(&state_key(handle)),
            )
            .await?;
        if !removed {
            return Err(OAuth2Error::not_found(
                "Authorization request not found or expired",
            ));
        }
        debug!(tenant_id = %ctx.tenant_id(), "Authorize request abandoned");
        Ok(())
    }

    /// Resume an authorize request for a verified user and issue a code
    ///
    /// The stored request is deleted first; a call whose delete removes
    /// nothing fails, so one handle never yields two codes.
    ///
    /// # Errors
    ///
    /// - `not_found` if the handle is unknown, expired or already consumed
    /// - `invalid_request` if the identity was verified in another tenant
    /// - `server_error` for infrastructure failures
    pub async fn continue_with_identity(
        &self,
        ctx: &RequestContext,
        handle: &str,
        identity: &VerifiedIdentity,
    ) -> OAuth2Result<AuthorizeRedirect> {
        let state = self.load_state(ctx, handle).await?;

        if identity.tenant_id != ctx.tenant_id() {
            TenantLogger::log_security_event(
                ctx.tenant_id(),
                Some(&state.client_id),
                "cross_tenant_identity",
                "high",
                &format!("identity verified in tenant {} presented", identity.tenant_id),
            );
            return Err(OAuth2Error::invalid_request(
                "Identity does not belong to this tenant",
            ));
        }

        let claimed = ctx
            .storage(
                "authorize_state.delete",
                self.states.delete(&state_key(handle)),
            )
            .await?;
        if !claimed {
            debug!(tenant_id = %ctx.tenant_id(), "Authorize request consumed concurrently");
            return Err(OAuth2Error::not_found(
                "Authorization request not found or expired",
            ));
        }

        let code = generate_random_token(AUTHORIZATION_CODE_BYTES)?;
        let record = AuthorizationCode {
            code_hash: sha256_hex(&code),
            tenant_id: ctx.tenant_id(),
            client_id: state.client_id.clone(),
            user_id: identity.user_id,
            redirect_uri: state.redirect_uri.clone(),
            scopes: state.scopes,
            nonce: state.nonce,
            code_challenge: state.code_challenge,
            code_challenge_method: state.code_challenge_method,
            expires_at: ctx.expires_after(self.authorization_code_ttl)?,
            used_at: None,
            created_at: ctx.now(),
        };
        ctx.storage("code.create", self.codes.create(&record))
            .await?;

        info!(
            tenant_id = %ctx.tenant_id(),
            client_id = %state.client_id,
            user_id = %identity.user_id,
            auth_method = %identity.method,
            "Authorization code issued"
        );

        Ok(AuthorizeRedirect {
            redirect_uri: state.redirect_uri,
            code,
            state: state.state,
        })
    }

    /// Exchange an authorization code for a token pair
    ///
    /// Every check runs before the code is marked used, so a rejected attempt
    /// leaves the code untouched.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` for unknown, foreign, expired or used codes, a
    /// mismatched redirect URI, or a failed PKCE check
    pub async fn exchange_code(
        &self,
        ctx: &RequestContext,
        client: &OAuthClient,
        code: &str,
        redirect_uri: Option<&str>,
        code_verifier: Option<&str>,
        issuer: &str,
    ) -> OAuth2Result<TokenResponse> {
        let code_hash = sha256_hex(code);
        let record = ctx
            .storage("code.get", self.codes.get(ctx.tenant_id(), &code_hash))
            .await?
            .owned_by(ctx)
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid authorization code"))?;

        if record.client_id != client.client_id {
            warn!(
                tenant_id = %ctx.tenant_id(),
                client_id = %client.client_id,
                "Authorization code presented by a different client"
            );
            return Err(OAuth2Error::invalid_grant("Invalid authorization code"));
        }
        if redirect_uri != Some(record.redirect_uri.as_str()) {
            return Err(OAuth2Error::invalid_grant("redirect_uri mismatch"));
        }
        if record.is_expired(ctx.now()) {
            return Err(OAuth2Error::invalid_grant("Authorization code expired"));
        }
        if record.is_used() {
            TenantLogger::log_security_event(
                ctx.tenant_id(),
                Some(&client.client_id),
                "authorization_code_replay",
                "medium",
                "used authorization code presented again",
            );
            return Err(OAuth2Error::invalid_grant(
                "Authorization code already used",
            ));
        }

        pkce::verify(
            &client.client_id,
            record.code_challenge.as_deref(),
            record.code_challenge_method,
            code_verifier,
        )?;

        let claimed = ctx
            .storage(
                "code.mark_used",
                self.codes.mark_used(ctx.tenant_id(), &code_hash, ctx.now()),
            )
            .await?;
        if !claimed {
            return Err(OAuth2Error::invalid_grant(
                "Authorization code already used",
            ));
        }

        TenantLogger::log_code_exchanged(ctx.tenant_id(), &client.client_id, record.user_id);
        self.tokens
            .issue_token_pair(ctx, client, Some(record.user_id), &record.scopes, issuer)
            .await
    }
}

