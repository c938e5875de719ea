// ABOUTME: Transport-facing OAuth 2.0 authorization server wiring every engine component together
// ABOUTME: Authorize, token grants, validation, userinfo, revocation and JWKS operations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tollgate_core::ids::IdGenerator;
use tollgate_core::models::{AuthorizeState, GrantType, SigningKey, TenantId};
use tracing::field::Empty;
use tracing::{instrument, warn};

use super::authorization::AuthorizationStateMachine;
use super::client_registration::ClientRegistry;
use super::models::{
    AuthorizeHandle, AuthorizeRedirect, AuthorizeRequest, ClientRegistration,
    ClientRegistrationRequest, RevocationOutcome, RevocationRequest, TokenRequest, TokenResponse,
};
use super::tokens::{AccessTokenClaims, TokenLifecycleManager};
use crate::config::EngineConfig;
use crate::database::Storage;
use crate::identity::{UserInfo, UserInfoLookup, VerifiedIdentity};
use crate::jwks::{JsonWebKeySet, SigningKeyManager};
use crate::logging::record_tenant_context;
use crate::tenant::RequestContext;

/// OAuth 2.0 Authorization Server
///
/// Every operation takes a [`RequestContext`] naming the tenant it runs in;
/// [`Self::context`] builds one with the configured storage deadline.
pub struct OAuth2AuthorizationServer {
    config: Arc<EngineConfig>,
    clients: ClientRegistry,
    keys: Arc<SigningKeyManager>,
    tokens: Arc<TokenLifecycleManager>,
    authorization: AuthorizationStateMachine,
    userinfo: UserInfoLookup,
}

impl OAuth2AuthorizationServer {
    /// Wire the engine over `storage`
    #[must_use]
    pub fn new(storage: &Storage, ids: Arc<IdGenerator>, config: EngineConfig) -> Self {
        let clients = ClientRegistry::new(storage.clients.clone(), ids.clone());
        let keys = Arc::new(SigningKeyManager::new(
            storage.keys.clone(),
            ids.clone(),
            config.signing_key_bits,
            config.key_rotation_days,
        ));
        let tokens = Arc::new(TokenLifecycleManager::new(
            storage.tokens.clone(),
            keys.clone(),
            ids,
            &config,
        ));
        let authorization = AuthorizationStateMachine::new(
            clients.clone(),
            storage.authorize_states.clone(),
            storage.codes.clone(),
            tokens.clone(),
            &config,
        );

        Self {
            config: Arc::new(config),
            clients,
            keys,
            tokens,
            authorization,
            userinfo: UserInfoLookup::new(storage.users.clone()),
        }
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Context for one operation in `tenant_id`, timestamped now
    #[must_use]
    pub fn context(&self, tenant_id: TenantId) -> RequestContext {
        RequestContext::new(tenant_id, self.config.storage_timeout)
    }

    /// Client registry
    #[must_use]
    pub const fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Signing key manager
    #[must_use]
    pub fn keys(&self) -> &SigningKeyManager {
        &self.keys
    }

    /// Token lifecycle manager
    #[must_use]
    pub fn tokens(&self) -> &TokenLifecycleManager {
        &self.tokens
    }

    /// Create or replace a client
    ///
    /// # Errors
    ///
    /// See [`ClientRegistry::upsert_client`]
    pub async fn register_client(
        &self,
        ctx: &RequestContext,
        request: ClientRegistrationRequest,
    ) -> OAuth2Result<ClientRegistration> {
        self.clients.upsert_client(ctx, request).await
    }

    /// Handle an authorization request (GET /oauth/authorize)
    ///
    /// Returns the handle a login page carries until the user is verified.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationStateMachine::begin_authorize`]
    #[instrument(skip_all, fields(tenant_id = Empty, client_id = Empty))]
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        request: &AuthorizeRequest,
    ) -> OAuth2Result<AuthorizeHandle> {
        record_tenant_context(ctx.tenant_id(), &request.client_id);
        self.authorization.begin_authorize(ctx, request).await
    }

    /// The pending authorize request behind `handle`
    ///
    /// # Errors
    ///
    /// Returns `not_found` for unknown, expired or consumed handles
    pub async fn load_state(
        &self,
        ctx: &RequestContext,
        handle: &str,
    ) -> OAuth2Result<AuthorizeState> {
        self.authorization.load_state(ctx, handle).await
    }

    /// Authorize URL replaying the pending request behind `handle`
    ///
    /// # Errors
    ///
    /// Returns `not_found` for unknown, expired or consumed handles
    pub async fn resume_url(&self, ctx: &RequestContext, handle: &str) -> OAuth2Result<String> {
        self.authorization.resume_url(ctx, handle).await
    }

    /// Cancel the pending request behind `handle`
    ///
    /// # Errors
    ///
    /// Returns `not_found` for unknown, expired or consumed handles
    pub async fn abandon(&self, ctx: &RequestContext, handle: &str) -> OAuth2Result<()> {
        self.authorization.abandon(ctx, handle).await
    }

    /// Finish an authorize request for a verified user
    ///
    /// # Errors
    ///
    /// See [`AuthorizationStateMachine::continue_with_identity`]
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id(), user_id = %identity.user_id))]
    pub async fn continue_with_identity(
        &self,
        ctx: &RequestContext,
        handle: &str,
        identity: &VerifiedIdentity,
    ) -> OAuth2Result<AuthorizeRedirect> {
        self.authorization
            .continue_with_identity(ctx, handle, identity)
            .await
    }

    /// Handle a token request (POST /oauth/token)
    ///
    /// # Errors
    ///
    /// - `invalid_request` for missing grant parameters
    /// - `unsupported_grant_type` for grants other than `authorization_code`
    ///   and `refresh_token`
    /// - `invalid_client` if client authentication fails
    /// - `unauthorized_client` if the client may not use the grant
    /// - grant errors from the code exchange or refresh rotation
    #[instrument(skip_all, fields(tenant_id = Empty, client_id = Empty, grant_type = %request.grant_type))]
    pub async fn token(
        &self,
        ctx: &RequestContext,
        request: TokenRequest,
    ) -> OAuth2Result<TokenResponse> {
        record_tenant_context(ctx.tenant_id(), &request.client_id);

        if request.grant_type.trim().is_empty() {
            return Err(OAuth2Error::invalid_request("grant_type is required"));
        }
        let grant = request
            .grant_type
            .parse::<GrantType>()
            .map_err(|_| OAuth2Error::unsupported_grant_type())?;

        let client = self
            .clients
            .authenticate_client(ctx, &request.client_id, request.client_secret.as_deref())
            .await?;

        if !client.allows_grant(grant) {
            warn!(
                tenant_id = %ctx.tenant_id(),
                client_id = %client.client_id,
                grant_type = %grant,
                "Client used a grant it is not registered for"
            );
            return Err(OAuth2Error::unauthorized_client(format!(
                "Client is not allowed to use the {grant} grant"
            )));
        }

        match grant {
            GrantType::AuthorizationCode => {
                let code = request
                    .code
                    .as_deref()
                    .ok_or_else(|| OAuth2Error::invalid_request("Missing authorization code"))?;
                self.authorization
                    .exchange_code(
                        ctx,
                        &client,
                        code,
                        request.redirect_uri.as_deref(),
                        request.code_verifier.as_deref(),
                        &self.config.issuer,
                    )
                    .await
            }
            GrantType::RefreshToken => {
                let refresh_token = request
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| OAuth2Error::invalid_request("Missing refresh_token"))?;
                self.tokens
                    .rotate_refresh_token(
                        ctx,
                        &client,
                        refresh_token,
                        request.scope.as_deref(),
                        &self.config.issuer,
                    )
                    .await
            }
        }
    }

    /// Validate a bearer access token
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` for any token that does not verify
    pub async fn validate(
        &self,
        ctx: &RequestContext,
        access_token: &str,
    ) -> OAuth2Result<AccessTokenClaims> {
        self.tokens
            .validate_token(ctx, access_token, &self.config.issuer)
            .await
    }

    /// Claims about the user behind a bearer access token (GET /oauth/userinfo)
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` for tokens that do not verify or carry no user
    pub async fn userinfo(
        &self,
        ctx: &RequestContext,
        access_token: &str,
    ) -> OAuth2Result<UserInfo> {
        let claims = self.validate(ctx, access_token).await?;
        self.userinfo.lookup(ctx, &claims).await
    }

    /// Handle a revocation request (RFC 7009)
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for an empty token, `server_error` if storage fails
    pub async fn revoke(
        &self,
        ctx: &RequestContext,
        request: &RevocationRequest,
    ) -> OAuth2Result<RevocationOutcome> {
        if request.token.is_empty() {
            return Err(OAuth2Error::invalid_request("Missing token"));
        }
        self.tokens
            .revoke_token(ctx, &request.token, request.token_type_hint.as_deref())
            .await
    }

    /// Public keys of the tenant (GET /.well-known/jwks.json)
    ///
    /// # Errors
    ///
    /// Returns `server_error` if storage fails
    pub async fn jwks(&self, ctx: &RequestContext) -> OAuth2Result<JsonWebKeySet> {
        self.keys.jwks(ctx).await
    }

    /// Rotate the tenant's signing key
    ///
    /// # Errors
    ///
    /// Returns `server_error` if key generation or storage fails
    pub async fn rotate_signing_key(&self, ctx: &RequestContext) -> OAuth2Result<SigningKey> {
        self.keys.rotate_key(ctx).await
    }
}
