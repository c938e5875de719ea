// ABOUTME: OAuth 2.0 request and response structures exchanged with the transport layer
// ABOUTME: Client registration input, authorize/token/revocation requests, and their results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use tollgate_core::constants::oauth::TOKEN_TYPE_BEARER;
use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tollgate_core::models::OAuthClient;
use url::Url;

/// Client registration input for `UpsertClient`
///
/// Empty lists fall back to the registry defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Public client identifier, unique within the tenant
    pub client_id: String,
    /// Secret to store; a fresh one is generated when absent
    pub client_secret: Option<String>,
    /// Redirect URIs (at least one)
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Grant types the client can use
    #[serde(default)]
    pub grant_types: Vec<String>,
    /// Scopes the client can request
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Token endpoint authentication methods
    #[serde(default)]
    pub token_endpoint_auth_methods: Vec<String>,
    /// Whether the user must approve the client
    #[serde(default)]
    pub require_consent: bool,
    /// Owning application
    pub app_id: Option<i64>,
}

/// Result of `UpsertClient`
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    /// Stored client
    pub client: OAuthClient,
    /// Plaintext secret, present only when this call generated it
    pub client_secret: Option<String>,
}

/// OAuth 2.0 Authorization Request
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthorizeRequest {
    /// Client identifier
    pub client_id: String,
    /// Response type; only `code` is accepted
    pub response_type: String,
    /// Redirect URI for response
    pub redirect_uri: String,
    /// Requested scopes, space-delimited
    pub scope: Option<String>,
    /// State parameter for CSRF protection
    pub state: Option<String>,
    /// OIDC nonce
    pub nonce: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (plain or S256)
    pub code_challenge_method: Option<String>,
}

/// Opaque handle to a persisted authorize request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuthorizeHandle(pub String);

impl AuthorizeHandle {
    /// Handle as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where the user agent is sent after a code is issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizeRedirect {
    /// Registered redirect URI
    pub redirect_uri: String,
    /// Authorization code
    pub code: String,
    /// State parameter (if provided in request)
    pub state: Option<String>,
}

impl AuthorizeRedirect {
    /// Redirect URI with `code` and `state` appended to its query
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the stored redirect URI no longer parses
    pub fn to_url(&self) -> OAuth2Result<String> {
        let mut url = Url::parse(&self.redirect_uri)
            .map_err(|_| OAuth2Error::server_error("Stored redirect_uri is not a valid URL"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("code", &self.code);
            if let Some(state) = &self.state {
                query.append_pair("state", state);
            }
        }
        Ok(url.into())
    }
}

/// OAuth 2.0 Token Request
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TokenRequest {
    /// Grant type (`authorization_code`, `refresh_token`)
    pub grant_type: String,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI (must match the authorize request)
    pub redirect_uri: Option<String>,
    /// Client ID
    pub client_id: String,
    /// Client secret; absent for public clients
    pub client_secret: Option<String>,
    /// PKCE code verifier (RFC 7636, for `authorization_code` grant)
    pub code_verifier: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
    /// Narrower scope (for `refresh_token` grant)
    pub scope: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    /// Access token (JWT)
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Expires in seconds
    pub expires_in: i64,
    /// Scopes granted
    pub scope: String,
    /// Refresh token (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Bearer response for a freshly minted pair
    #[must_use]
    pub fn bearer(
        access_token: String,
        expires_in: i64,
        scope: String,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in,
            scope,
            refresh_token,
        }
    }
}

/// Token revocation request (RFC 7009)
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RevocationRequest {
    /// Token to revoke
    pub token: String,
    /// `access_token` or `refresh_token`
    pub token_type_hint: Option<String>,
}

/// What a revocation call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationOutcome {
    /// The token (and for refresh tokens, its lineage) was revoked by this call
    Revoked,
    /// The token was already revoked
    AlreadyRevoked,
    /// No token of this tenant matched
    Unknown,
}
