// ABOUTME: OAuth 2.0 server persistence models for clients, authorize state, codes and tokens
// ABOUTME: Used by the repository traits and the authorization and token engines
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TenantId, UserId};
use crate::constants::oauth::{
    AUTH_METHOD_CLIENT_SECRET_BASIC, AUTH_METHOD_CLIENT_SECRET_POST, AUTH_METHOD_NONE,
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN,
};
use crate::errors::OAuth2Error;

/// Grant types a client may be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// RFC 6749 Section 4.1
    AuthorizationCode,
    /// RFC 6749 Section 6
    RefreshToken,
}

impl GrantType {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => GRANT_AUTHORIZATION_CODE,
            Self::RefreshToken => GRANT_REFRESH_TOKEN,
        }
    }
}

impl FromStr for GrantType {
    type Err = OAuth2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            GRANT_AUTHORIZATION_CODE => Ok(Self::AuthorizationCode),
            GRANT_REFRESH_TOKEN => Ok(Self::RefreshToken),
            other => Err(OAuth2Error::invalid_request(format!(
                "Unsupported grant type: {other}"
            ))),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token endpoint authentication methods (RFC 7591 Section 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Secret in the form body
    ClientSecretPost,
    /// Secret in an HTTP Basic header
    ClientSecretBasic,
    /// Public client
    None,
}

impl TokenEndpointAuthMethod {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientSecretPost => AUTH_METHOD_CLIENT_SECRET_POST,
            Self::ClientSecretBasic => AUTH_METHOD_CLIENT_SECRET_BASIC,
            Self::None => AUTH_METHOD_NONE,
        }
    }
}

impl FromStr for TokenEndpointAuthMethod {
    type Err = OAuth2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            AUTH_METHOD_CLIENT_SECRET_POST => Ok(Self::ClientSecretPost),
            AUTH_METHOD_CLIENT_SECRET_BASIC => Ok(Self::ClientSecretBasic),
            AUTH_METHOD_NONE => Ok(Self::None),
            other => Err(OAuth2Error::invalid_request(format!(
                "Unsupported token endpoint auth method: {other}"
            ))),
        }
    }
}

/// PKCE code challenge method (RFC 7636 Section 4.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkceMethod {
    /// Challenge equals the verifier
    #[serde(rename = "plain")]
    Plain,
    /// Challenge is `BASE64URL(SHA256(verifier))`
    #[serde(rename = "S256")]
    S256,
}

impl PkceMethod {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl FromStr for PkceMethod {
    type Err = OAuth2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(OAuth2Error::invalid_request(format!(
                "Unsupported code_challenge_method: {other}"
            ))),
        }
    }
}

impl fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a space-delimited scope string into distinct scopes, keeping order
#[must_use]
pub fn parse_scope(scope: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for item in scope.split_whitespace() {
        if !scopes.iter().any(|existing| existing == item) {
            scopes.push(item.to_owned());
        }
    }
    scopes
}

/// Join scopes into the space-delimited wire form
#[must_use]
pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// Stored OAuth 2.0 client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Internal identifier
    pub id: i64,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Public client identifier, unique within the tenant
    pub client_id: String,
    /// Argon2 hash of the client secret
    #[serde(skip_serializing)]
    pub client_secret_hash: String,
    /// Registered redirect URIs, compared by exact string match
    pub redirect_uris: Vec<String>,
    /// Allowed grant types
    pub grants: Vec<GrantType>,
    /// Allowed scopes
    pub scopes: Vec<String>,
    /// Allowed token endpoint authentication methods
    pub token_endpoint_auth_methods: Vec<TokenEndpointAuthMethod>,
    /// Whether the user must approve the client before a code is issued
    pub require_consent: bool,
    /// Application this client belongs to
    pub app_id: Option<i64>,
    /// When the client was created
    pub created_at: DateTime<Utc>,
    /// When the client was last updated
    pub updated_at: DateTime<Utc>,
}

impl OAuthClient {
    /// Exact-match redirect URI check (RFC 6749 Section 3.1.2.3)
    #[must_use]
    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    /// Whether the client is registered for a grant
    #[must_use]
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.grants.contains(&grant)
    }

    /// Whether every requested scope is registered for the client
    #[must_use]
    pub fn allows_scopes(&self, requested: &[String]) -> bool {
        requested.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Whether the client authenticates without a secret
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_methods
            .iter()
            .all(|method| *method == TokenEndpointAuthMethod::None)
    }
}

/// In-flight authorize request persisted between the authorize call and login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeState {
    /// Tenant the request was made against
    pub tenant_id: TenantId,
    /// Requesting client
    pub client_id: String,
    /// Requested response type
    pub response_type: String,
    /// Redirect URI the code will be delivered to
    pub redirect_uri: String,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Client CSRF state echoed on redirect
    pub state: Option<String>,
    /// OIDC nonce
    pub nonce: Option<String>,
    /// PKCE code challenge
    pub code_challenge: Option<String>,
    /// PKCE code challenge method
    pub code_challenge_method: Option<PkceMethod>,
    /// When the request was accepted
    pub created_at: DateTime<Utc>,
}

/// Authorization code record; the code itself is only stored as a digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// SHA-256 digest of the code
    pub code_hash: String,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Client the code was issued to
    pub client_id: String,
    /// User who authorized the code
    pub user_id: UserId,
    /// Redirect URI that must match during token exchange
    pub redirect_uri: String,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// OIDC nonce carried from the authorize request
    pub nonce: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method
    pub code_challenge_method: Option<PkceMethod>,
    /// When this code expires
    pub expires_at: DateTime<Utc>,
    /// When this code was exchanged
    pub used_at: Option<DateTime<Utc>>,
    /// When this code was created
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Expiry is exclusive: the code is dead the instant `now >= expires_at`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the code has already been exchanged
    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Issued token pair record
///
/// Every issuance (initial or rotation) creates a new record. Records created
/// by rotating a refresh token share the `lineage_id` of the original grant and
/// point at their predecessor through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Unique record identifier
    pub id: i64,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Client the tokens were issued to
    pub client_id: String,
    /// Subject; `None` for client-only tokens
    pub user_id: Option<UserId>,
    /// SHA-256 digest of the access token
    pub access_token_hash: String,
    /// SHA-256 digest of the refresh token
    pub refresh_token_hash: Option<String>,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Access token expiry
    pub expires_at: DateTime<Utc>,
    /// Refresh token expiry
    pub refresh_expires_at: Option<DateTime<Utc>>,
    /// Identifier shared by every record rotated from the same grant
    pub lineage_id: i64,
    /// Record whose refresh token was rotated into this one
    pub parent_id: Option<i64>,
    /// When this record's refresh token was rotated
    pub rotated_at: Option<DateTime<Utc>>,
    /// Whether the record has been revoked
    pub revoked: bool,
    /// When the record was revoked
    pub revoked_at: Option<DateTime<Utc>>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl OAuthToken {
    /// Refresh token expiry check, exclusive; records without a refresh token are always expired
    #[must_use]
    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at.is_none_or(|expires_at| now >= expires_at)
    }

    /// Whether the refresh token of this record has been rotated
    #[must_use]
    pub const fn is_rotated(&self) -> bool {
        self.rotated_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_parse_scope_dedupes_and_keeps_order() {
        assert_eq!(
            parse_scope("openid  profile openid email"),
            vec!["openid", "profile", "email"]
        );
        assert!(parse_scope("   ").is_empty());
    }

    #[test]
    fn test_pkce_method_parse() {
        assert_eq!("S256".parse::<PkceMethod>().unwrap(), PkceMethod::S256);
        assert_eq!("plain".parse::<PkceMethod>().unwrap(), PkceMethod::Plain);
        assert!("s256".parse::<PkceMethod>().is_err());
    }

    #[test]
    fn test_code_expiry_is_exclusive() {
        let now = Utc::now();
        let code = AuthorizationCode {
            code_hash: "digest".to_owned(),
            tenant_id: TenantId(1),
            client_id: "app-1".to_owned(),
            user_id: UserId(7),
            redirect_uri: "https://a.example/cb".to_owned(),
            scopes: vec!["openid".to_owned()],
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            expires_at: now,
            used_at: None,
            created_at: now - Duration::minutes(1),
        };

        assert!(code.is_expired(now));
        assert!(!code.is_expired(now - Duration::seconds(1)));
    }
}
