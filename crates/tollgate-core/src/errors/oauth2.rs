// ABOUTME: OAuth2 protocol error vocabulary with descriptions, severity classes and status mapping
// ABOUTME: Serializes to the RFC 6749 error response shape consumed by the transport layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

const RFC6749_AUTHORIZE_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1";
const RFC6749_TOKEN_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2";
const RFC6750_TOKEN_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6750#section-3.1";

/// Broad class of an error, used by the transport layer to pick a status code
/// and by operators to decide what to alert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Malformed or mismatched request parameters
    Client,
    /// Expired, consumed or replayed credential
    Grant,
    /// Client not permitted the grant or scope it asked for
    Authorization,
    /// Storage, signing or deadline failure inside the engine
    Infrastructure,
}

/// Machine-readable error codes
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuth2ErrorKind {
    /// Missing, malformed or mismatched request parameter
    InvalidRequest,
    /// Client unknown or authentication failed
    InvalidClient,
    /// Authorization code or refresh token is invalid, expired, used or revoked
    InvalidGrant,
    /// Client is not registered for the requested grant
    UnauthorizedClient,
    /// Response type is not supported by the server
    UnsupportedResponseType,
    /// Grant type is not supported by the server
    UnsupportedGrantType,
    /// Requested scope exceeds what the client may receive
    InvalidScope,
    /// Presented access token failed validation
    InvalidToken,
    /// Ephemeral state or record does not exist in this tenant
    NotFound,
    /// Internal failure
    ServerError,
}

impl OAuth2ErrorKind {
    /// Wire code as defined by RFC 6749 / RFC 6750
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidToken => "invalid_token",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
        }
    }

    /// Default human-readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidRequest => "The request is missing a parameter or is otherwise malformed",
            Self::InvalidClient => "Client authentication failed",
            Self::InvalidGrant => "The provided grant is invalid, expired, revoked or already used",
            Self::UnauthorizedClient => "The client is not authorized to use this grant",
            Self::UnsupportedResponseType => "The response type is not supported",
            Self::UnsupportedGrantType => "Grant type not supported",
            Self::InvalidScope => "The requested scope is invalid or exceeds the client's scopes",
            Self::InvalidToken => "The access token is invalid",
            Self::NotFound => "The requested resource was not found",
            Self::ServerError => "The server encountered an internal error",
        }
    }

    /// Severity class
    #[must_use]
    pub const fn severity(self) -> ErrorSeverity {
        match self {
            Self::InvalidRequest
            | Self::InvalidClient
            | Self::UnsupportedResponseType
            | Self::UnsupportedGrantType
            | Self::NotFound => ErrorSeverity::Client,
            Self::InvalidGrant | Self::InvalidToken => ErrorSeverity::Grant,
            Self::UnauthorizedClient | Self::InvalidScope => ErrorSeverity::Authorization,
            Self::ServerError => ErrorSeverity::Infrastructure,
        }
    }

    /// HTTP status code the transport layer should answer with
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnauthorizedClient
            | Self::UnsupportedResponseType
            | Self::UnsupportedGrantType
            | Self::InvalidScope => 400,
            Self::InvalidClient | Self::InvalidToken => 401,
            Self::NotFound => 404,
            Self::ServerError => 500,
        }
    }

    const fn error_uri(self) -> Option<&'static str> {
        match self {
            Self::InvalidRequest
            | Self::UnauthorizedClient
            | Self::UnsupportedResponseType
            | Self::InvalidScope => Some(RFC6749_AUTHORIZE_ERRORS),
            Self::InvalidClient | Self::InvalidGrant | Self::UnsupportedGrantType => {
                Some(RFC6749_TOKEN_ERRORS)
            }
            Self::InvalidToken => Some(RFC6750_TOKEN_ERRORS),
            Self::NotFound | Self::ServerError => None,
        }
    }
}

impl fmt::Display for OAuth2ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured OAuth2 error (kind + description)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {description}")]
pub struct OAuth2Error {
    /// Error code
    pub kind: OAuth2ErrorKind,
    /// Human-readable error description
    pub description: String,
}

impl OAuth2Error {
    /// Create an error of the given kind
    #[must_use]
    pub fn new(kind: OAuth2ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::InvalidRequest, description)
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new(
            OAuth2ErrorKind::InvalidClient,
            OAuth2ErrorKind::InvalidClient.description(),
        )
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::InvalidGrant, description)
    }

    /// Create an `unauthorized_client` error (RFC 6749 Section 4.1.2.1)
    #[must_use]
    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::UnauthorizedClient, description)
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::UnsupportedResponseType, description)
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            OAuth2ErrorKind::UnsupportedGrantType,
            OAuth2ErrorKind::UnsupportedGrantType.description(),
        )
    }

    /// Create an `invalid_scope` error (RFC 6749 Section 4.1.2.1)
    #[must_use]
    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::InvalidScope, description)
    }

    /// Create an `invalid_token` error (RFC 6750 Section 3.1)
    #[must_use]
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::InvalidToken, description)
    }

    /// Create a `not_found` error
    #[must_use]
    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::NotFound, description)
    }

    /// Create a `server_error`
    ///
    /// The description is returned to callers; keep internals out of it.
    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::ServerError, description)
    }

    /// Severity class of this error
    #[must_use]
    pub const fn severity(&self) -> ErrorSeverity {
        self.kind.severity()
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    /// Whether this error has the given kind
    #[must_use]
    pub fn is(&self, kind: OAuth2ErrorKind) -> bool {
        self.kind == kind
    }
}

impl Serialize for OAuth2Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let uri = self.kind.error_uri();
        let mut state =
            serializer.serialize_struct("OAuth2Error", if uri.is_some() { 3 } else { 2 })?;
        state.serialize_field("error", self.kind.as_str())?;
        state.serialize_field("error_description", &self.description)?;
        if let Some(uri) = uri {
            state.serialize_field("error_uri", uri)?;
        }
        state.end()
    }
}

/// Result alias for engine operations
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let err = OAuth2Error::invalid_grant("Authorization code has already been used");
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["error"], "invalid_grant");
        assert_eq!(
            json["error_description"],
            "Authorization code has already been used"
        );
        assert_eq!(json["error_uri"], RFC6749_TOKEN_ERRORS);
    }

    #[test]
    fn test_server_error_has_no_uri() {
        let json = serde_json::to_value(OAuth2Error::server_error("storage unavailable")).unwrap();
        assert_eq!(json["error"], "server_error");
        assert!(json.get("error_uri").is_none());
    }

    #[test]
    fn test_severity_and_status_mapping() {
        assert_eq!(
            OAuth2ErrorKind::InvalidRequest.severity(),
            ErrorSeverity::Client
        );
        assert_eq!(OAuth2ErrorKind::InvalidGrant.severity(), ErrorSeverity::Grant);
        assert_eq!(
            OAuth2ErrorKind::InvalidScope.severity(),
            ErrorSeverity::Authorization
        );
        assert_eq!(
            OAuth2ErrorKind::ServerError.severity(),
            ErrorSeverity::Infrastructure
        );

        assert_eq!(OAuth2ErrorKind::InvalidClient.http_status(), 401);
        assert_eq!(OAuth2ErrorKind::InvalidGrant.http_status(), 400);
        assert_eq!(OAuth2ErrorKind::NotFound.http_status(), 404);
        assert_eq!(OAuth2ErrorKind::ServerError.http_status(), 500);
    }

    #[test]
    fn test_display() {
        let err = OAuth2Error::invalid_request("redirect_uri is not registered");
        assert_eq!(
            err.to_string(),
            "invalid_request: redirect_uri is not registered"
        );
    }
}
