// ABOUTME: OAuth2 protocol identifiers and client registration defaults
// ABOUTME: Grant types, response types, auth methods, token type and default scopes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// The only supported authorize `response_type`
pub const RESPONSE_TYPE_CODE: &str = "code";

/// `grant_type` for the authorization code grant
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
/// `grant_type` for the refresh token grant
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Token endpoint authentication via form-encoded secret
pub const AUTH_METHOD_CLIENT_SECRET_POST: &str = "client_secret_post";
/// Token endpoint authentication via HTTP Basic
pub const AUTH_METHOD_CLIENT_SECRET_BASIC: &str = "client_secret_basic";
/// Public client, no secret
pub const AUTH_METHOD_NONE: &str = "none";

/// Token type returned in token responses
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// JWS algorithm used for access tokens
pub const SIGNING_ALGORITHM: &str = "RS256";

/// Scopes granted to clients registered without an explicit list
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email"];
/// Grants allowed for clients registered without an explicit list
pub const DEFAULT_GRANTS: &[&str] = &[GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN];
/// Auth methods allowed for clients registered without an explicit list
pub const DEFAULT_AUTH_METHODS: &[&str] = &[AUTH_METHOD_CLIENT_SECRET_POST];

/// Path of the authorize endpoint, used to rebuild resume URLs
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";
