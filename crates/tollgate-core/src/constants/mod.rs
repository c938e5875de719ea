// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for OAuth2 protocol defaults, token lifetimes and key sizes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped by domain rather than kept in a single large file.

/// OAuth2 protocol identifiers and client registration defaults
pub mod oauth;

/// Token and ephemeral state lifetimes
pub mod lifetimes {
    /// Access token lifetime in seconds (1 hour)
    pub const ACCESS_TOKEN_TTL_SECS: u64 = 3600;
    /// Refresh token lifetime in seconds (30 days)
    pub const REFRESH_TOKEN_TTL_SECS: u64 = 30 * 24 * 3600;
    /// Authorization code lifetime in seconds (10 minutes)
    pub const AUTHORIZATION_CODE_TTL_SECS: u64 = 600;
    /// Upper bound accepted for the authorization code lifetime
    pub const MAX_AUTHORIZATION_CODE_TTL_SECS: u64 = 600;
    /// Authorize-state lifetime in seconds (10 minutes)
    pub const AUTHORIZE_STATE_TTL_SECS: u64 = 600;
    /// Default per-operation storage deadline in milliseconds
    pub const STORAGE_TIMEOUT_MS: u64 = 5000;
    /// One-time code lifetime in seconds (5 minutes)
    pub const OTP_TTL_SECS: u64 = 300;
}

/// Cryptographic sizing
pub mod crypto {
    /// Random bytes in an opaque refresh token
    pub const REFRESH_TOKEN_BYTES: usize = 32;
    /// Minimum accepted refresh token entropy in bytes
    pub const MIN_REFRESH_TOKEN_BYTES: usize = 32;
    /// Random bytes in an authorization code
    pub const AUTHORIZATION_CODE_BYTES: usize = 32;
    /// Random bytes in an authorize-state handle
    pub const AUTHORIZE_HANDLE_BYTES: usize = 24;
    /// Random bytes in a generated client secret
    pub const CLIENT_SECRET_BYTES: usize = 32;
    /// Random bytes in a signing key identifier
    pub const KID_BYTES: usize = 12;
    /// RSA modulus size for production signing keys
    pub const RSA_KEY_SIZE_BITS: usize = 4096;
    /// Smallest RSA modulus accepted
    pub const MIN_RSA_KEY_SIZE_BITS: usize = 2048;
    /// Days a signing key stays active before rotation is due
    pub const KEY_ROTATION_DAYS: i64 = 90;
    /// Digits in a one-time code
    pub const OTP_DIGITS: usize = 6;
    /// Wrong guesses tolerated before a one-time code is burned
    pub const OTP_MAX_ATTEMPTS: u32 = 5;
}

/// Service identity
pub mod service {
    /// Default service name used in logs
    pub const SERVICE_NAME: &str = "tollgate";
    /// Default issuer when none is configured
    pub const DEFAULT_ISSUER: &str = "http://localhost:8080";
}
