// ABOUTME: Environment-based configuration for token lifetimes, key sizes and storage deadlines
// ABOUTME: Parses and validates engine settings and default-tenant bootstrap settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tollgate_core::constants::crypto::{
    KEY_ROTATION_DAYS, MIN_REFRESH_TOKEN_BYTES, MIN_RSA_KEY_SIZE_BITS, OTP_MAX_ATTEMPTS,
    REFRESH_TOKEN_BYTES, RSA_KEY_SIZE_BITS,
};
use tollgate_core::constants::lifetimes::{
    ACCESS_TOKEN_TTL_SECS, AUTHORIZATION_CODE_TTL_SECS, AUTHORIZE_STATE_TTL_SECS,
    MAX_AUTHORIZATION_CODE_TTL_SECS, OTP_TTL_SECS, REFRESH_TOKEN_TTL_SECS, STORAGE_TIMEOUT_MS,
};
use tollgate_core::constants::service::DEFAULT_ISSUER;
use tollgate_core::models::TenantId;
use tracing::info;

/// Settings consumed by the protocol engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Issuer placed in and required of every access token
    pub issuer: String,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
    /// Authorization code lifetime, at most ten minutes
    pub authorization_code_ttl: Duration,
    /// Lifetime of an in-flight authorize request
    pub authorize_state_ttl: Duration,
    /// Entropy of opaque refresh tokens in bytes
    pub refresh_token_bytes: usize,
    /// Deadline applied to each storage call when the caller sets none
    pub storage_timeout: Duration,
    /// RSA modulus size for new signing keys
    pub signing_key_bits: usize,
    /// Age after which the active signing key is due for rotation
    pub key_rotation_days: i64,
    /// Require PKCE from every client, not only public ones
    pub require_pkce: bool,
    /// Lifetime of a one-time sign-in code
    pub otp_ttl: Duration,
    /// Wrong guesses tolerated per one-time code
    pub otp_max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_owned(),
            access_token_ttl: Duration::from_secs(ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::from_secs(REFRESH_TOKEN_TTL_SECS),
            authorization_code_ttl: Duration::from_secs(AUTHORIZATION_CODE_TTL_SECS),
            authorize_state_ttl: Duration::from_secs(AUTHORIZE_STATE_TTL_SECS),
            refresh_token_bytes: REFRESH_TOKEN_BYTES,
            storage_timeout: Duration::from_millis(STORAGE_TIMEOUT_MS),
            signing_key_bits: RSA_KEY_SIZE_BITS,
            key_rotation_days: KEY_ROTATION_DAYS,
            require_pkce: false,
            otp_ttl: Duration::from_secs(OTP_TTL_SECS),
            otp_max_attempts: OTP_MAX_ATTEMPTS,
        }
    }
}

impl EngineConfig {
    /// Load engine configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the resulting
    /// configuration fails validation
    pub fn from_env() -> Result<Self> {
        info!("Loading engine configuration from environment variables");
        let defaults = Self::default();

        let config = Self {
            issuer: env_var_or("TOLLGATE_ISSUER", &defaults.issuer),
            access_token_ttl: Duration::from_secs(
                env_var_or("ACCESS_TOKEN_TTL_SECS", &ACCESS_TOKEN_TTL_SECS.to_string())
                    .parse()
                    .context("Invalid ACCESS_TOKEN_TTL_SECS value")?,
            ),
            refresh_token_ttl: Duration::from_secs(
                env_var_or("REFRESH_TOKEN_TTL_SECS", &REFRESH_TOKEN_TTL_SECS.to_string())
                    .parse()
                    .context("Invalid REFRESH_TOKEN_TTL_SECS value")?,
            ),
            authorization_code_ttl: Duration::from_secs(
                env_var_or(
                    "AUTHORIZATION_CODE_TTL_SECS",
                    &AUTHORIZATION_CODE_TTL_SECS.to_string(),
                )
                .parse()
                .context("Invalid AUTHORIZATION_CODE_TTL_SECS value")?,
            ),
            authorize_state_ttl: Duration::from_secs(
                env_var_or(
                    "AUTHORIZE_STATE_TTL_SECS",
                    &AUTHORIZE_STATE_TTL_SECS.to_string(),
                )
                .parse()
                .context("Invalid AUTHORIZE_STATE_TTL_SECS value")?,
            ),
            refresh_token_bytes: env_var_or("REFRESH_TOKEN_BYTES", &REFRESH_TOKEN_BYTES.to_string())
                .parse()
                .context("Invalid REFRESH_TOKEN_BYTES value")?,
            storage_timeout: Duration::from_millis(
                env_var_or("STORAGE_TIMEOUT_MS", &STORAGE_TIMEOUT_MS.to_string())
                    .parse()
                    .context("Invalid STORAGE_TIMEOUT_MS value")?,
            ),
            signing_key_bits: env_var_or("SIGNING_KEY_BITS", &RSA_KEY_SIZE_BITS.to_string())
                .parse()
                .context("Invalid SIGNING_KEY_BITS value")?,
            key_rotation_days: env_var_or("KEY_ROTATION_DAYS", &KEY_ROTATION_DAYS.to_string())
                .parse()
                .context("Invalid KEY_ROTATION_DAYS value")?,
            require_pkce: env_var_or("REQUIRE_PKCE", "false")
                .parse()
                .context("Invalid REQUIRE_PKCE value")?,
            otp_ttl: Duration::from_secs(
                env_var_or("OTP_TTL_SECS", &OTP_TTL_SECS.to_string())
                    .parse()
                    .context("Invalid OTP_TTL_SECS value")?,
            ),
            otp_max_attempts: env_var_or("OTP_MAX_ATTEMPTS", &OTP_MAX_ATTEMPTS.to_string())
                .parse()
                .context("Invalid OTP_MAX_ATTEMPTS value")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot run with
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            bail!("TOLLGATE_ISSUER must not be empty");
        }
        if self.access_token_ttl.is_zero() {
            bail!("ACCESS_TOKEN_TTL_SECS must be greater than zero");
        }
        if self.refresh_token_ttl <= self.access_token_ttl {
            bail!("REFRESH_TOKEN_TTL_SECS must exceed ACCESS_TOKEN_TTL_SECS");
        }
        if self.authorization_code_ttl.is_zero()
            || self.authorization_code_ttl.as_secs() > MAX_AUTHORIZATION_CODE_TTL_SECS
        {
            bail!(
                "AUTHORIZATION_CODE_TTL_SECS must be between 1 and {MAX_AUTHORIZATION_CODE_TTL_SECS}"
            );
        }
        if self.authorize_state_ttl.is_zero() {
            bail!("AUTHORIZE_STATE_TTL_SECS must be greater than zero");
        }
        if self.refresh_token_bytes < MIN_REFRESH_TOKEN_BYTES {
            bail!("REFRESH_TOKEN_BYTES must be at least {MIN_REFRESH_TOKEN_BYTES}");
        }
        if self.storage_timeout.is_zero() {
            bail!("STORAGE_TIMEOUT_MS must be greater than zero");
        }
        if self.signing_key_bits < MIN_RSA_KEY_SIZE_BITS {
            bail!("SIGNING_KEY_BITS must be at least {MIN_RSA_KEY_SIZE_BITS}");
        }
        if self.key_rotation_days <= 0 {
            bail!("KEY_ROTATION_DAYS must be greater than zero");
        }
        if self.otp_ttl.is_zero() {
            bail!("OTP_TTL_SECS must be greater than zero");
        }
        if self.otp_max_attempts == 0 {
            bail!("OTP_MAX_ATTEMPTS must be greater than zero");
        }
        Ok(())
    }
}

/// Settings for the one-shot default-tenant seeding routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Tenant that must exist; when unset a tenant is seeded only into an empty store
    pub default_tenant_id: Option<TenantId>,
    /// Slug of the seeded tenant; derived from the ID when unset
    pub default_tenant_slug: Option<String>,
    /// Display name of the seeded tenant
    pub default_tenant_name: String,
    /// Node number for the ID generator
    pub id_generator_node: u16,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            default_tenant_id: None,
            default_tenant_slug: None,
            default_tenant_name: "Default".to_owned(),
            id_generator_node: 0,
        }
    }
}

impl BootstrapConfig {
    /// Load bootstrap configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed
    pub fn from_env() -> Result<Self> {
        let default_tenant_id = match env::var("DEFAULT_TENANT_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.parse::<TenantId>()
                    .context("Invalid DEFAULT_TENANT_ID value")?,
            ),
            _ => None,
        };

        Ok(Self {
            default_tenant_id,
            default_tenant_slug: env::var("DEFAULT_TENANT_SLUG")
                .ok()
                .filter(|slug| !slug.trim().is_empty()),
            default_tenant_name: env_var_or("DEFAULT_TENANT_NAME", "Default"),
            id_generator_node: env_var_or("ID_GENERATOR_NODE", "0")
                .parse()
                .context("Invalid ID_GENERATOR_NODE value")?,
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
