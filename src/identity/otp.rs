// ABOUTME: One-time code identity strategy for users with a phone number on file
// ABOUTME: Codes are delivered through a pluggable sender and stored hashed with expiry and a guess cap
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tollgate_core::constants::crypto::OTP_DIGITS;
use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tollgate_core::models::{OtpAttempt, OtpChallenge, OtpChannel, TenantId};
use tracing::{debug, error, info, warn};

use super::{IdentityVerifier, VerifiedIdentity};
use crate::config::EngineConfig;
use crate::crypto::{generate_numeric_code, sha256_hex};
use crate::database::{OtpRepository, Storage, UserRepository};
use crate::logging::TenantLogger;
use crate::tenant::isolation::OwnedLookup;
use crate::tenant::RequestContext;

const METHOD: &str = "otp";

/// E.164 allows at most 15 digits
const MAX_PHONE_DIGITS: usize = 15;
const MIN_PHONE_DIGITS: usize = 8;

/// Delivers one-time codes to users (SMS gateway, WhatsApp API, ...)
#[async_trait]
pub trait OtpSender: Send + Sync {
    /// Send `code` to `phone` over `channel`
    async fn send(
        &self,
        tenant_id: TenantId,
        phone: &str,
        channel: OtpChannel,
        code: &str,
    ) -> anyhow::Result<()>;
}

/// Phone number and code as submitted on a verification form
#[derive(Debug, Clone)]
pub struct OtpCredentials {
    /// Phone number the code was sent to
    pub phone: String,
    /// Code the user typed
    pub code: String,
}

impl OtpCredentials {
    /// Credentials for `phone` and `code`
    #[must_use]
    pub fn new(phone: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            code: code.into(),
        }
    }
}

/// Issues and checks one-time sign-in codes
#[derive(Clone)]
pub struct OtpVerifier {
    otps: Arc<dyn OtpRepository>,
    users: Arc<dyn UserRepository>,
    sender: Arc<dyn OtpSender>,
    ttl: Duration,
    max_attempts: u32,
}

impl OtpVerifier {
    /// Creates a verifier over the OTP and user stores
    #[must_use]
    pub fn new(storage: &Storage, sender: Arc<dyn OtpSender>, config: &EngineConfig) -> Self {
        Self {
            otps: storage.otps.clone(),
            users: storage.users.clone(),
            sender,
            ttl: config.otp_ttl,
            max_attempts: config.otp_max_attempts,
        }
    }

    /// Send a fresh code to the user owning `phone` in the context's tenant
    ///
    /// Any outstanding code for the number is replaced. A number no user owns
    /// gets the same `Ok(())` without a message, so callers cannot learn which
    /// numbers are registered.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for a malformed number or unknown channel, and
    /// `server_error` if storage or delivery fails
    pub async fn request_code(
        &self,
        ctx: &RequestContext,
        phone: &str,
        channel: Option<&str>,
    ) -> OAuth2Result<()> {
        let phone = normalize_phone(phone)?;
        let channel = match channel.map(str::trim).filter(|c| !c.is_empty()) {
            Some(channel) => channel.parse::<OtpChannel>()?,
            None => OtpChannel::default(),
        };

        let user = ctx
            .storage(
                "user.get_by_phone",
                self.users.get_by_phone(ctx.tenant_id(), &phone),
            )
            .await?
            .owned_by(ctx);
        if user.is_none() {
            debug!(tenant_id = %ctx.tenant_id(), "OTP requested for an unregistered number");
            return Ok(());
        }

        let code = generate_numeric_code(OTP_DIGITS)?;
        let challenge = OtpChallenge {
            tenant_id: ctx.tenant_id(),
            phone: phone.clone(),
            code_hash: sha256_hex(&code),
            channel,
            attempts: 0,
            expires_at: ctx.expires_after(self.ttl)?,
            used_at: None,
            created_at: ctx.now(),
        };
        ctx.storage("otp.put_challenge", self.otps.put_challenge(&challenge))
            .await?;

        self.sender
            .send(ctx.tenant_id(), &phone, channel, &code)
            .await
            .map_err(|e| {
                error!(tenant_id = %ctx.tenant_id(), channel = %channel, "OTP delivery failed: {e:#}");
                OAuth2Error::server_error("Failed to deliver one-time code")
            })?;

        info!(tenant_id = %ctx.tenant_id(), channel = %channel, "One-time code sent");
        Ok(())
    }
}

#[async_trait]
impl IdentityVerifier for OtpVerifier {
    type Credentials = OtpCredentials;

    fn method(&self) -> &'static str {
        METHOD
    }

    async fn verify(
        &self,
        ctx: &RequestContext,
        credentials: &OtpCredentials,
    ) -> OAuth2Result<VerifiedIdentity> {
        let phone = normalize_phone(&credentials.phone)?;
        let code = credentials.code.trim();
        if code.is_empty() {
            return Err(OAuth2Error::invalid_request("code is required"));
        }

        let attempt = ctx
            .storage(
                "otp.attempt_challenge",
                self.otps.attempt_challenge(
                    ctx.tenant_id(),
                    &phone,
                    &sha256_hex(code),
                    self.max_attempts,
                    ctx.now(),
                ),
            )
            .await?;

        let reason = match attempt {
            OtpAttempt::Accepted => None,
            OtpAttempt::Rejected { attempts } => {
                warn!(
                    tenant_id = %ctx.tenant_id(),
                    attempts = attempts,
                    max_attempts = self.max_attempts,
                    "Wrong one-time code"
                );
                Some("wrong code")
            }
            OtpAttempt::Unavailable => Some("no live code"),
        };

        let user = match reason {
            Some(_) => None,
            None => ctx
                .storage(
                    "user.get_by_phone",
                    self.users.get_by_phone(ctx.tenant_id(), &phone),
                )
                .await?
                .owned_by(ctx),
        };

        let Some(user) = user else {
            TenantLogger::log_auth_event(
                None,
                ctx.tenant_id(),
                METHOD,
                false,
                Some(reason.unwrap_or("user no longer holds the number")),
            );
            return Err(OAuth2Error::invalid_grant("Invalid or expired code"));
        };

        TenantLogger::log_auth_event(Some(user.id), ctx.tenant_id(), METHOD, true, None);
        Ok(VerifiedIdentity::new(
            ctx.tenant_id(),
            user.id,
            METHOD,
            ctx.now(),
        ))
    }
}

/// Strip formatting and require `+` followed by 8 to 15 digits
fn normalize_phone(phone: &str) -> OAuth2Result<String> {
    let compact: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or_default();

    if digits.len() < MIN_PHONE_DIGITS
        || digits.len() > MAX_PHONE_DIGITS
        || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return Err(OAuth2Error::invalid_request(
            "phone must be an E.164 number such as +15551234567",
        ));
    }
    Ok(compact)
}
