// ABOUTME: One-time sign-in code records for phone-based identity verification
// ABOUTME: Codes are stored as SHA-256 digests with an expiry, a guess counter and single-use marker
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TenantId;
use crate::errors::OAuth2Error;

/// How a one-time code reaches the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    /// Text message
    #[default]
    Sms,
    /// WhatsApp message
    Whatsapp,
}

impl OtpChannel {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
        }
    }
}

impl FromStr for OtpChannel {
    type Err = OAuth2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(Self::Sms),
            "whatsapp" => Ok(Self::Whatsapp),
            other => Err(OAuth2Error::invalid_request(format!(
                "Unsupported OTP channel: {other}"
            ))),
        }
    }
}

impl fmt::Display for OtpChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outstanding one-time code for a phone number in a tenant
///
/// At most one challenge exists per `(tenant_id, phone)`; requesting a new
/// code replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Phone number in E.164 form
    pub phone: String,
    /// SHA-256 digest of the code
    pub code_hash: String,
    /// Delivery channel
    pub channel: OtpChannel,
    /// Wrong guesses so far
    pub attempts: u32,
    /// When the code expires
    pub expires_at: DateTime<Utc>,
    /// When the code was accepted
    pub used_at: Option<DateTime<Utc>>,
    /// When the code was issued
    pub created_at: DateTime<Utc>,
}

impl OtpChallenge {
    /// Expiry is exclusive
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the code has already been accepted
    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Result of checking one guess against an outstanding challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpAttempt {
    /// The code matched and the challenge is now used
    Accepted,
    /// The code did not match; `attempts` wrong guesses so far
    Rejected {
        /// Wrong guesses recorded, including this one
        attempts: u32,
    },
    /// No live challenge: none issued, expired, used or out of guesses
    Unavailable,
}
