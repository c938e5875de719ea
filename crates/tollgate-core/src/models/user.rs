// ABOUTME: Tenant-scoped user identity model
// ABOUTME: UserId newtype and User with credential material and verified contact channels
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TenantId;

/// Type-safe wrapper for user identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Get the inner value
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// End user belonging to exactly one tenant
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: UserId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Login email, lowercased
    pub email: String,
    /// Argon2 PHC string; `None` for users who only sign in with OTP
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// When the email address was verified
    pub email_verified_at: Option<DateTime<Utc>>,
    /// Phone number in E.164 form
    pub phone: Option<String>,
    /// When the phone number was verified
    pub phone_verified_at: Option<DateTime<Utc>>,
    /// When the user was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the email channel has been verified
    #[must_use]
    pub const fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Whether the phone channel has been verified
    #[must_use]
    pub const fn is_phone_verified(&self) -> bool {
        self.phone_verified_at.is_some()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("email_verified_at", &self.email_verified_at)
            .field("phone", &self.phone)
            .field("phone_verified_at", &self.phone_verified_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}
