// ABOUTME: Per-tenant signing key record with rotation history fields
// ABOUTME: Private key material is redacted from Debug output and never serialized
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TenantId;

/// Signing key used for access tokens of one tenant
///
/// Exactly one key per tenant is active at a time. Rotated keys stay in the
/// store with `active == false` so tokens they signed keep verifying.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Internal identifier
    pub id: i64,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Key identifier placed in the JWT header
    pub kid: String,
    /// JWS algorithm
    pub algorithm: String,
    /// PKCS#8 PEM private key
    #[serde(skip_serializing)]
    pub private_key_pem: String,
    /// SPKI PEM public key
    pub public_key_pem: String,
    /// Whether this key signs new tokens
    pub active: bool,
    /// When the key was generated
    pub created_at: DateTime<Utc>,
    /// When the key was replaced as the active key
    pub rotated_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("private_key_pem", &"<redacted>")
            .field("active", &self.active)
            .field("created_at", &self.created_at)
            .field("rotated_at", &self.rotated_at)
            .finish()
    }
}
