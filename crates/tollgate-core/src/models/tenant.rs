// ABOUTME: Multi-tenant organization models
// ABOUTME: TenantId newtype, Tenant, and its status and type enums
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type-safe wrapper for tenant identifiers
///
/// Provides compile-time distinction between tenant IDs and the other 64-bit
/// identifiers allocated by the ID generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl TenantId {
    /// Wrap a raw identifier
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TenantId> for i64 {
    fn from(tenant_id: TenantId) -> Self {
        tenant_id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Lifecycle status of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    /// Tenant may authenticate users and issue tokens
    Active,
    /// Tenant is disabled
    Suspended,
}

/// Kind of tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantType {
    /// Multi-member organization
    Organization,
    /// Single-user workspace
    Personal,
}

/// Tenant organization; the isolation boundary for every other entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: TenantId,
    /// Display name
    pub name: String,
    /// URL-safe slug, unique across tenants
    pub slug: String,
    /// Lifecycle status
    pub status: TenantStatus,
    /// Kind of tenant
    pub tenant_type: TenantType,
    /// Hostnames routed to this tenant
    pub domains: Vec<String>,
    /// When tenant was created
    pub created_at: DateTime<Utc>,
    /// When tenant was last updated
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Creates an active organization tenant
    #[must_use]
    pub fn new(id: TenantId, name: String, slug: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            slug,
            status: TenantStatus::Active,
            tenant_type: TenantType::Organization,
            domains: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the tenant may serve requests
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_parse_and_display() {
        let id: TenantId = " 42 ".parse().unwrap();
        assert_eq!(id, TenantId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<TenantId>().is_err());
    }

    #[test]
    fn test_tenant_status_wire_format() {
        let json = serde_json::to_string(&TenantStatus::Active).unwrap();
        assert_eq!(json, "\"ACTIVE\"");
    }
}
