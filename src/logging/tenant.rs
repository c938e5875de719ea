// ABOUTME: Tenant-aware logging utilities for structured protocol and security events
// ABOUTME: Every event carries tenant, client and event_type fields for filtering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use tollgate_core::models::{TenantId, UserId};
use tracing::{info, warn, Span};

/// Tenant-aware logging utilities
pub struct TenantLogger;

impl TenantLogger {
    /// Log a newly issued token pair
    pub fn log_token_issued(
        tenant_id: TenantId,
        client_id: &str,
        user_id: Option<UserId>,
        kid: &str,
        with_refresh: bool,
    ) {
        info!(
            tenant_id = %tenant_id,
            client_id = %client_id,
            user_id = ?user_id,
            kid = %kid,
            with_refresh = %with_refresh,
            event_type = "token_issued",
            "Token pair issued"
        );
    }

    /// Log a successful refresh token rotation
    pub fn log_token_rotated(tenant_id: TenantId, client_id: &str, lineage_id: i64) {
        info!(
            tenant_id = %tenant_id,
            client_id = %client_id,
            lineage_id = %lineage_id,
            event_type = "token_rotated",
            "Refresh token rotated"
        );
    }

    /// Log a revocation request and how many records it touched
    pub fn log_token_revoked(tenant_id: TenantId, lineage_id: i64, records: u64) {
        info!(
            tenant_id = %tenant_id,
            lineage_id = %lineage_id,
            records = %records,
            event_type = "token_revoked",
            "Token revoked"
        );
    }

    /// Log an authorization code exchange
    pub fn log_code_exchanged(tenant_id: TenantId, client_id: &str, user_id: UserId) {
        info!(
            tenant_id = %tenant_id,
            client_id = %client_id,
            user_id = %user_id,
            event_type = "code_exchanged",
            "Authorization code exchanged"
        );
    }

    /// Log a signing key rotation
    pub fn log_key_rotated(tenant_id: TenantId, new_kid: &str, previous_kid: Option<&str>) {
        info!(
            tenant_id = %tenant_id,
            new_kid = %new_kid,
            previous_kid = ?previous_kid,
            event_type = "key_rotated",
            "Signing key rotated"
        );
    }

    /// Log authentication event with tenant context
    pub fn log_auth_event(
        user_id: Option<UserId>,
        tenant_id: TenantId,
        auth_method: &str,
        success: bool,
        error_details: Option<&str>,
    ) {
        if success {
            info!(
                user_id = ?user_id,
                tenant_id = %tenant_id,
                auth_method = %auth_method,
                success = %success,
                event_type = "authentication",
                "Authentication successful"
            );
        } else {
            warn!(
                user_id = ?user_id,
                tenant_id = %tenant_id,
                auth_method = %auth_method,
                success = %success,
                error_details = ?error_details,
                event_type = "authentication",
                "Authentication failed"
            );
        }
    }

    /// Log security event with tenant context
    pub fn log_security_event(
        tenant_id: TenantId,
        client_id: Option<&str>,
        event_type: &str,
        severity: &str,
        details: &str,
    ) {
        warn!(
            tenant_id = %tenant_id,
            client_id = ?client_id,
            security_event = %event_type,
            security_severity = %severity,
            security_details = %details,
            event_type = "security_event",
            "Security event detected"
        );
    }
}

/// Record tenant context in current span
pub fn record_tenant_context(tenant_id: TenantId, client_id: &str) {
    let span = Span::current();
    span.record("tenant_id", tenant_id.to_string())
        .record("client_id", client_id);
}
