// ABOUTME: Request context carrying tenant, operation timestamp and storage deadline
// ABOUTME: Wraps every storage call in a deadline and maps failures to server_error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::{timeout_at, Instant};
use tollgate_core::errors::{DatabaseResult, OAuth2Error, OAuth2Result};
use tollgate_core::models::TenantId;
use tracing::error;

/// Context for one engine operation
///
/// The timestamp is captured once when the context is built; every expiry
/// comparison made while serving the operation uses it, so two reads in the
/// same operation can never straddle an expiry boundary.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    tenant_id: TenantId,
    now: DateTime<Utc>,
    deadline: Instant,
}

impl RequestContext {
    /// Context for `tenant_id` whose storage calls must finish within `timeout`
    #[must_use]
    pub fn new(tenant_id: TenantId, timeout: Duration) -> Self {
        Self {
            tenant_id,
            now: Utc::now(),
            deadline: Instant::now() + timeout,
        }
    }

    /// Replace the operation timestamp
    #[must_use]
    pub const fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Inherit a deadline from the caller
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = deadline;
        self
    }

    /// Push the deadline back by `spent`, for work that must not count
    /// against the storage budget
    #[must_use]
    pub fn extended_by(mut self, spent: Duration) -> Self {
        self.deadline += spent;
        self
    }

    /// Tenant the operation is scoped to
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Operation timestamp
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Storage deadline
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The operation timestamp advanced by `ttl`
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the result is not representable
    pub fn expires_after(&self, ttl: Duration) -> OAuth2Result<DateTime<Utc>> {
        ChronoDuration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.now.checked_add_signed(ttl))
            .ok_or_else(|| OAuth2Error::server_error("Lifetime out of range"))
    }

    /// Run a storage call under the operation deadline
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the deadline passes or the store fails; the
    /// underlying cause is logged, not returned
    pub async fn storage<F, T>(&self, operation: &'static str, call: F) -> OAuth2Result<T>
    where
        F: Future<Output = DatabaseResult<T>>,
    {
        match timeout_at(self.deadline, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(
                    tenant_id = %self.tenant_id,
                    operation = operation,
                    error = %e,
                    "Storage operation failed"
                );
                Err(OAuth2Error::server_error("Storage operation failed"))
            }
            Err(_) => {
                error!(
                    tenant_id = %self.tenant_id,
                    operation = operation,
                    "Storage operation exceeded its deadline"
                );
                Err(OAuth2Error::server_error("Storage operation timed out"))
            }
        }
    }

    /// Run a storage call under the operation deadline, handing the store's
    /// own result back so callers can react to conflicts
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the deadline passes
    pub async fn within_deadline<F, T>(
        &self,
        operation: &'static str,
        call: F,
    ) -> OAuth2Result<DatabaseResult<T>>
    where
        F: Future<Output = DatabaseResult<T>>,
    {
        timeout_at(self.deadline, call).await.map_err(|_| {
            error!(
                tenant_id = %self.tenant_id,
                operation = operation,
                "Storage operation exceeded its deadline"
            );
            OAuth2Error::server_error("Storage operation timed out")
        })
    }
}
