// ABOUTME: Post-fetch tenant ownership verification for every tenant-scoped record
// ABOUTME: Records from another tenant are discarded as if they did not exist
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::any::type_name;

use tollgate_core::models::{
    AuthorizationCode, AuthorizeState, OAuthClient, OAuthToken, SigningKey, TenantId, User,
};

use super::RequestContext;
use crate::logging::TenantLogger;

/// A record that belongs to exactly one tenant
pub trait TenantOwned {
    /// Tenant owning the record
    fn owner(&self) -> TenantId;

    /// Keep the record only if it belongs to the context's tenant
    ///
    /// A mismatch is logged as a security event and reported as absence.
    fn owned_by(self, ctx: &RequestContext) -> Option<Self>
    where
        Self: Sized,
    {
        if self.owner() == ctx.tenant_id() {
            Some(self)
        } else {
            TenantLogger::log_security_event(
                ctx.tenant_id(),
                None,
                "cross_tenant_lookup",
                "high",
                &format!(
                    "{} owned by tenant {} returned for another tenant",
                    type_name::<Self>(),
                    self.owner()
                ),
            );
            None
        }
    }
}

macro_rules! impl_tenant_owned {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TenantOwned for $ty {
                fn owner(&self) -> TenantId {
                    self.tenant_id
                }
            }
        )+
    };
}

impl_tenant_owned!(
    AuthorizationCode,
    AuthorizeState,
    OAuthClient,
    OAuthToken,
    SigningKey,
    User,
);

/// Extension for optional lookups
pub trait OwnedLookup<T> {
    /// Drop a fetched record that belongs to another tenant
    fn owned_by(self, ctx: &RequestContext) -> Option<T>;
}

impl<T: TenantOwned> OwnedLookup<T> for Option<T> {
    fn owned_by(self, ctx: &RequestContext) -> Option<T> {
        self.and_then(|record| record.owned_by(ctx))
    }
}
