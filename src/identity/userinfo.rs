// ABOUTME: OIDC userinfo lookup for the subject of a validated access token
// ABOUTME: Claims are filtered by the token's granted scopes and read only from the token's tenant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use serde::Serialize;
use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tollgate_core::models::UserId;
use tracing::debug;

use crate::database::UserRepository;
use crate::oauth2_server::tokens::AccessTokenClaims;
use crate::tenant::isolation::OwnedLookup;
use crate::tenant::RequestContext;

/// OIDC Core Section 5.3.2 userinfo response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    /// Subject identifier, the user ID
    pub sub: String,
    /// Email address, with the `email` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether the email was verified, with the `email` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// Phone number, with the `phone` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Whether the phone number was verified, with the `phone` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_verified: Option<bool>,
}

/// Resolves the user behind an access token
#[derive(Clone)]
pub struct UserInfoLookup {
    users: Arc<dyn UserRepository>,
}

impl UserInfoLookup {
    /// Creates a lookup over the user store
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Userinfo for the subject of already-validated `claims`
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` for client-only tokens or subjects that are not
    /// users of the context's tenant, and `server_error` if storage fails
    pub async fn lookup(
        &self,
        ctx: &RequestContext,
        claims: &AccessTokenClaims,
    ) -> OAuth2Result<UserInfo> {
        let user_id = claims.sub.parse::<UserId>().map_err(|_| {
            debug!(tenant_id = %ctx.tenant_id(), client_id = %claims.client_id, "Userinfo requested with a client-only token");
            OAuth2Error::invalid_token("Access token has no user subject")
        })?;

        let user = ctx
            .storage(
                "user.get_by_id",
                self.users.get_by_id(ctx.tenant_id(), user_id),
            )
            .await?
            .owned_by(ctx)
            .ok_or_else(|| OAuth2Error::invalid_token("Unknown subject"))?;

        let scopes = claims.scopes();
        let granted = |scope: &str| scopes.iter().any(|s| s == scope);

        let (email, email_verified) = if granted("email") {
            (Some(user.email.clone()), Some(user.is_email_verified()))
        } else {
            (None, None)
        };
        let (phone_number, phone_number_verified) = match &user.phone {
            Some(phone) if granted("phone") => {
                (Some(phone.clone()), Some(user.is_phone_verified()))
            }
            _ => (None, None),
        };

        Ok(UserInfo {
            sub: user.id.to_string(),
            email,
            email_verified,
            phone_number,
            phone_number_verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tollgate_core::errors::OAuth2ErrorKind;
    use tollgate_core::models::{TenantId, User};

    use super::*;
    use crate::database::InMemoryStore;

    const T1: TenantId = TenantId::new(1);
    const T2: TenantId = TenantId::new(2);

    fn claims(sub: &str, scope: &str) -> AccessTokenClaims {
        AccessTokenClaims {
            tenant: T1,
            sub: sub.to_owned(),
            client_id: "client-1".to_owned(),
            scope: scope.to_owned(),
            iss: "https://auth.example.com".to_owned(),
            iat: 0,
            exp: 0,
            jti: "jti-1".to_owned(),
        }
    }

    async fn lookup_with_user() -> UserInfoLookup {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let user = User {
            id: UserId(42),
            tenant_id: T1,
            email: "ada@example.com".to_owned(),
            password_hash: None,
            email_verified_at: Some(now),
            phone: Some("+15550001111".to_owned()),
            phone_verified_at: None,
            created_at: now,
        };
        UserRepository::create(&*store, &user).await.unwrap();
        UserInfoLookup::new(store)
    }

    fn ctx(tenant: TenantId) -> RequestContext {
        RequestContext::new(tenant, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_claims_follow_granted_scopes() {
        let lookup = lookup_with_user().await;

        let bare = lookup.lookup(&ctx(T1), &claims("42", "openid")).await.unwrap();
        assert_eq!(bare.sub, "42");
        assert!(bare.email.is_none() && bare.phone_number.is_none());
        let json = serde_json::to_value(&bare).unwrap();
        assert_eq!(json, serde_json::json!({ "sub": "42" }));

        let full = lookup
            .lookup(&ctx(T1), &claims("42", "openid email phone"))
            .await
            .unwrap();
        assert_eq!(full.email.as_deref(), Some("ada@example.com"));
        assert_eq!(full.email_verified, Some(true));
        assert_eq!(full.phone_number.as_deref(), Some("+15550001111"));
        assert_eq!(full.phone_number_verified, Some(false));
    }

    #[tokio::test]
    async fn test_subject_outside_tenant_is_invalid_token() {
        let lookup = lookup_with_user().await;

        let err = lookup
            .lookup(&ctx(T2), &claims("42", "openid"))
            .await
            .unwrap_err();
        assert!(err.is(OAuth2ErrorKind::InvalidToken));

        let err = lookup
            .lookup(&ctx(T1), &claims("99", "openid"))
            .await
            .unwrap_err();
        assert!(err.is(OAuth2ErrorKind::InvalidToken));
    }

    #[tokio::test]
    async fn test_client_only_subject_is_invalid_token() {
        let lookup = lookup_with_user().await;

        let err = lookup
            .lookup(&ctx(T1), &claims("client-1", ""))
            .await
            .unwrap_err();
        assert!(err.is(OAuth2ErrorKind::InvalidToken));
    }
}
