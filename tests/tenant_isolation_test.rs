// ABOUTME: Integration tests proving records of one tenant are invisible from another
// ABOUTME: Covers clients, authorize handles, codes, tokens, users and verified identities
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{
    authorize_request, code_exchange_request, create_test_engine, issue_via_code_flow,
    obtain_code, refresh_request, register_client, verified_user, T1, T2,
};
use chrono::Utc;
use tollgate::database::TenantRepository;
use tollgate::oauth2_server::{RevocationOutcome, RevocationRequest};
use tollgate_core::errors::OAuth2ErrorKind;
use tollgate_core::models::{Tenant, TenantId};

#[tokio::test]
async fn test_client_of_one_tenant_is_unknown_in_another() {
    let engine = create_test_engine();
    let app = register_client(&engine, T1, "app-1").await;

    let err = engine
        .server
        .clients()
        .get_client_by_id(&engine.ctx(T2), "app-1")
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::NotFound));

    let err = engine
        .server
        .authorize(&engine.ctx(T2), &authorize_request("app-1"))
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidClient));

    let err = engine
        .server
        .clients()
        .authenticate_client(&engine.ctx(T2), "app-1", app.client_secret.as_deref())
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidClient));
}

#[tokio::test]
async fn test_same_client_id_registers_independently_per_tenant() {
    let engine = create_test_engine();
    let t1_app = register_client(&engine, T1, "shared").await;
    let t2_app = register_client(&engine, T2, "shared").await;

    assert_ne!(t1_app.client.id, t2_app.client.id);
    assert_ne!(t1_app.client_secret, t2_app.client_secret);

    // Each tenant's secret only authenticates its own client
    let err = engine
        .server
        .clients()
        .authenticate_client(&engine.ctx(T2), "shared", t1_app.client_secret.as_deref())
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidClient));
}

#[tokio::test]
async fn test_authorize_handle_is_invisible_to_other_tenant() {
    let engine = create_test_engine();
    register_client(&engine, T1, "app-1").await;
    let handle = engine
        .server
        .authorize(&engine.ctx(T1), &authorize_request("app-1"))
        .await
        .unwrap();

    let err = engine
        .server
        .load_state(&engine.ctx(T2), handle.as_str())
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::NotFound));

    let err = engine
        .server
        .abandon(&engine.ctx(T2), handle.as_str())
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::NotFound));

    let t2_identity = verified_user(&engine, T2, "u1@example.com").await;
    let err = engine
        .server
        .continue_with_identity(&engine.ctx(T2), handle.as_str(), &t2_identity)
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::NotFound));

    // The owning tenant can still finish the request
    let t1_identity = verified_user(&engine, T1, "u1@example.com").await;
    engine
        .server
        .continue_with_identity(&engine.ctx(T1), handle.as_str(), &t1_identity)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_identity_verified_in_other_tenant_is_rejected() {
    let engine = create_test_engine();
    register_client(&engine, T1, "app-1").await;
    let handle = engine
        .server
        .authorize(&engine.ctx(T1), &authorize_request("app-1"))
        .await
        .unwrap();

    let foreign = verified_user(&engine, T2, "u1@example.com").await;
    let err = engine
        .server
        .continue_with_identity(&engine.ctx(T1), handle.as_str(), &foreign)
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidRequest));

    // The rejected attempt did not consume the request
    engine
        .server
        .load_state(&engine.ctx(T1), handle.as_str())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_code_of_one_tenant_cannot_be_exchanged_in_another() {
    let engine = create_test_engine();
    let t1_app = register_client(&engine, T1, "shared").await;
    let t2_app = register_client(&engine, T2, "shared").await;
    let identity = verified_user(&engine, T1, "u1@example.com").await;
    let code = obtain_code(&engine, T1, "shared", &identity).await;

    let err = engine
        .server
        .token(&engine.ctx(T2), code_exchange_request(&t2_app, &code))
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));

    engine
        .server
        .token(&engine.ctx(T1), code_exchange_request(&t1_app, &code))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_tokens_of_one_tenant_are_unknown_in_another() {
    let engine = create_test_engine();
    let t1_app = register_client(&engine, T1, "shared").await;
    let t2_app = register_client(&engine, T2, "shared").await;
    let tokens = issue_via_code_flow(&engine, T1, &t1_app, "u1@example.com").await;
    let refresh = tokens.refresh_token.clone().unwrap();

    let err = engine
        .server
        .token(&engine.ctx(T2), refresh_request(&t2_app, &refresh))
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidGrant));

    for token in [&tokens.access_token, &refresh] {
        let outcome = engine
            .server
            .revoke(
                &engine.ctx(T2),
                &RevocationRequest {
                    token: token.clone(),
                    token_type_hint: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, RevocationOutcome::Unknown);
    }

    // Nothing above touched the tenant that owns the tokens
    engine
        .server
        .validate(&engine.ctx(T1), &tokens.access_token)
        .await
        .unwrap();
    engine
        .server
        .token(&engine.ctx(T1), refresh_request(&t1_app, &refresh))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_same_email_is_a_different_user_per_tenant() {
    let engine = create_test_engine();
    let in_t1 = verified_user(&engine, T1, "u1@example.com").await;
    let in_t2 = verified_user(&engine, T2, "u1@example.com").await;

    assert_ne!(in_t1.user_id, in_t2.user_id);
    assert_eq!(in_t1.tenant_id, T1);
    assert_eq!(in_t2.tenant_id, T2);
}

fn tenant(id: TenantId, slug: &str, domain: &str) -> Tenant {
    Tenant {
        domains: vec![domain.to_owned()],
        ..Tenant::new(id, format!("Tenant {slug}"), slug.to_owned(), Utc::now())
    }
}

#[tokio::test]
async fn test_tenant_resolution_by_host_and_slug() {
    let engine = create_test_engine();
    let tenants: &dyn TenantRepository = &*engine.store;
    tenants.create(&tenant(T1, "acme", "auth.acme.example")).await.unwrap();
    tenants.create(&tenant(T2, "globex", "auth.globex.example")).await.unwrap();

    let resolved = tenants.resolve_by_host("auth.acme.example").await.unwrap();
    assert_eq!(resolved.map(|t| t.id), Some(T1));
    let resolved = tenants.resolve_by_host(" AUTH.Globex.example ").await.unwrap();
    assert_eq!(resolved.map(|t| t.id), Some(T2));
    assert!(tenants.resolve_by_host("auth.initech.example").await.unwrap().is_none());

    assert_eq!(tenants.get_by_slug("globex").await.unwrap().map(|t| t.id), Some(T2));
    assert!(tenants.get_by_slug("initech").await.unwrap().is_none());

    let err = tenants
        .create(&tenant(TenantId::new(3), "acme", "other.example"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_resolved_tenant_sees_only_its_own_clients() {
    let engine = create_test_engine();
    let tenants: &dyn TenantRepository = &*engine.store;
    tenants.create(&tenant(T1, "acme", "auth.acme.example")).await.unwrap();
    tenants.create(&tenant(T2, "globex", "auth.globex.example")).await.unwrap();
    register_client(&engine, T1, "acme-app").await;

    let globex = tenants.get_by_slug("globex").await.unwrap().unwrap();
    let err = engine
        .server
        .clients()
        .get_client_by_id(&engine.ctx(globex.id), "acme-app")
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::NotFound));

    let acme = tenants
        .resolve_by_host("auth.acme.example")
        .await
        .unwrap()
        .unwrap();
    engine
        .server
        .clients()
        .get_client_by_id(&engine.ctx(acme.id), "acme-app")
        .await
        .unwrap();
}
