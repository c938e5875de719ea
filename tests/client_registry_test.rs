// ABOUTME: Integration tests for OAuth client registration, defaults and token endpoint authentication
// ABOUTME: Checks secret generation, validation errors and upsert semantics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::Duration as ChronoDuration;
use common::{create_test_engine, register_client, register_public_client, REDIRECT_URI, T1};
use tollgate::oauth2_server::ClientRegistrationRequest;
use tollgate_core::errors::OAuth2ErrorKind;
use tollgate_core::models::{GrantType, TokenEndpointAuthMethod};

fn request(client_id: &str) -> ClientRegistrationRequest {
    ClientRegistrationRequest {
        client_id: client_id.to_owned(),
        redirect_uris: vec![REDIRECT_URI.to_owned()],
        ..ClientRegistrationRequest::default()
    }
}

#[tokio::test]
async fn test_registration_applies_defaults_and_generates_secret() {
    let engine = create_test_engine();
    let registration = register_client(&engine, T1, "app-1").await;
    let client = &registration.client;

    assert_eq!(client.tenant_id, T1);
    assert_eq!(
        client.grants,
        vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
    );
    assert_eq!(client.scopes, vec!["openid", "profile", "email"]);
    assert_eq!(
        client.token_endpoint_auth_methods,
        vec![TokenEndpointAuthMethod::ClientSecretPost]
    );
    assert!(!client.is_public());

    let secret = registration.client_secret.as_deref().unwrap();
    assert!(secret.len() >= 43);
    assert_ne!(client.client_secret_hash, secret);

    let json = serde_json::to_value(client).unwrap();
    assert!(json.get("client_secret_hash").is_none());
}

#[tokio::test]
async fn test_generated_secret_authenticates_client() {
    let engine = create_test_engine();
    let registration = register_client(&engine, T1, "app-1").await;
    let ctx = engine.ctx(T1);
    let clients = engine.server.clients();

    let client = clients
        .authenticate_client(&ctx, "app-1", registration.client_secret.as_deref())
        .await
        .unwrap();
    assert_eq!(client.id, registration.client.id);

    for secret in [Some("wrong"), None, Some("")] {
        let err = clients
            .authenticate_client(&ctx, "app-1", secret)
            .await
            .unwrap_err();
        assert!(err.is(OAuth2ErrorKind::InvalidClient), "{secret:?}");
    }

    let err = clients
        .authenticate_client(&ctx, "missing", Some("anything"))
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidClient));
}

#[tokio::test]
async fn test_supplied_secret_is_hashed_and_not_echoed() {
    let engine = create_test_engine();
    let ctx = engine.ctx(T1);
    let registration = engine
        .server
        .register_client(
            &ctx,
            ClientRegistrationRequest {
                client_secret: Some("s3cret-value".to_owned()),
                ..request("app-1")
            },
        )
        .await
        .unwrap();

    assert!(registration.client_secret.is_none());
    engine
        .server
        .clients()
        .authenticate_client(&ctx, "app-1", Some("s3cret-value"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_public_client_has_no_secret() {
    let engine = create_test_engine();
    let registration = register_public_client(&engine, T1, "spa").await;
    let ctx = engine.ctx(T1);

    assert!(registration.client.is_public());
    assert!(registration.client_secret.is_none());
    assert!(registration.client.client_secret_hash.is_empty());

    engine
        .server
        .clients()
        .authenticate_client(&ctx, "spa", None)
        .await
        .unwrap();
    let err = engine
        .server
        .clients()
        .authenticate_client(&ctx, "spa", Some("guess"))
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidClient));
}

#[tokio::test]
async fn test_invalid_registrations_are_rejected() {
    let engine = create_test_engine();
    let ctx = engine.ctx(T1);

    let invalid = [
        ClientRegistrationRequest {
            client_id: "  ".to_owned(),
            ..request("ignored")
        },
        ClientRegistrationRequest {
            redirect_uris: vec![],
            ..request("app-1")
        },
        ClientRegistrationRequest {
            redirect_uris: vec!["/relative".to_owned()],
            ..request("app-1")
        },
        ClientRegistrationRequest {
            redirect_uris: vec!["https://a.example/cb#fragment".to_owned()],
            ..request("app-1")
        },
        ClientRegistrationRequest {
            grant_types: vec!["password".to_owned()],
            ..request("app-1")
        },
        ClientRegistrationRequest {
            token_endpoint_auth_methods: vec!["private_key_jwt".to_owned()],
            ..request("app-1")
        },
    ];

    for registration in invalid {
        let err = engine
            .server
            .register_client(&ctx, registration.clone())
            .await
            .unwrap_err();
        assert!(
            err.is(OAuth2ErrorKind::InvalidRequest),
            "{registration:?}"
        );
    }

    let err = engine
        .server
        .clients()
        .get_client_by_id(&ctx, "app-1")
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::NotFound));
}

#[tokio::test]
async fn test_upsert_replaces_configuration_but_keeps_identity() {
    let engine = create_test_engine();
    let first = register_client(&engine, T1, "app-1").await;

    let later = engine
        .ctx(T1)
        .with_now(first.client.created_at + ChronoDuration::hours(1));
    let second = engine
        .server
        .register_client(
            &later,
            ClientRegistrationRequest {
                redirect_uris: vec!["https://b.example/cb".to_owned()],
                scopes: vec!["openid".to_owned()],
                ..request("app-1")
            },
        )
        .await
        .unwrap();

    assert_eq!(second.client.id, first.client.id);
    assert_eq!(second.client.created_at, first.client.created_at);
    assert!(second.client.updated_at > first.client.updated_at);
    assert_eq!(second.client.redirect_uris, vec!["https://b.example/cb"]);
    assert_eq!(second.client.scopes, vec!["openid"]);

    // A new secret was generated; the old one no longer authenticates
    let clients = engine.server.clients();
    let err = clients
        .authenticate_client(&later, "app-1", first.client_secret.as_deref())
        .await
        .unwrap_err();
    assert!(err.is(OAuth2ErrorKind::InvalidClient));
    clients
        .authenticate_client(&later, "app-1", second.client_secret.as_deref())
        .await
        .unwrap();
}
