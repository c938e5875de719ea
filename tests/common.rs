// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory engine wiring, client/user registration and code-flow helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `tollgate`
//!
//! Engines built here use 2048-bit signing keys so key generation stays fast.

use std::env;
use std::sync::{Arc, Once};

use tollgate::config::EngineConfig;
use tollgate::database::{InMemoryStore, Storage, TokenRepository};
use tollgate::identity::{IdentityVerifier, PasswordCredentials, PasswordVerifier, VerifiedIdentity};
use tollgate::oauth2_server::{
    AuthorizeRequest, ClientRegistration, ClientRegistrationRequest, OAuth2AuthorizationServer,
    TokenRequest, TokenResponse,
};
use tollgate::tenant::RequestContext;
use tollgate_core::ids::IdGenerator;
use tollgate_core::models::TenantId;
use tracing::Level;

/// Redirect URI registered for every test client
pub const REDIRECT_URI: &str = "https://a.example/cb";

/// RFC 7636 Appendix B verifier
pub const PKCE_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

/// S256 challenge for [`PKCE_VERIFIER`]
pub const PKCE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

pub const T1: TenantId = TenantId::new(1);
pub const T2: TenantId = TenantId::new(2);

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        // TEST_LOG controls verbosity; tests stay quiet by default
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Engine configuration for tests
pub fn test_config() -> EngineConfig {
    EngineConfig {
        signing_key_bits: 2048,
        ..EngineConfig::default()
    }
}

/// Engine wired over one in-memory store
pub struct TestEngine {
    pub server: OAuth2AuthorizationServer,
    pub store: Arc<InMemoryStore>,
    pub passwords: PasswordVerifier,
}

impl TestEngine {
    /// Context for `tenant` timestamped now
    pub fn ctx(&self, tenant: TenantId) -> RequestContext {
        self.server.context(tenant)
    }
}

pub fn create_test_engine() -> TestEngine {
    create_test_engine_with_config(test_config())
}

pub fn create_test_engine_with_config(config: EngineConfig) -> TestEngine {
    init_test_logging();
    let store = Arc::new(InMemoryStore::new());
    let storage = Storage::from_store(store.clone());
    let ids = Arc::new(IdGenerator::new(1));
    let passwords = PasswordVerifier::new(storage.users.clone(), ids.clone());
    let server = OAuth2AuthorizationServer::new(&storage, ids, config);
    TestEngine {
        server,
        store,
        passwords,
    }
}

/// Engine over `store` whose token records go through `tokens` instead
pub fn create_test_engine_with_tokens(
    store: Arc<InMemoryStore>,
    tokens: Arc<dyn TokenRepository>,
) -> TestEngine {
    init_test_logging();
    let storage = Storage {
        tokens,
        ..Storage::from_store(store.clone())
    };
    let ids = Arc::new(IdGenerator::new(1));
    let passwords = PasswordVerifier::new(storage.users.clone(), ids.clone());
    let server = OAuth2AuthorizationServer::new(&storage, ids, test_config());
    TestEngine {
        server,
        store,
        passwords,
    }
}

/// Confidential client with the default grants and scopes
pub async fn register_client(
    engine: &TestEngine,
    tenant: TenantId,
    client_id: &str,
) -> ClientRegistration {
    engine
        .server
        .register_client(
            &engine.ctx(tenant),
            ClientRegistrationRequest {
                client_id: client_id.to_owned(),
                redirect_uris: vec![REDIRECT_URI.to_owned()],
                ..ClientRegistrationRequest::default()
            },
        )
        .await
        .expect("client registration")
}

/// Public client (`none` auth method)
pub async fn register_public_client(
    engine: &TestEngine,
    tenant: TenantId,
    client_id: &str,
) -> ClientRegistration {
    engine
        .server
        .register_client(
            &engine.ctx(tenant),
            ClientRegistrationRequest {
                client_id: client_id.to_owned(),
                redirect_uris: vec![REDIRECT_URI.to_owned()],
                token_endpoint_auth_methods: vec!["none".to_owned()],
                ..ClientRegistrationRequest::default()
            },
        )
        .await
        .expect("public client registration")
}

/// Register a password user and verify it
pub async fn verified_user(engine: &TestEngine, tenant: TenantId, email: &str) -> VerifiedIdentity {
    let ctx = engine.ctx(tenant);
    engine
        .passwords
        .register(&ctx, email, "correct horse battery staple")
        .await
        .expect("user registration");
    engine
        .passwords
        .verify(
            &ctx,
            &PasswordCredentials::new(email, "correct horse battery staple"),
        )
        .await
        .expect("password verification")
}

/// Authorize request with an S256 challenge
pub fn authorize_request(client_id: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        client_id: client_id.to_owned(),
        response_type: "code".to_owned(),
        redirect_uri: REDIRECT_URI.to_owned(),
        scope: Some("openid profile".to_owned()),
        state: Some("xyz".to_owned()),
        nonce: Some("n-0S6_WzA2Mj".to_owned()),
        code_challenge: Some(PKCE_CHALLENGE.to_owned()),
        code_challenge_method: Some("S256".to_owned()),
    }
}

/// Authorize and continue as `identity`, returning the issued code
pub async fn obtain_code(
    engine: &TestEngine,
    tenant: TenantId,
    client_id: &str,
    identity: &VerifiedIdentity,
) -> String {
    let ctx = engine.ctx(tenant);
    let handle = engine
        .server
        .authorize(&ctx, &authorize_request(client_id))
        .await
        .expect("authorize");
    engine
        .server
        .continue_with_identity(&ctx, handle.as_str(), identity)
        .await
        .expect("continue with identity")
        .code
}

/// Token request exchanging `code`
pub fn code_exchange_request(registration: &ClientRegistration, code: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "authorization_code".to_owned(),
        code: Some(code.to_owned()),
        redirect_uri: Some(REDIRECT_URI.to_owned()),
        client_id: registration.client.client_id.clone(),
        client_secret: registration.client_secret.clone(),
        code_verifier: Some(PKCE_VERIFIER.to_owned()),
        ..TokenRequest::default()
    }
}

/// Token request rotating `refresh_token`
pub fn refresh_request(registration: &ClientRegistration, refresh_token: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "refresh_token".to_owned(),
        client_id: registration.client.client_id.clone(),
        client_secret: registration.client_secret.clone(),
        refresh_token: Some(refresh_token.to_owned()),
        ..TokenRequest::default()
    }
}

/// Run the whole code flow for a fresh user and return the token pair
pub async fn issue_via_code_flow(
    engine: &TestEngine,
    tenant: TenantId,
    registration: &ClientRegistration,
    email: &str,
) -> TokenResponse {
    let identity = verified_user(engine, tenant, email).await;
    let code = obtain_code(engine, tenant, &registration.client.client_id, &identity).await;
    engine
        .server
        .token(&engine.ctx(tenant), code_exchange_request(registration, &code))
        .await
        .expect("code exchange")
}
