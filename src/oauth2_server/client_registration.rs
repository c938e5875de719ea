// ABOUTME: Per-tenant OAuth client registry: lookup, upsert with defaults, and token endpoint authentication
// ABOUTME: Client secrets are generated with ring and stored as Argon2id hashes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tollgate_core::constants::crypto::CLIENT_SECRET_BYTES;
use tollgate_core::constants::oauth::{DEFAULT_AUTH_METHODS, DEFAULT_GRANTS, DEFAULT_SCOPES};
use tollgate_core::errors::{OAuth2Error, OAuth2ErrorKind, OAuth2Result};
use tollgate_core::ids::IdGenerator;
use tollgate_core::models::{GrantType, OAuthClient, TokenEndpointAuthMethod};
use tracing::{info, warn};
use url::Url;

use super::models::{ClientRegistration, ClientRegistrationRequest};
use crate::crypto::{generate_random_token, hash_secret_blocking, verify_secret_blocking};
use crate::database::ClientRepository;
use crate::tenant::isolation::OwnedLookup;
use crate::tenant::RequestContext;

/// Resolves and maintains OAuth client configuration per tenant
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Arc<dyn ClientRepository>,
    ids: Arc<IdGenerator>,
}

impl ClientRegistry {
    /// Creates a new client registry
    #[must_use]
    pub fn new(clients: Arc<dyn ClientRepository>, ids: Arc<IdGenerator>) -> Self {
        Self { clients, ids }
    }

    /// Look a client up within the context's tenant
    ///
    /// # Errors
    ///
    /// Returns `not_found` if the tenant has no such client, or `server_error`
    /// if storage fails
    pub async fn get_client_by_id(
        &self,
        ctx: &RequestContext,
        client_id: &str,
    ) -> OAuth2Result<OAuthClient> {
        ctx.storage(
            "client.get_by_client_id",
            self.clients.get_by_client_id(ctx.tenant_id(), client_id),
        )
        .await?
        .owned_by(ctx)
        .ok_or_else(|| OAuth2Error::not_found(format!("Client '{client_id}' not found")))
    }

    /// Create or replace a client in the context's tenant
    ///
    /// Empty lists take the registry defaults. A secret is generated when none
    /// is supplied (unless the client is public) and returned once in the result.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for a missing `client_id`, no redirect URIs, a
    /// malformed redirect URI, or an unknown grant type or auth method
    pub async fn upsert_client(
        &self,
        ctx: &RequestContext,
        request: ClientRegistrationRequest,
    ) -> OAuth2Result<ClientRegistration> {
        let client_id = request.client_id.trim();
        if client_id.is_empty() {
            return Err(OAuth2Error::invalid_request("client_id is required"));
        }

        let redirect_uris = normalize_list(request.redirect_uris);
        if redirect_uris.is_empty() {
            return Err(OAuth2Error::invalid_request(
                "At least one redirect_uri is required",
            ));
        }
        for uri in &redirect_uris {
            Self::validate_redirect_uri(uri)?;
        }

        let grants = with_default(normalize_list(request.grant_types), DEFAULT_GRANTS)
            .iter()
            .map(|grant| grant.parse::<GrantType>())
            .collect::<OAuth2Result<Vec<_>>>()?;
        let scopes = with_default(normalize_list(request.scopes), DEFAULT_SCOPES);
        let auth_methods = with_default(
            normalize_list(request.token_endpoint_auth_methods),
            DEFAULT_AUTH_METHODS,
        )
        .iter()
        .map(|method| method.parse::<TokenEndpointAuthMethod>())
        .collect::<OAuth2Result<Vec<_>>>()?;

        let is_public = auth_methods
            .iter()
            .all(|method| *method == TokenEndpointAuthMethod::None);
        let supplied_secret = request
            .client_secret
            .map(|secret| secret.trim().to_owned())
            .filter(|secret| !secret.is_empty());

        let (client_secret_hash, generated_secret) = match (is_public, supplied_secret) {
            (true, _) => (String::new(), None),
            (false, Some(secret)) => (hash_secret_blocking(&secret).await?, None),
            (false, None) => {
                let secret = generate_random_token(CLIENT_SECRET_BYTES)?;
                (hash_secret_blocking(&secret).await?, Some(secret))
            }
        };

        let client = OAuthClient {
            id: self.ids.next_id(),
            tenant_id: ctx.tenant_id(),
            client_id: client_id.to_owned(),
            client_secret_hash,
            redirect_uris,
            grants,
            scopes,
            token_endpoint_auth_methods: auth_methods,
            require_consent: request.require_consent,
            app_id: request.app_id,
            created_at: ctx.now(),
            updated_at: ctx.now(),
        };

        let stored = ctx
            .storage("client.upsert", self.clients.upsert(&client))
            .await?;

        info!(
            tenant_id = %ctx.tenant_id(),
            client_id = %stored.client_id,
            secret_generated = generated_secret.is_some(),
            "OAuth client upserted"
        );

        Ok(ClientRegistration {
            client: stored,
            client_secret: generated_secret,
        })
    }

    /// Authenticate a client at the token endpoint
    ///
    /// A request carrying a secret must match a client registered for a
    /// secret-based method; a request without one must belong to a public client.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown clients or failed authentication
    pub async fn authenticate_client(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> OAuth2Result<OAuthClient> {
        let client = match self.get_client_by_id(ctx, client_id).await {
            Ok(client) => client,
            Err(e) if e.is(OAuth2ErrorKind::NotFound) => {
                warn!(tenant_id = %ctx.tenant_id(), client_id = %client_id, "Unknown OAuth client");
                return Err(OAuth2Error::invalid_client());
            }
            Err(e) => return Err(e),
        };

        let methods = &client.token_endpoint_auth_methods;
        let authenticated = match client_secret.filter(|secret| !secret.is_empty()) {
            Some(secret) => {
                (methods.contains(&TokenEndpointAuthMethod::ClientSecretPost)
                    || methods.contains(&TokenEndpointAuthMethod::ClientSecretBasic))
                    && verify_secret_blocking(secret, &client.client_secret_hash).await
            }
            None => methods.contains(&TokenEndpointAuthMethod::None),
        };

        if !authenticated {
            warn!(
                tenant_id = %ctx.tenant_id(),
                client_id = %client_id,
                "OAuth client authentication failed"
            );
            return Err(OAuth2Error::invalid_client());
        }

        Ok(client)
    }

    /// Redirect URIs must be absolute and carry no fragment (RFC 6749 Section 3.1.2)
    fn validate_redirect_uri(uri: &str) -> OAuth2Result<()> {
        let parsed = Url::parse(uri).map_err(|_| {
            OAuth2Error::invalid_request(format!("redirect_uri '{uri}' is not an absolute URL"))
        })?;
        if parsed.fragment().is_some() {
            return Err(OAuth2Error::invalid_request(format!(
                "redirect_uri '{uri}' must not contain a fragment"
            )));
        }
        Ok(())
    }
}

/// Trim entries, drop blanks and duplicates, keep order
fn normalize_list(values: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !normalized.iter().any(|existing| existing == value) {
            normalized.push(value.to_owned());
        }
    }
    normalized
}

fn with_default(values: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if values.is_empty() {
        defaults.iter().map(|value| (*value).to_owned()).collect()
    } else {
        values
    }
}
