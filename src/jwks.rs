// ABOUTME: Per-tenant RS256 signing key lifecycle: create-on-first-use, rotation and JWKS publication
// ABOUTME: Verification keys are resolved by kid so rotation never invalidates issued tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Signing Key Management
//!
//! Every tenant owns exactly one active RSA key that signs new access tokens.
//! Rotation generates fresh material under a new kid, deactivates the previous
//! key and keeps it for verification. Tokens carry their kid in the JWT header,
//! so verification always resolves the exact key that signed them.
//!
//! Decoded key material is cached per `(tenant, kid)`. Key material for a kid
//! never changes, so these entries never need invalidation. The identity of the
//! *active* key is never cached; it is read from the store for every issuance.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration as ChronoDuration;
use dashmap::DashMap;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tokio::task;
use tokio::time::Instant;
use tollgate_core::constants::crypto::KID_BYTES;
use tollgate_core::constants::oauth::SIGNING_ALGORITHM;
use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tollgate_core::ids::IdGenerator;
use tollgate_core::models::{SigningKey, TenantId};
use tracing::{debug, error, info, warn};

use crate::crypto::generate_random_token;
use crate::database::KeyRepository;
use crate::logging::TenantLogger;
use crate::tenant::isolation::{OwnedLookup, TenantOwned};
use crate::tenant::RequestContext;

/// JSON Web Key (RFC 7517)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "RSA")
    pub kty: String,
    /// Public key use (always "sig")
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key ID for rotation tracking
    pub kid: String,
    /// Algorithm (always "RS256")
    pub alg: String,
    /// RSA modulus (base64url encoded)
    pub n: String,
    /// RSA exponent (base64url encoded)
    pub e: String,
}

impl JsonWebKey {
    /// Public JWK for a stored signing key
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the stored public key PEM does not parse
    pub fn from_signing_key(key: &SigningKey) -> OAuth2Result<Self> {
        let public_key = RsaPublicKey::from_public_key_pem(&key.public_key_pem).map_err(|e| {
            error!(tenant_id = %key.tenant_id, kid = %key.kid, "Stored public key is unreadable: {e}");
            OAuth2Error::server_error("Stored signing key is unreadable")
        })?;

        Ok(Self {
            kty: "RSA".to_owned(),
            key_use: "sig".to_owned(),
            kid: key.kid.clone(),
            alg: key.algorithm.clone(),
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        })
    }
}

/// JSON Web Key Set (RFC 7517)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Keys, newest first
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Key with the given kid
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }
}

/// Freshly generated RSA key material in PEM form
struct GeneratedKeyPair {
    private_key_pem: String,
    public_key_pem: String,
}

impl GeneratedKeyPair {
    /// Generate RSA key material
    ///
    /// Use 2048 bits for faster test execution, 4096 bits for production security.
    fn generate(key_size_bits: usize) -> OAuth2Result<Self> {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, key_size_bits).map_err(|e| {
            error!("Failed to generate RSA private key: {e}");
            OAuth2Error::server_error("Signing key generation failed")
        })?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| {
                error!("Failed to export private key as PEM: {e}");
                OAuth2Error::server_error("Signing key export failed")
            })?;
        let public_key_pem = public_key.to_public_key_pem(LineEnding::LF).map_err(|e| {
            error!("Failed to export public key as PEM: {e}");
            OAuth2Error::server_error("Signing key export failed")
        })?;

        Ok(Self {
            private_key_pem,
            public_key_pem,
        })
    }
}

/// Key used to sign one access token
#[derive(Clone)]
pub struct ActiveSigner {
    /// kid to place in the JWT header
    pub kid: String,
    /// Private key
    pub encoding_key: EncodingKey,
    /// Time this call spent generating the key; zero when it already existed
    pub key_generation: Duration,
}

/// Maintains each tenant's active signing key and rotation history
pub struct SigningKeyManager {
    keys: Arc<dyn KeyRepository>,
    ids: Arc<IdGenerator>,
    key_size_bits: usize,
    rotation_days: i64,
    encoding_keys: DashMap<(TenantId, String), EncodingKey>,
    decoding_keys: DashMap<(TenantId, String), DecodingKey>,
}

impl SigningKeyManager {
    /// Create a manager generating `key_size_bits` RSA keys and recommending
    /// rotation after `rotation_days`
    #[must_use]
    pub fn new(
        keys: Arc<dyn KeyRepository>,
        ids: Arc<IdGenerator>,
        key_size_bits: usize,
        rotation_days: i64,
    ) -> Self {
        Self {
            keys,
            ids,
            key_size_bits,
            rotation_days,
            encoding_keys: DashMap::new(),
            decoding_keys: DashMap::new(),
        }
    }

    /// The tenant's active key, generated on first use
    ///
    /// When two callers race to create the first key, the store accepts one
    /// and the loser re-reads and returns the winner's key.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if key generation or storage fails
    pub async fn get_active_key(&self, ctx: &RequestContext) -> OAuth2Result<SigningKey> {
        self.active_key_timed(ctx).await.map(|(key, _)| key)
    }

    /// Active key plus the time spent generating it; RSA generation does not
    /// count against the storage deadline
    async fn active_key_timed(&self, ctx: &RequestContext) -> OAuth2Result<(SigningKey, Duration)> {
        if let Some(key) = self.load_active(ctx).await? {
            return Ok((key, Duration::ZERO));
        }

        let (candidate, spent) = self.generate_key(ctx).await?;
        let ctx = &ctx.extended_by(spent);
        let key = match ctx
            .within_deadline("key.create", self.keys.create(&candidate))
            .await?
        {
            Ok(()) => {
                info!(
                    tenant_id = %ctx.tenant_id(),
                    kid = %candidate.kid,
                    "Generated initial signing key"
                );
                candidate
            }
            Err(e) if e.is_conflict() => {
                debug!(
                    tenant_id = %ctx.tenant_id(),
                    "Lost first-use key creation race, using stored key"
                );
                self.load_active(ctx).await?.ok_or_else(|| {
                    error!(tenant_id = %ctx.tenant_id(), "Active key vanished after create conflict");
                    OAuth2Error::server_error("No active signing key")
                })?
            }
            Err(e) => {
                error!(tenant_id = %ctx.tenant_id(), error = %e, "Failed to store signing key");
                return Err(OAuth2Error::server_error("Storage operation failed"));
            }
        };
        Ok((key, spent))
    }

    /// Signing material for the tenant's active key
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the key cannot be loaded or parsed
    pub async fn active_signer(&self, ctx: &RequestContext) -> OAuth2Result<ActiveSigner> {
        let (key, key_generation) = self.active_key_timed(ctx).await?;
        let cache_key = (key.tenant_id, key.kid.clone());
        if let Some(cached) = self.encoding_keys.get(&cache_key) {
            return Ok(ActiveSigner {
                kid: key.kid,
                encoding_key: cached.value().clone(),
                key_generation,
            });
        }

        let encoding_key =
            EncodingKey::from_rsa_pem(key.private_key_pem.as_bytes()).map_err(|e| {
                error!(tenant_id = %key.tenant_id, kid = %key.kid, "Failed to load encoding key: {e}");
                OAuth2Error::server_error("Signing key is unreadable")
            })?;
        self.encoding_keys.insert(cache_key, encoding_key.clone());

        Ok(ActiveSigner {
            kid: key.kid,
            encoding_key,
            key_generation,
        })
    }

    /// Verification key for `kid` in the context's tenant, active or retired
    ///
    /// # Errors
    ///
    /// Returns `server_error` if storage fails or the stored key is unreadable
    pub async fn decoding_key(
        &self,
        ctx: &RequestContext,
        kid: &str,
    ) -> OAuth2Result<Option<DecodingKey>> {
        let cache_key = (ctx.tenant_id(), kid.to_owned());
        if let Some(cached) = self.decoding_keys.get(&cache_key) {
            return Ok(Some(cached.value().clone()));
        }

        let Some(key) = ctx
            .storage("key.get_by_kid", self.keys.get_by_kid(ctx.tenant_id(), kid))
            .await?
            .owned_by(ctx)
        else {
            return Ok(None);
        };

        let decoding_key =
            DecodingKey::from_rsa_pem(key.public_key_pem.as_bytes()).map_err(|e| {
                error!(tenant_id = %key.tenant_id, kid = %key.kid, "Failed to load decoding key: {e}");
                OAuth2Error::server_error("Signing key is unreadable")
            })?;
        self.decoding_keys.insert(cache_key, decoding_key.clone());
        Ok(Some(decoding_key))
    }

    /// Replace the tenant's active key with freshly generated material
    ///
    /// The previous key is deactivated and retained. Returns the new key.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if key generation or storage fails
    pub async fn rotate_key(&self, ctx: &RequestContext) -> OAuth2Result<SigningKey> {
        let (new_key, spent) = self.generate_key(ctx).await?;
        let ctx = &ctx.extended_by(spent);
        let previous = ctx
            .storage(
                "key.rotate",
                self.keys.rotate(ctx.tenant_id(), &new_key, ctx.now()),
            )
            .await?
            .owned_by(ctx);

        TenantLogger::log_key_rotated(
            ctx.tenant_id(),
            &new_key.kid,
            previous.as_ref().map(|key| key.kid.as_str()),
        );
        Ok(new_key)
    }

    /// Every retained public key of the tenant as a JWKS document
    ///
    /// # Errors
    ///
    /// Returns `server_error` if storage fails or a stored key is unreadable
    pub async fn jwks(&self, ctx: &RequestContext) -> OAuth2Result<JsonWebKeySet> {
        let stored = ctx
            .storage("key.list", self.keys.list(ctx.tenant_id()))
            .await?;

        let keys = stored
            .into_iter()
            .filter_map(|key| key.owned_by(ctx))
            .map(|key| JsonWebKey::from_signing_key(&key))
            .collect::<OAuth2Result<Vec<_>>>()?;

        Ok(JsonWebKeySet { keys })
    }

    /// Whether the active key is older than the rotation interval
    ///
    /// A tenant without an active key reports `true`.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if storage fails
    pub async fn should_rotate(&self, ctx: &RequestContext) -> OAuth2Result<bool> {
        Ok(self.load_active(ctx).await?.is_none_or(|key| {
            ctx.now() - key.created_at >= ChronoDuration::days(self.rotation_days)
        }))
    }

    async fn load_active(&self, ctx: &RequestContext) -> OAuth2Result<Option<SigningKey>> {
        Ok(ctx
            .storage("key.get_active", self.keys.get_active(ctx.tenant_id()))
            .await?
            .owned_by(ctx))
    }

    async fn generate_key(&self, ctx: &RequestContext) -> OAuth2Result<(SigningKey, Duration)> {
        let bits = self.key_size_bits;
        let started = Instant::now();
        let material = task::spawn_blocking(move || GeneratedKeyPair::generate(bits))
            .await
            .map_err(|e| {
                warn!("Key generation task failed: {e}");
                OAuth2Error::server_error("Signing key generation failed")
            })??;

        let key = SigningKey {
            id: self.ids.next_id(),
            tenant_id: ctx.tenant_id(),
            kid: generate_random_token(KID_BYTES)?,
            algorithm: SIGNING_ALGORITHM.to_owned(),
            private_key_pem: material.private_key_pem,
            public_key_pem: material.public_key_pem,
            active: true,
            created_at: ctx.now(),
            rotated_at: None,
        };
        Ok((key, started.elapsed()))
    }
}
