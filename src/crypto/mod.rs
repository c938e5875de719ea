// ABOUTME: Cryptographic helpers shared by the client registry, state machine and token manager
// ABOUTME: Secure random tokens and codes, SHA-256 digests, Argon2 hashing and constant-time compare
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Cryptographic utilities for bearer secrets
//!
//! Authorization codes, refresh tokens and access tokens are persisted only as
//! [`sha256_hex`] digests. Client secrets and passwords are hashed with Argon2id.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::task;
use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tracing::error;

/// Generate `length` random bytes encoded as URL-safe base64 without padding
///
/// # Errors
///
/// Returns `server_error` if the system RNG fails
pub fn generate_random_token(length: usize) -> OAuth2Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; length];

    rng.fill(&mut bytes).map_err(|e| {
        error!(
            "CRITICAL: SystemRandom failed - cannot generate secure random bytes: {}",
            e
        );
        OAuth2Error::server_error("System RNG failure - server cannot operate securely")
    })?;

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
}

/// Generate a decimal one-time code of `digits` digits
///
/// # Errors
///
/// Returns `server_error` if the system RNG fails
pub fn generate_numeric_code(digits: usize) -> OAuth2Result<String> {
    let rng = SystemRandom::new();
    let mut code = String::with_capacity(digits);
    let mut bytes = [0u8; 16];

    while code.len() < digits {
        rng.fill(&mut bytes).map_err(|e| {
            error!(
                "CRITICAL: SystemRandom failed - cannot generate secure random bytes: {}",
                e
            );
            OAuth2Error::server_error("System RNG failure - server cannot operate securely")
        })?;
        // Bytes of 250 and above are dropped so every digit is equally likely
        for byte in bytes.iter().filter(|byte| **byte < 250) {
            if code.len() == digits {
                break;
            }
            code.push(char::from(b'0' + byte % 10));
        }
    }

    Ok(code)
}

/// Hex-encoded SHA-256 digest used as the storage key for bearer secrets
#[must_use]
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// URL-safe base64 of the SHA-256 digest, as used by PKCE S256
#[must_use]
pub fn sha256_base64url(value: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(value.as_bytes()))
}

/// Constant-time string equality
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Hash a secret for storage using Argon2id with a random salt
///
/// Runs on the blocking pool; Argon2 is CPU-bound and must not stall the
/// async workers.
///
/// # Errors
///
/// Returns `server_error` if Argon2 hashing fails
pub async fn hash_secret_blocking(secret: &str) -> OAuth2Result<String> {
    let secret = secret.to_owned();
    task::spawn_blocking(move || hash_secret(&secret))
        .await
        .map_err(|e| {
            error!("Secret hashing task failed: {}", e);
            OAuth2Error::server_error("Secret hashing failed")
        })?
}

/// Verify a secret against a stored Argon2 PHC string on the blocking pool
///
/// A malformed stored hash or a failed task verifies as `false`.
pub async fn verify_secret_blocking(secret: &str, stored_hash: &str) -> bool {
    let secret = secret.to_owned();
    let stored_hash = stored_hash.to_owned();
    task::spawn_blocking(move || verify_secret(&secret, &stored_hash))
        .await
        .unwrap_or_else(|e| {
            error!("Secret verification task failed: {}", e);
            false
        })
}

fn hash_secret(secret: &str) -> OAuth2Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Argon2 hashing failed: {}", e);
            OAuth2Error::server_error("Secret hashing failed")
        })
}

fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(stored_hash) {
        Ok(hash) => hash,
        Err(e) => {
            error!("Failed to parse stored password hash: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}
