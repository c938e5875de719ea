// ABOUTME: PKCE (RFC 7636) challenge validation and verifier checking
// ABOUTME: Supports S256 and plain methods with constant-time comparison
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use tollgate_core::errors::{OAuth2Error, OAuth2Result};
use tollgate_core::models::PkceMethod;
use tracing::{debug, warn};

use crate::crypto::{constant_time_eq, sha256_base64url};

const MIN_LENGTH: usize = 43;
const MAX_LENGTH: usize = 128;

/// RFC 7636 Section 4.1 unreserved characters
fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

fn is_well_formed(value: &str) -> bool {
    (MIN_LENGTH..=MAX_LENGTH).contains(&value.len()) && value.chars().all(is_unreserved)
}

/// Validate the PKCE parameters of an authorize request
///
/// Returns the bound `(challenge, method)` pair, or `None` when no challenge
/// was sent. A method without a challenge is rejected, and an absent method
/// means `plain` (RFC 7636 Section 4.3). The challenge itself is opaque here;
/// only the verifier's shape is checked, at exchange.
///
/// # Errors
///
/// Returns `invalid_request` for an orphan or unknown method
pub fn validate_challenge(
    challenge: Option<&str>,
    method: Option<&str>,
) -> OAuth2Result<Option<(String, PkceMethod)>> {
    let Some(challenge) = challenge.filter(|c| !c.is_empty()) else {
        if method.is_some_and(|m| !m.is_empty()) {
            return Err(OAuth2Error::invalid_request(
                "code_challenge_method sent without code_challenge",
            ));
        }
        return Ok(None);
    };

    let method = match method.filter(|m| !m.is_empty()) {
        Some(m) => m.parse::<PkceMethod>()?,
        None => PkceMethod::Plain,
    };

    Ok(Some((challenge.to_owned(), method)))
}

/// Check a token request's `code_verifier` against the challenge bound to a code
///
/// # Errors
///
/// Returns `invalid_grant` when the verifier is missing, malformed or does
/// not match, or when a verifier is sent for a code issued without a challenge
pub fn verify(
    client_id: &str,
    challenge: Option<&str>,
    method: Option<PkceMethod>,
    verifier: Option<&str>,
) -> OAuth2Result<()> {
    let Some(challenge) = challenge else {
        if verifier.is_some() {
            warn!(
                client_id = %client_id,
                "code_verifier provided but no code_challenge was issued"
            );
            return Err(OAuth2Error::invalid_grant(
                "code_verifier provided but no code_challenge was issued",
            ));
        }
        return Ok(());
    };

    let verifier =
        verifier.ok_or_else(|| OAuth2Error::invalid_grant("code_verifier is required (PKCE)"))?;

    if !is_well_formed(verifier) {
        return Err(OAuth2Error::invalid_grant(
            "code_verifier must be 43-128 characters of [A-Z], [a-z], [0-9], -, ., _, ~",
        ));
    }

    let computed = match method.unwrap_or(PkceMethod::Plain) {
        PkceMethod::S256 => sha256_base64url(verifier),
        PkceMethod::Plain => verifier.to_owned(),
    };

    if constant_time_eq(&computed, challenge) {
        debug!(client_id = %client_id, "PKCE verification successful");
        Ok(())
    } else {
        warn!(
            client_id = %client_id,
            "PKCE verification failed - code_verifier does not match code_challenge"
        );
        Err(OAuth2Error::invalid_grant("Invalid code_verifier"))
    }
}

#[cfg(test)]
mod tests {
    use tollgate_core::errors::OAuth2ErrorKind;

    use super::*;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_challenge_validation() {
        assert_eq!(validate_challenge(None, None).unwrap(), None);
        assert_eq!(
            validate_challenge(Some(CHALLENGE), Some("S256")).unwrap(),
            Some((CHALLENGE.to_owned(), PkceMethod::S256))
        );
        assert_eq!(
            validate_challenge(Some(CHALLENGE), None).unwrap(),
            Some((CHALLENGE.to_owned(), PkceMethod::Plain))
        );

        assert_eq!(
            validate_challenge(Some("abc"), Some("S256")).unwrap(),
            Some(("abc".to_owned(), PkceMethod::S256))
        );
        let unknown = validate_challenge(Some(CHALLENGE), Some("S512")).unwrap_err();
        assert!(unknown.is(OAuth2ErrorKind::InvalidRequest));
        let orphan = validate_challenge(None, Some("S256")).unwrap_err();
        assert!(orphan.is(OAuth2ErrorKind::InvalidRequest));
    }

    #[test]
    fn test_s256_verification() {
        verify("app-1", Some(CHALLENGE), Some(PkceMethod::S256), Some(VERIFIER)).unwrap();

        let wrong = "x".repeat(43);
        let err = verify("app-1", Some(CHALLENGE), Some(PkceMethod::S256), Some(&wrong))
            .unwrap_err();
        assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    }

    #[test]
    fn test_plain_verification() {
        verify("app-1", Some(VERIFIER), Some(PkceMethod::Plain), Some(VERIFIER)).unwrap();
        assert!(verify("app-1", Some(VERIFIER), None, Some(CHALLENGE)).is_err());
    }

    #[test]
    fn test_missing_or_unexpected_verifier() {
        let missing = verify("app-1", Some(CHALLENGE), Some(PkceMethod::S256), None).unwrap_err();
        assert!(missing.is(OAuth2ErrorKind::InvalidGrant));

        verify("app-1", None, None, None).unwrap();
        let unexpected = verify("app-1", None, None, Some(VERIFIER)).unwrap_err();
        assert!(unexpected.is(OAuth2ErrorKind::InvalidGrant));
    }

    #[test]
    fn test_malformed_verifier() {
        let err = verify("app-1", Some(CHALLENGE), Some(PkceMethod::S256), Some("short"))
            .unwrap_err();
        assert!(err.is(OAuth2ErrorKind::InvalidGrant));
    }
}
