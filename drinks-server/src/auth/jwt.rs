//! Access token verification.
//!
//! Tokens are RFC 7519 JWTs signed with Ed25519 (`alg: EdDSA`) or RSA
//! PKCS#1 v1.5 with SHA-256 (`alg: RS256`). The header
//! carries a `kid` naming the key in the issuer's signing-key set, the
//! payload carries the standard claims plus a `permissions` list.

use super::jwks::{Jwk, JwksClient};
use super::{AuthError, Claims};
use crate::config::AuthConfig;
use crate::errors::ApiError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use ed25519_dalek::Verifier as _;
use log::warn;
use rsa::signature::Verifier as _;
use rsa::{pkcs1v15, BigUint, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;

const EDDSA: &str = "EdDSA";
const RS256: &str = "RS256";

/// JOSE header fields the verifier looks at
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
}

/// Verifies access tokens against the issuer's signing keys and the
/// configured issuer and audience
#[derive(Clone)]
pub struct TokenVerifier {
    jwks: JwksClient,
    issuer: String,
    audience: String,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig, jwks: JwksClient) -> Self {
        Self {
            jwks,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    /// Verifies the token and returns its claims.
    ///
    /// Failing to reach the key set is an internal error, not an
    /// authorization failure.
    pub async fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let header = decode_header(token)?;
        let kid = header.kid.as_deref().ok_or(AuthError::Malformed)?;

        let key = match self.jwks.find_key(kid).await? {
            Some(key) => key,
            None => {
                warn!("No signing key found for kid '{kid}'");
                return Err(AuthError::KeyNotFound.into());
            }
        };

        let claims = decode_verified(token, &header, &key)?;
        validate_claims(&claims, &self.issuer, &self.audience, Utc::now().timestamp())?;
        Ok(claims)
    }
}

/// Splits a compact JWT into header, payload and signature segments
fn split_token(token: &str) -> Result<(&str, &str, &str), AuthError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(AuthError::Malformed),
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Reads the header without checking the signature
pub fn decode_header(token: &str) -> Result<TokenHeader, AuthError> {
    let (header, _, _) = split_token(token)?;
    decode_segment(header).ok_or(AuthError::Malformed)
}

/// Checks the signature with `key` and decodes the payload.
///
/// The verifier is picked by the token's `alg` together with the key's `kty`:
/// `EdDSA` needs an `OKP`/`Ed25519` key, `RS256` an `RSA` key.
pub fn decode_verified(token: &str, header: &TokenHeader, key: &Jwk) -> Result<Claims, AuthError> {
    if key.alg.as_deref().is_some_and(|alg| alg != header.alg) {
        warn!(
            "Token algorithm '{}' does not match key algorithm {:?}",
            header.alg, key.alg
        );
        return Err(AuthError::Unparsable);
    }

    let (header_b64, payload_b64, signature_b64) = split_token(token)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::Unparsable)?;
    let signing_input = format!("{header_b64}.{payload_b64}");

    let verified = match (header.alg.as_str(), key.kty.as_str()) {
        (EDDSA, "OKP") => verify_eddsa(key, signing_input.as_bytes(), &signature),
        (RS256, "RSA") => verify_rs256(key, signing_input.as_bytes(), &signature),
        (alg, kty) => {
            warn!("Rejecting token signed with '{alg}' for a '{kty}' key");
            return Err(AuthError::Unparsable);
        }
    };
    if !verified {
        warn!("Token signature verification failed");
        return Err(AuthError::Unparsable);
    }

    decode_segment(payload_b64).ok_or(AuthError::Unparsable)
}

fn verify_eddsa(key: &Jwk, message: &[u8], signature: &[u8]) -> bool {
    let Some(verifying_key) = ed25519_key(key) else {
        return false;
    };
    let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}

fn verify_rs256(key: &Jwk, message: &[u8], signature: &[u8]) -> bool {
    let Some(public_key) = rsa_key(key) else {
        return false;
    };
    let Ok(signature) = pkcs1v15::Signature::try_from(signature) else {
        return false;
    };
    pkcs1v15::VerifyingKey::<Sha256>::new(public_key)
        .verify(message, &signature)
        .is_ok()
}

/// Builds an Ed25519 verifying key from an `OKP` JWK
fn ed25519_key(key: &Jwk) -> Option<ed25519_dalek::VerifyingKey> {
    if key.crv.as_deref() != Some("Ed25519") {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(key.x.as_deref()?).ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    ed25519_dalek::VerifyingKey::from_bytes(&bytes).ok()
}

/// Builds an RSA public key from the modulus and exponent of an `RSA` JWK
fn rsa_key(key: &Jwk) -> Option<RsaPublicKey> {
    let n = URL_SAFE_NO_PAD.decode(key.n.as_deref()?).ok()?;
    let e = URL_SAFE_NO_PAD.decode(key.e.as_deref()?).ok()?;
    RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e)).ok()
}

/// Checks expiry, issuer, audience and presence of the permissions claim
pub fn validate_claims(
    claims: &Claims,
    issuer: &str,
    audience: &str,
    now: i64,
) -> Result<(), AuthError> {
    if claims.exp.is_some_and(|exp| exp < now) {
        return Err(AuthError::Expired);
    }

    let issuer_matches = claims.iss.as_deref() == Some(issuer);
    let audience_matches = claims.aud.as_ref().is_some_and(|aud| aud.contains(audience));
    if !issuer_matches || !audience_matches {
        warn!(
            "Token claims rejected: iss={:?} aud={:?}",
            claims.iss, claims.aud
        );
        return Err(AuthError::IncorrectClaims);
    }

    if claims.permissions.is_none() {
        return Err(AuthError::PermissionsMissing);
    }

    Ok(())
}

/// Encode a token signed by `sign` (tests only, the service never issues tokens)
#[cfg(test)]
pub fn encode_with(
    header: &serde_json::Value,
    claims: &serde_json::Value,
    sign: impl FnOnce(&[u8]) -> Vec<u8>,
) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let payload_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature_b64 = URL_SAFE_NO_PAD.encode(sign(signing_input.as_bytes()));
    format!("{signing_input}.{signature_b64}")
}

/// Encode and sign a token with an Ed25519 key (tests only)
#[cfg(test)]
pub fn encode(
    header: &serde_json::Value,
    claims: &serde_json::Value,
    signing_key: &ed25519_dalek::SigningKey,
) -> String {
    use ed25519_dalek::Signer;

    encode_with(header, claims, |input| signing_key.sign(input).to_bytes().to_vec())
}

/// Public JWK for an Ed25519 signing key (tests only)
#[cfg(test)]
pub fn public_jwk(kid: &str, signing_key: &ed25519_dalek::SigningKey) -> Jwk {
    Jwk {
        kty: "OKP".to_string(),
        kid: Some(kid.to_string()),
        crv: Some("Ed25519".to_string()),
        x: Some(URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes())),
        n: None,
        e: None,
        alg: Some(EDDSA.to_string()),
        key_use: Some("sig".to_string()),
    }
}
