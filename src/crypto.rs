//! Cryptographic primitives collaborator.
//!
//! The core never hand-rolls a MAC or a random source: this module exposes
//! small traits plus a default implementation backed by `sha2`, `hmac`,
//! `rand`, and `subtle`.

use base64::Engine as _;
use hmac::Mac;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Compare two secrets in constant time regardless of early mismatch
/// position.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        // Still perform a constant-time comparison against a same-length
        // buffer so length alone isn't a distinguishable fast path for an
        // attacker measuring wall-clock time across many requests.
        let padded_b: Vec<u8> = b.iter().copied().chain(std::iter::repeat(0)).take(a.len()).collect();
        let _ = a.ct_eq(&padded_b);
        return false;
    }
    a.ct_eq(b).into()
}

/// Generate a cryptographically random, URL-safe token string with at least
/// 128 bits of entropy.
///
/// `byte_len` must be >= 16 to satisfy the entropy floor.
#[must_use]
pub fn random_token(byte_len: usize) -> String {
    let byte_len = byte_len.max(16);
    let mut bytes = vec![0u8; byte_len];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a cryptographically random nonce/CSRF-token string.
///
/// Always sourced from the RNG, never a timestamp or counter composition —
/// a predictable token defeats the purpose of a nonce.
#[must_use]
pub fn random_nonce() -> String {
    random_token(32)
}

/// HMAC algorithms recognized by the HMAC auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacAlgorithm {
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA512.
    Sha512,
}

impl HmacAlgorithm {
    /// Parse from the config string.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "HMAC-SHA256" | "HS256" => Some(Self::Sha256),
            "HMAC-SHA512" | "HS512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// Compute an HMAC digest over `message` with `key`, hex-encoded.
#[must_use]
pub fn hmac_hex(algorithm: HmacAlgorithm, key: &[u8], message: &[u8]) -> String {
    match algorithm {
        HmacAlgorithm::Sha256 => {
            let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(key)
                .expect("HMAC accepts keys of any length");
            mac.update(message);
            hex::encode(mac.finalize().into_bytes())
        }
        HmacAlgorithm::Sha512 => {
            let mut mac = hmac::Hmac::<sha2::Sha512>::new_from_slice(key)
                .expect("HMAC accepts keys of any length");
            mac.update(message);
            hex::encode(mac.finalize().into_bytes())
        }
    }
}

/// Verify an HMAC digest in constant time.
#[must_use]
pub fn hmac_verify(algorithm: HmacAlgorithm, key: &[u8], message: &[u8], expected_hex: &str) -> bool {
    let computed = hmac_hex(algorithm, key, message);
    constant_time_eq(computed.as_bytes(), expected_hex.as_bytes())
}

/// Hash a password/API key at rest with SHA-256 (a placeholder for a real
/// KDF like Argon2; callers requiring password storage should inject a
/// stronger implementation of this trait in production).
#[must_use]
pub fn digest_hex(value: &[u8]) -> String {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::new();
    hasher.update(value);
    hex::encode(hasher.finalize())
}
