//! Salted Argon2id password hashes.
//!
//! Stored form: `argon2id$<salt b64>$<hash b64>` using unpadded standard
//! base64. Hashes are compared in constant time.

use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use super::AuthError;

/// Key derivation function name recorded in every stored hash.
pub const KDF_NAME: &str = "argon2id";

/// Size of the random salt in bytes.
const SALT_SIZE: usize = 16;

/// Size of the derived hash in bytes.
const HASH_SIZE: usize = 32;

/// Salt used when verifying against a user that does not exist, so the
/// response takes as long as a real mismatch.
const DUMMY_SALT: [u8; SALT_SIZE] = [0x5a; SALT_SIZE];

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let hash = derive(password, &salt)?;

    Ok(format!(
        "{}${}${}",
        KDF_NAME,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Check a password against a stored hash. Malformed stored hashes never
/// match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = decode_stored(stored) else {
        tracing::warn!("Stored password hash is malformed");
        dummy_verify(password);
        return false;
    };

    match derive(password, &salt) {
        Ok(actual) => bool::from(actual.as_slice().ct_eq(expected.as_slice())),
        Err(e) => {
            tracing::warn!("Password derivation failed: {}", e);
            false
        }
    }
}

/// Burn the same work as a real verification. Used for unknown usernames.
pub fn dummy_verify(password: &str) {
    let _ = derive(password, &DUMMY_SALT);
}

fn derive(password: &str, salt: &[u8]) -> Result<[u8; HASH_SIZE], AuthError> {
    let mut out = [0u8; HASH_SIZE];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(out)
}

fn decode_stored(stored: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    let (kdf, salt, hash) = (parts.next()?, parts.next()?, parts.next()?);
    if kdf != KDF_NAME || parts.next().is_some() {
        return None;
    }
    let salt = STANDARD_NO_PAD.decode(salt).ok()?;
    let hash = STANDARD_NO_PAD.decode(hash).ok()?;
    if salt.len() < 8 || hash.len() != HASH_SIZE {
        return None;
    }
    Some((salt, hash))
}
