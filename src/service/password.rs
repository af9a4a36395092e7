//! Folder password hashing and verification.
//!
//! New hashes are Argon2id PHC strings. Verification also accepts the
//! unsalted lowercase SHA-256 hex digests written by earlier deployments, so
//! an existing `folders` table can be migrated without resetting passwords.

use argon2::{
    Argon2, Params,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Maximum accepted password length in bytes.
pub const MAX_PASSWORD_LENGTH: usize = 1024;

const LEGACY_SHA256_HEX_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("password cannot be empty")]
    Empty,

    #[error("password must be at most {MAX_PASSWORD_LENGTH} bytes")]
    TooLong,

    #[error("password hashing failed: {0}")]
    HashError(String),
}

/// Argon2id, 19 MiB, 2 iterations, 1 lane.
fn create_argon2() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(19 * 1024, 2, 1, None)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// Hash a folder password. Returns a PHC string carrying salt and parameters.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = create_argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Compare a candidate password against a stored hash.
///
/// Unknown or malformed stored hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.starts_with('$') {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        // Parameters come from the PHC string, not from create_argon2().
        return Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
    }

    if is_legacy_digest(stored) {
        let candidate = legacy_sha256_hex(password);
        return bool::from(candidate.as_bytes().ct_eq(stored.as_bytes()));
    }

    false
}

/// Whether a stored hash predates Argon2.
pub fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == LEGACY_SHA256_HEX_LEN
        && stored
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn legacy_sha256_hex(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}
