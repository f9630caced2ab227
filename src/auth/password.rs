//! Password hashing and verification using Argon2
//!
//! Uses the argon2id variant with the crate's default cost parameters
//! (19 MiB, 2 passes), which puts a verification in the tens of
//! milliseconds. Minimum-length checks belong to the caller.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::ChainhubError;

/// Minimum accepted password length in bytes
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, ChainhubError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ChainhubError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash
///
/// A stored hash that does not parse is treated as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Burn one verification's worth of work against a throwaway hash.
///
/// Login calls this when the identifier is unknown so that response time
/// does not reveal whether an account exists.
pub fn verify_dummy(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let dummy = DUMMY_HASH.get_or_init(|| hash_password("chainhub-dummy-password").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}
