//! Password hashing for page uploads.
//!
//! Every upload carries a password which is salted, hashed with Argon2id,
//! and stored on the page document. Uploads only ever write the hash;
//! no request path verifies it yet (`verify` exists for the hash itself).

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    HashingFailed(String),
    #[error("password verification failed")]
    VerificationFailed,
    #[error("invalid hash format")]
    InvalidHashFormat,
}

/// Password hasher using Argon2id (the recommended variant for password hashing).
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    m_cost: u32,
    /// Time cost / iterations (default: 2)
    t_cost: u32,
    /// Parallelism factor (default: 1)
    p_cost: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        // OWASP recommended minimum parameters for Argon2id
        Self {
            m_cost: 19456, // 19 MiB
            t_cost: 2,
            p_cost: 1,
        }
    }
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure memory cost in KiB.
    pub fn with_memory_cost(mut self, kib: u32) -> Self {
        self.m_cost = kib;
        self
    }

    /// Configure time cost (iterations).
    pub fn with_time_cost(mut self, iterations: u32) -> Self {
        self.t_cost = iterations;
        self
    }

    /// Configure parallelism factor.
    pub fn with_parallelism(mut self, threads: u32) -> Self {
        self.p_cost = threads;
        self
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, None)
                .expect("valid argon2 params"),
        )
    }

    /// Hash a password, returning the PHC-format hash string.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = self.argon2();

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Verify a password against a stored PHC-format hash.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<(), PasswordError> {
        let parsed =
            PasswordHash::new(stored_hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| PasswordError::VerificationFailed)
    }
}

/// Hash a password using default Argon2id parameters.
#[inline]
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Argon2Hasher::new().hash(password)
}

/// Verify a password against a stored hash using default parameters.
#[inline]
pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), PasswordError> {
    Argon2Hasher::new().verify(password, stored_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let hasher = Argon2Hasher::new();
        let password = "supersecret123";

        let hash = hasher.hash(password).expect("hash should succeed");
        assert!(hash.starts_with("$argon2id$"));

        hasher
            .verify(password, &hash)
            .expect("verification should succeed");

        assert!(hasher.verify("wrongpassword", &hash).is_err());
    }

    #[test]
    fn test_salted_hashes_differ() {
        let hasher = Argon2Hasher::new();
        let a = hasher.hash("same-password").expect("hash a");
        let b = hasher.hash("same-password").expect("hash b");
        assert_ne!(a, b);
        hasher.verify("same-password", &a).expect("verify a");
        hasher.verify("same-password", &b).expect("verify b");
    }

    #[test]
    fn test_garbage_stored_hash_rejected() {
        let err = verify_password("anything", "not-a-phc-hash").unwrap_err();
        assert!(matches!(err, PasswordError::InvalidHashFormat));
    }
}
