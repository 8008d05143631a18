use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// How the `password` field of a credential record is compared and written.
///
/// `Plaintext` matches the admin console's seed data, which stores and
/// compares passwords verbatim with no hashing or salting. It exists for
/// compatibility only; real deployments should select `Argon2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordScheme {
    #[default]
    Plaintext,
    Argon2,
}

impl PasswordScheme {
    /// Check `candidate` against the stored password field.
    pub fn verify(&self, candidate: &str, stored: &str) -> bool {
        match self {
            PasswordScheme::Plaintext => candidate == stored,
            PasswordScheme::Argon2 => match PasswordHash::new(stored) {
                Ok(parsed) => Argon2::default()
                    .verify_password(candidate.as_bytes(), &parsed)
                    .is_ok(),
                Err(_) => false,
            },
        }
    }

    /// Produce the value to persist for a new password.
    pub fn prepare(&self, password: &str) -> AuthResult<String> {
        match self {
            PasswordScheme::Plaintext => Ok(password.to_string()),
            PasswordScheme::Argon2 => hash_password(password),
        }
    }

    /// Whether `stored` already looks like this scheme's output.
    pub fn is_prepared(&self, stored: &str) -> bool {
        match self {
            PasswordScheme::Plaintext => true,
            PasswordScheme::Argon2 => PasswordHash::new(stored).is_ok(),
        }
    }
}

impl std::str::FromStr for PasswordScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plaintext" | "plain" => Ok(PasswordScheme::Plaintext),
            "argon2" => Ok(PasswordScheme::Argon2),
            other => Err(format!("unknown password scheme: {}", other)),
        }
    }
}

/// Hash a password into an Argon2id PHC string with a fresh salt.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}
