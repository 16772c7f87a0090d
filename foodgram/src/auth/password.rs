//! Password hashing, verification and policy checks.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::PasswordConfig;
use crate::errors::Error;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Hash a string using Argon2.
///
/// Uses the provided parameters or secure defaults if None.
pub fn hash_string_with_params(input: &str, params: Option<Argon2Params>) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.unwrap_or_default().to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash string: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Hash a string using Argon2 with default secure parameters.
pub fn hash_string(input: &str) -> Result<String, Error> {
    hash_string_with_params(input, None)
}

/// Verify a string against a hash.
///
/// Note: Verification uses the parameters embedded in the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    let argon2 = Argon2::default();
    Ok(argon2.verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Check a candidate password against the configured policy.
///
/// Returns the list of problems, empty when the password is acceptable.
pub fn check_policy(password: &str, config: &PasswordConfig, user_attributes: &[&str]) -> Vec<String> {
    let mut problems = Vec::new();
    let length = password.chars().count();

    if length < config.min_length {
        problems.push(format!(
            "This password is too short. It must contain at least {} characters.",
            config.min_length
        ));
    }
    if length > config.max_length {
        problems.push(format!("This password is too long. It must contain at most {} characters.", config.max_length));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    let lowered = password.to_lowercase();
    if user_attributes
        .iter()
        .filter(|attr| attr.chars().count() >= 3)
        .any(|attr| lowered.contains(&attr.to_lowercase()) || attr.to_lowercase().contains(&lowered))
    {
        problems.push("The password is too similar to your personal information.".to_string());
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> Option<Argon2Params> {
        Some(Argon2Params {
            memory_kib: 128,
            iterations: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn test_string_hashing() {
        let input = "test_password_123";
        let hash = hash_string(input).unwrap();

        assert!(!hash.is_empty());
        assert!(hash.starts_with("$argon2id$"));

        // Should verify correctly
        assert!(verify_string(input, &hash).unwrap());

        // Should fail with wrong input
        assert!(!verify_string("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let input = "same_password";

        let hash1 = hash_string_with_params(input, fast_params()).unwrap();
        let hash2 = hash_string_with_params(input, fast_params()).unwrap();

        // Same input should produce different hashes due to salt
        assert_ne!(hash1, hash2);

        // But both should verify correctly, params are read back from the hash
        assert!(verify_string(input, &hash1).unwrap());
        assert!(verify_string(input, &hash2).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_string("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = Argon2Params {
            memory_kib: 0,
            iterations: 0,
            parallelism: 0,
        };
        assert!(hash_string_with_params("pw", Some(params)).is_err());
    }

    #[test]
    fn test_policy() {
        let config = PasswordConfig::default();

        assert!(check_policy("correct-horse-battery", &config, &["alice", "alice@example.com"]).is_empty());

        let short = check_policy("abc", &config, &[]);
        assert_eq!(short.len(), 1);
        assert!(short[0].contains("too short"));

        let numeric = check_policy("1234567890", &config, &[]);
        assert_eq!(numeric, vec!["This password is entirely numeric.".to_string()]);

        let similar = check_policy("chef_gordon_1", &config, &["gordon"]);
        assert!(similar.iter().any(|p| p.contains("too similar")));
    }
}
