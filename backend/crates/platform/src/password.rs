//! Password Hashing and Verification
//!
//! - Argon2id (v0x13) with a fixed, configurable cost
//! - Random 128-bit salt per hash, so equal inputs give different hashes
//! - Zeroization of clear text on drop
//! - Verification never errors: malformed hashes simply do not match
//!
//! ## Examples
//! ```rust
//! use platform::password::{HashCost, PasswordHasher};
//!
//! let hasher = PasswordHasher::new(HashCost::MINIMUM).unwrap();
//! let hashed = hasher.hash_plaintext("correct horse").unwrap();
//! assert!(hasher.verify("correct horse", &hashed));
//! assert!(!hasher.verify("battery staple", &hashed));
//! ```

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants
// ============================================================================

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length in characters
pub const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Error Types
// ============================================================================

/// Password policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },
}

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    /// Hashing operation failed
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Argon2 rejected the cost parameters
    #[error("Invalid hash cost: {0}")]
    InvalidCost(String),

    /// Invalid hash format
    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Either a policy violation or a hashing failure
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error(transparent)]
    Policy(#[from] PasswordPolicyError),

    #[error(transparent)]
    Hash(#[from] PasswordHashError),
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Does not implement `Clone`; `Debug` output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Create a password that satisfies the policy (length 6..=128 after NFKC).
    pub fn new(raw: impl Into<String>) -> Result<Self, PasswordPolicyError> {
        let password = Self::for_verification(raw);
        let char_count = password.0.chars().count();

        if char_count < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        if char_count > MAX_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        Ok(password)
    }

    /// Normalize without applying the policy.
    ///
    /// Used for candidate passwords at login: a too-short candidate must
    /// simply fail to match, not produce a policy error.
    pub fn for_verification(raw: impl Into<String>) -> Self {
        let mut raw = raw.into();
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();
        Self(normalized)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Hashed password in PHC string format
///
/// The PHC string embeds algorithm, version, cost parameters and salt, so a
/// hash stays verifiable after the configured cost changes.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from a PHC string, rejecting malformed input
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    /// Wrap a stored value as-is. A malformed value never verifies.
    pub fn from_db(s: impl Into<String>) -> Self {
        Self { hash: s.into() }
    }

    /// Get the PHC string for storage
    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash.
    ///
    /// Returns `false` on mismatch and on any parse failure.
    pub fn verify(&self, password: &ClearTextPassword) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.hash) else {
            return false;
        };

        // Parameters come from the PHC string; comparison is constant-time.
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Hasher
// ============================================================================

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashCost {
    /// OWASP recommendation for Argon2id: m=19 MiB, t=2, p=1
    pub const RECOMMENDED: Self = Self {
        memory_kib: 19_456,
        iterations: 2,
        parallelism: 1,
    };

    /// Smallest cost Argon2 accepts. Tests only.
    pub const MINIMUM: Self = Self {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };
}

impl Default for HashCost {
    fn default() -> Self {
        Self::RECOMMENDED
    }
}

/// Hashes and verifies passwords with a fixed Argon2id configuration
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> Result<Self, PasswordHashError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| PasswordHashError::InvalidCost(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password that already passed the policy
    pub fn hash(&self, password: &ClearTextPassword) -> Result<HashedPassword, PasswordHashError> {
        let salt = SaltString::generate(OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }

    /// Apply the policy, then hash
    pub fn hash_plaintext(&self, raw: &str) -> Result<HashedPassword, PasswordError> {
        let password = ClearTextPassword::new(raw)?;
        Ok(self.hash(&password)?)
    }

    /// Verify a candidate password; never errors
    pub fn verify(&self, raw: &str, hashed: &HashedPassword) -> bool {
        hashed.verify(&ClearTextPassword::for_verification(raw))
    }

    /// Whether a stored hash was produced with a different algorithm,
    /// version or cost than this hasher uses
    pub fn needs_rehash(&self, hashed: &HashedPassword) -> bool {
        let Ok(parsed) = PasswordHash::new(hashed.as_phc_string()) else {
            return true;
        };

        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        if parsed.version != Some(Version::V0x13.into()) {
            return true;
        }

        match Params::try_from(&parsed) {
            Ok(stored) => {
                stored.m_cost() != self.params.m_cost()
                    || stored.t_cost() != self.params.t_cost()
                    || stored.p_cost() != self.params.p_cost()
            }
            Err(_) => true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(HashCost::MINIMUM).unwrap()
    }

    #[test]
    fn test_password_too_short() {
        let result = ClearTextPassword::new("12345");
        assert_eq!(
            result.unwrap_err(),
            PasswordPolicyError::TooShort { min: 6, actual: 5 }
        );
    }

    #[test]
    fn test_password_min_length_accepted() {
        assert!(ClearTextPassword::new("123456").is_ok());
    }

    #[test]
    fn test_password_too_long() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1);
        let result = ClearTextPassword::new(long_password);
        assert!(matches!(result, Err(PasswordPolicyError::TooLong { .. })));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 6 characters, 18 bytes
        assert!(ClearTextPassword::new("密码密码密码").is_ok());
    }

    #[test]
    fn test_hash_plaintext_rejects_short_input() {
        let result = hasher().hash_plaintext("abc");
        assert!(matches!(
            result,
            Err(PasswordError::Policy(PasswordPolicyError::TooShort { .. }))
        ));
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hashed = hasher.hash_plaintext("TestPassword123!").unwrap();

        assert!(hasher.verify("TestPassword123!", &hashed));
        assert!(!hasher.verify("WrongPassword123!", &hashed));
    }

    #[test]
    fn test_salted_hashes_differ_but_both_verify() {
        let hasher = hasher();
        let first = hasher.hash_plaintext("alice-secret").unwrap();
        let second = hasher.hash_plaintext("alice-secret").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("alice-secret", &first));
        assert!(hasher.verify("alice-secret", &second));
    }

    #[test]
    fn test_verify_short_candidate_is_false_not_error() {
        let hasher = hasher();
        let hashed = hasher.hash_plaintext("abcdef").unwrap();
        assert!(!hasher.verify("abc", &hashed));
    }

    #[test]
    fn test_verify_malformed_hash_is_false() {
        let hasher = hasher();
        assert!(!hasher.verify("whatever", &HashedPassword::from_db("not_a_valid_hash")));
        assert!(!hasher.verify("whatever", &HashedPassword::from_db("")));
    }

    #[test]
    fn test_phc_string_roundtrip() {
        let hasher = hasher();
        let hashed = hasher.hash_plaintext("TestPassword123!").unwrap();

        let restored = HashedPassword::from_phc_string(hashed.as_phc_string()).unwrap();
        assert!(hasher.verify("TestPassword123!", &restored));
        assert!(HashedPassword::from_phc_string("not_a_valid_hash").is_err());
    }

    #[test]
    fn test_hash_uses_argon2id_v19() {
        let hashed = hasher().hash_plaintext("abcdef").unwrap();
        assert!(hashed.as_phc_string().starts_with("$argon2id$v=19$"));
    }

    #[test]
    fn test_needs_rehash_on_cost_change() {
        let cheap = hasher();
        let hashed = cheap.hash_plaintext("abcdef").unwrap();
        assert!(!cheap.needs_rehash(&hashed));

        let stronger = PasswordHasher::new(HashCost {
            memory_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(stronger.needs_rehash(&hashed));
        // Older hashes still verify under the new cost
        assert!(stronger.verify("abcdef", &hashed));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let result = PasswordHasher::new(HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(PasswordHashError::InvalidCost(_))));
    }

    #[test]
    fn test_debug_redaction() {
        let password = ClearTextPassword::for_verification("secret");
        let debug_output = format!("{:?}", password);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("secret"));
    }
}
