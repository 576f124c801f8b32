//! Password hashing and policy checks using Argon2id
//!
//! Digests are PHC strings carrying their own salt and parameters, so a
//! digest produced under older parameters still verifies and can be flagged
//! for upgrade by [`PasswordService::needs_rehash`].

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{seq::SliceRandom, Rng};
use serde::Deserialize;
use thiserror::Error;

use crate::common::validation::ValidationResult;

/// Characters accepted as "special" by the policy
pub const SYMBOLS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";

const STRENGTH_LABELS: [&str; 5] = ["Very Weak", "Weak", "Fair", "Good", "Strong"];

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    Params(String),
    #[error("failed to hash password: {0}")]
    Hash(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub uppercase: bool,
    pub lowercase: bool,
    pub numbers: bool,
    pub symbols: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 8,
            uppercase: true,
            lowercase: true,
            numbers: true,
            symbols: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl From<PasswordValidation> for ValidationResult {
    fn from(validation: PasswordValidation) -> Self {
        let mut result = ValidationResult::new();
        for message in &validation.errors {
            result.add_error("password", message);
        }
        result
    }
}

#[derive(Debug, Clone)]
pub struct PasswordService {
    /// Argon2 time cost
    cost: u32,
    memory_kib: u32,
}

impl PasswordService {
    pub fn new(cost: u32, memory_kib: u32) -> Self {
        Self { cost, memory_kib }
    }

    fn hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(self.memory_kib, self.cost, 1, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a password into a PHC string with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Verify a password against a stored digest. Malformed digests yield
    /// `false`.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed_hash) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn validate(&self, password: &str, requirements: &PasswordRequirements) -> PasswordValidation {
        let mut errors = Vec::new();

        if password.chars().count() < requirements.min_length {
            errors.push(format!(
                "Password must be at least {} characters long",
                requirements.min_length
            ));
        }
        if requirements.uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            errors.push("Password must contain at least one uppercase letter".to_string());
        }
        if requirements.lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            errors.push("Password must contain at least one lowercase letter".to_string());
        }
        if requirements.numbers && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one number".to_string());
        }
        if requirements.symbols && !password.chars().any(|c| SYMBOLS.contains(c)) {
            errors.push("Password must contain at least one special character".to_string());
        }

        PasswordValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// True when the digest is unparsable, not Argon2id, or weaker than the
    /// configured cost.
    pub fn needs_rehash(&self, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return true;
        };
        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        match Params::try_from(&parsed) {
            Ok(params) => params.t_cost() < self.cost || params.m_cost() < self.memory_kib,
            Err(_) => true,
        }
    }

    /// Returns a fresh digest when `digest` is below the configured cost.
    pub fn rehash_if_needed(
        &self,
        password: &str,
        digest: &str,
    ) -> Result<Option<String>, PasswordError> {
        if self.needs_rehash(digest) {
            self.hash(password).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn strength_score(password: &str) -> u8 {
        let length = password.chars().count();
        let mut score = 0u8;

        if length >= 8 {
            score += 1;
        }
        if length >= 12 {
            score += 1;
        }
        if password.chars().any(|c| c.is_ascii_uppercase()) {
            score += 1;
        }
        if password.chars().any(|c| c.is_ascii_lowercase()) {
            score += 1;
        }
        if password.chars().any(|c| c.is_ascii_digit()) {
            score += 1;
        }
        if password.chars().any(|c| SYMBOLS.contains(c)) {
            score += 1;
        }
        if length >= 16 && score >= 4 {
            score += 1;
        }

        score.min(4)
    }

    pub fn strength_label(password: &str) -> &'static str {
        STRENGTH_LABELS[usize::from(Self::strength_score(password))]
    }

    /// Random password containing every character class, at least 4 long.
    pub fn generate_secure_password(length: usize) -> String {
        let length = length.max(4);
        let mut rng = rand::rngs::OsRng;
        let pick = |set: &str, rng: &mut rand::rngs::OsRng| -> char {
            let bytes = set.as_bytes();
            bytes[rng.gen_range(0..bytes.len())] as char
        };

        let mut chars = vec![
            pick(UPPERCASE, &mut rng),
            pick(LOWERCASE, &mut rng),
            pick(DIGITS, &mut rng),
            pick(SYMBOLS, &mut rng),
        ];

        let all: String = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS].concat();
        while chars.len() < length {
            chars.push(pick(&all, &mut rng));
        }

        chars.shuffle(&mut rng);
        chars.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PasswordService {
        PasswordService::new(1, 1024)
    }

    #[test]
    fn test_password_hash_and_verify() {
        let passwords = service();
        let hash = passwords.hash("Passw0rd1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(passwords.verify("Passw0rd1", &hash));
        assert!(!passwords.verify("Passw0rd2", &hash));
    }

    #[test]
    fn test_different_salts() {
        let passwords = service();
        let hash1 = passwords.hash("Password1").unwrap();
        let hash2 = passwords.hash("Password1").unwrap();

        assert_ne!(hash1, hash2);
        assert!(passwords.verify("Password1", &hash1));
        assert!(passwords.verify("Password1", &hash2));
    }

    #[test]
    fn test_malformed_digest_is_false() {
        assert!(!service().verify("anything", "not-a-phc-string"));
        assert!(!service().verify("anything", ""));
    }

    #[test]
    fn test_weak_password_reports_each_rule() {
        let result = service().validate("abc", &PasswordRequirements::default());

        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![
                "Password must be at least 8 characters long",
                "Password must contain at least one uppercase letter",
                "Password must contain at least one number",
            ]
        );
        assert!(PasswordService::strength_score("abc") <= 1);
    }

    #[test]
    fn test_symbol_requirement() {
        let requirements = PasswordRequirements {
            symbols: true,
            ..Default::default()
        };
        let passwords = service();

        let result = passwords.validate("Passw0rd1", &requirements);
        assert_eq!(
            result.errors,
            vec!["Password must contain at least one special character"]
        );
        assert!(passwords.validate("Passw0rd1!", &requirements).valid);
    }

    #[test]
    fn test_strength_labels() {
        assert_eq!(PasswordService::strength_label(""), "Very Weak");
        assert_eq!(PasswordService::strength_label("abc"), "Weak");
        assert_eq!(PasswordService::strength_score("Passw0rd1"), 4);
        assert_eq!(PasswordService::strength_label("Correct-Horse-Battery-9"), "Strong");
    }

    #[test]
    fn test_needs_rehash() {
        let weak = PasswordService::new(1, 1024);
        let strong = PasswordService::new(2, 1024);
        let digest = weak.hash("Passw0rd1").unwrap();

        assert!(!weak.needs_rehash(&digest));
        assert!(strong.needs_rehash(&digest));
        assert!(strong.needs_rehash("garbage"));

        let upgraded = strong.rehash_if_needed("Passw0rd1", &digest).unwrap().unwrap();
        assert!(!strong.needs_rehash(&upgraded));
        assert!(strong.verify("Passw0rd1", &upgraded));
        assert!(strong.rehash_if_needed("Passw0rd1", &upgraded).unwrap().is_none());
    }

    #[test]
    fn test_generated_password_meets_policy() {
        let passwords = service();
        let requirements = PasswordRequirements {
            min_length: 16,
            symbols: true,
            ..Default::default()
        };

        for _ in 0..20 {
            let generated = PasswordService::generate_secure_password(16);
            assert_eq!(generated.chars().count(), 16);
            assert!(passwords.validate(&generated, &requirements).valid);
        }

        assert_eq!(PasswordService::generate_secure_password(1).len(), 4);
    }
}
