// src/common/id_generator.rs
//! Crockford Base32 ID Generator
//!
//! Generates prefixed IDs using Crockford Base32 encoding, drawn from the
//! operating system CSPRNG. Format: PREFIX_XXXXXXXXXXXX (e.g., U_K7NP3XQ2M8TZ)
//!
//! Also produces the opaque secrets handed out in verification links and the
//! time-ordered nonces embedded in JWTs.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use rand::{rngs::OsRng, Rng, RngCore};

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of random characters in an entity id
pub const ENTITY_ID_LENGTH: usize = 12;

/// Bytes of entropy in a verification token (256 bits)
const SECURE_TOKEN_BYTES: usize = 32;

/// Entity type prefixes for ID generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPrefix {
    /// User (U_)
    User,
    /// Linked OAuth account (A_)
    Account,
    /// Refresh session (S_)
    Session,
    /// Verification token (K_) - K for Key
    Token,
}

impl EntityPrefix {
    /// Get the string prefix for this entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::User => "U",
            EntityPrefix::Account => "A",
            EntityPrefix::Session => "S",
            EntityPrefix::Token => "K",
        }
    }
}

/// Generate a random Crockford Base32 string of specified length
fn generate_crockford_string(length: usize) -> String {
    (0..length)
        .map(|_| {
            let idx = OsRng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Generate a prefixed ID using Crockford Base32 encoding
///
/// # Example
/// ```
/// use authkit::common::id_generator::{generate_id, EntityPrefix};
///
/// let user_id = generate_id(EntityPrefix::User);
/// assert!(user_id.starts_with("U_"));
/// ```
pub fn generate_id(prefix: EntityPrefix) -> String {
    format!(
        "{}_{}",
        prefix.as_str(),
        generate_crockford_string(ENTITY_ID_LENGTH)
    )
}

/// Generate a User ID (U_XXXXXXXXXXXX)
pub fn generate_user_id() -> String {
    generate_id(EntityPrefix::User)
}

/// Generate an Account ID (A_XXXXXXXXXXXX)
pub fn generate_account_id() -> String {
    generate_id(EntityPrefix::Account)
}

/// Generate a Session ID (S_XXXXXXXXXXXX)
pub fn generate_session_id() -> String {
    generate_id(EntityPrefix::Session)
}

/// Generate a Verification Token ID (K_XXXXXXXXXXXX)
pub fn generate_token_id() -> String {
    generate_id(EntityPrefix::Token)
}

/// Opaque single-use secret for email links: 32 random bytes, URL-safe base64.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; SECURE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Nonce for `jti` / `tokenId` claims: base36 millisecond timestamp followed
/// by 16 random base36 characters.
pub fn generate_jwt_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let random: String = (0..16)
        .map(|_| BASE36_ALPHABET[OsRng.gen_range(0..36)] as char)
        .collect();
    format!("{}{}", to_base36(millis), random)
}
