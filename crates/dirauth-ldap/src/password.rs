//! Directory password hashing (RFC 2307 `{SSHA}`).

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use sha1::{Digest, Sha1};

/// Attribute holding the entry's password.
pub const PASSWORD_ATTRIBUTE: &str = "userPassword";

const SALT_LEN: usize = 8;
const DIGEST_LEN: usize = 20;

/// Generates a salted `{SSHA}` password value for a directory modify.
#[must_use]
pub fn generate_ssha(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    ssha_with_salt(password, &salt)
}

pub(crate) fn ssha_with_salt(password: &str, salt: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let digest = hasher.finalize();

    let mut raw = Vec::with_capacity(DIGEST_LEN + salt.len());
    raw.extend_from_slice(&digest);
    raw.extend_from_slice(salt);
    format!("{{SSHA}}{}", STANDARD.encode(raw))
}

/// Verifies a plaintext password against an `{SSHA}` value.
#[must_use]
pub fn verify_ssha(password: &str, hashed: &str) -> bool {
    let Some(encoded) = hashed.strip_prefix("{SSHA}") else {
        return false;
    };
    let Ok(raw) = STANDARD.decode(encoded) else {
        return false;
    };
    if raw.len() < DIGEST_LEN {
        return false;
    }

    let (digest, salt) = raw.split_at(DIGEST_LEN);
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    hasher.finalize().as_slice() == digest
}
