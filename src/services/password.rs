//! Salted PBKDF2-SHA256 password hashes.
//!
//! Stored form: `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`. The
//! iteration count travels with the hash, so raising the configured count
//! only affects new credentials.

use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::auth::{bytes_to_hex, hex_to_bytes};

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

#[must_use]
pub fn hash_password(password: &str, iterations: u32) -> String {
    let salt: [u8; SALT_LENGTH] = rand::rng().random();
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);
    format!("{SCHEME}${iterations}${}${}", bytes_to_hex(&salt), bytes_to_hex(&hash))
}

/// True when `password` matches `stored`. Malformed stored values never match.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Some(salt), Some(expected)) = (hex_to_bytes(salt), hex_to_bytes(expected)) else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LENGTH {
        return false;
    }

    let mut actual = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

#[cfg(test)]
#[path = "password_test.rs"]
mod tests;
