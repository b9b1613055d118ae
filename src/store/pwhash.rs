//! Password verifier format shared by both store implementations.
//!
//! spec.md puts the hashing *algorithm* out of scope (password hashing is a
//! named external collaborator, §1); this is a minimal salted-SHA256
//! verifier so the stores are runnable, not a production recommendation.

use rand::RngCore;
use sha2::{Digest, Sha256};

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns an opaque `"<salt_hex>$<digest_hex>"` verifier.
pub fn hash(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);
    format!("{}${}", salt_hex, digest(&salt, password))
}

/// Checks `password` against a verifier produced by [`hash`].
pub fn verify(password: &str, verifier: &str) -> bool {
    let Some((salt_hex, expected)) = verifier.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    digest(&salt, password) == expected
}
