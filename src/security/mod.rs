// ABOUTME: Cryptographic helpers shared by the auth layer: secret generation, API key hashing.
// ABOUTME: No business rules live here, only primitives the auth manager composes.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod api_key;

pub use api_key::{generate_api_key, hash_api_key, GeneratedApiKey};

use sha2::{Digest, Sha256};

/// SHA-256 hex digest, used for API key storage and audit correlation.
#[must_use]
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}
