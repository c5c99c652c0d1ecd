// ABOUTME: API key generation in the two flavours the spec recovers from the original: live/trial.
// ABOUTME: The full key is only ever returned once by the caller of generate_api_key.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::sha256_hex;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// The three pieces produced when a new API key is minted. `full_key` is shown
/// to the caller exactly once; only `key_hash` and `key_prefix` are persisted.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    pub full_key: String,
    pub key_prefix: String,
    pub key_hash: String,
}

const PARTIAL_LEN: usize = 12;
const RANDOM_LEN: usize = 32;

/// Generate a new API key. `is_trial` selects the `sk_trial_` prefix (spec
/// §4.3 supplement); otherwise the long-lived `sk_live_` prefix is used.
#[must_use]
pub fn generate_api_key(is_trial: bool) -> GeneratedApiKey {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_LEN)
        .map(char::from)
        .collect();

    let prefix = if is_trial { "sk_trial_" } else { "sk_live_" };
    let full_key = format!("{prefix}{random}");
    let key_prefix = full_key.chars().take(PARTIAL_LEN).collect();
    let key_hash = sha256_hex(&full_key);

    GeneratedApiKey {
        full_key,
        key_prefix,
        key_hash,
    }
}

/// Hash a caller-supplied API key the same way `generate_api_key` hashes a
/// freshly minted one, so lookups can compare hashes rather than plaintext.
#[must_use]
pub fn hash_api_key(full_key: &str) -> String {
    sha256_hex(full_key)
}

/// Whether a full key string identifies itself as a trial key by prefix.
#[must_use]
pub fn is_trial_key(full_key: &str) -> bool {
    full_key.starts_with("sk_trial_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_keys_use_live_prefix_and_correct_length() {
        let key = generate_api_key(false);
        assert!(key.full_key.starts_with("sk_live_"));
        assert_eq!(key.full_key.len(), "sk_live_".len() + RANDOM_LEN);
        assert_eq!(key.key_prefix.len(), PARTIAL_LEN);
        assert_eq!(key.key_hash, hash_api_key(&key.full_key));
    }

    #[test]
    fn trial_keys_use_trial_prefix() {
        let key = generate_api_key(true);
        assert!(key.full_key.starts_with("sk_trial_"));
        assert!(is_trial_key(&key.full_key));
        assert!(!is_trial_key("sk_live_abc"));
    }

    #[test]
    fn two_generated_keys_never_collide() {
        let a = generate_api_key(false);
        let b = generate_api_key(false);
        assert_ne!(a.full_key, b.full_key);
    }
}
