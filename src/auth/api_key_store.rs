// ABOUTME: ApiKey - a long-lived credential bound to a Principal, looked up by hash or partial.
// ABOUTME: Creation returns the full key exactly once; storage keeps only hash + partial form.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::principal::Principal;
use crate::errors::{AppError, AppResult};
use crate::security::{generate_api_key, hash_api_key};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// A long-lived API key record. The plaintext key is never stored.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub key_hash: String,
    pub key_prefix: String,
    pub principal: Principal,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.enabled && self.expires_at.map_or(true, |exp| Utc::now() <= exp)
    }
}

/// In-memory API key table, guarded by a reader-writer lock (spec §5).
pub struct ApiKeyStore {
    keys: RwLock<HashMap<String, ApiKey>>,
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a new API key for `principal`. Returns the full key (shown once)
    /// together with the stored record. Trial keys expire 30 days from now.
    pub fn create(&self, mut principal: Principal, is_trial: bool) -> (String, ApiKey) {
        let generated = generate_api_key(is_trial);
        let expires_at = if is_trial {
            Some(Utc::now() + Duration::days(30))
        } else {
            None
        };
        principal.kind = super::principal::PrincipalKind::ApiKey;
        let record = ApiKey {
            key_hash: generated.key_hash.clone(),
            key_prefix: generated.key_prefix,
            principal,
            enabled: true,
            created_at: Utc::now(),
            expires_at,
        };
        self.keys
            .write()
            .expect("api key store lock poisoned")
            .insert(generated.key_hash.clone(), record.clone());
        (generated.full_key, record)
    }

    /// Validate a caller-supplied key, returning its `Principal` on success.
    ///
    /// # Errors
    /// Returns `InvalidKey` if unknown, `ToolDisabled`-adjacent `Conflict` is
    /// not used here: disabled/expired keys map to `InvalidKey`/`Conflict`
    /// per spec §7 (auth failures are always 401-class, not 409).
    pub fn validate(&self, full_key: &str) -> AppResult<Principal> {
        let hash = hash_api_key(full_key);
        let keys = self.keys.read().expect("api key store lock poisoned");
        let record = keys
            .get(&hash)
            .ok_or_else(|| AppError::new(crate::errors::ErrorKind::InvalidKey, "unknown API key"))?;
        if !record.enabled {
            return Err(AppError::new(crate::errors::ErrorKind::InvalidKey, "API key disabled"));
        }
        if let Some(exp) = record.expires_at {
            if Utc::now() > exp {
                return Err(AppError::new(crate::errors::ErrorKind::InvalidKey, "API key expired"));
            }
        }
        Ok(record.principal.clone())
    }

    /// Disable a key by its stored hash. Admin operation.
    pub fn disable(&self, key_hash: &str) -> AppResult<()> {
        let mut keys = self.keys.write().expect("api key store lock poisoned");
        let record = keys
            .get_mut(key_hash)
            .ok_or_else(|| AppError::tool_not_found(key_hash))?;
        record.enabled = false;
        Ok(())
    }

    /// Re-enable a previously disabled key by its stored hash. Admin operation.
    pub fn enable(&self, key_hash: &str) -> AppResult<()> {
        let mut keys = self.keys.write().expect("api key store lock poisoned");
        let record = keys
            .get_mut(key_hash)
            .ok_or_else(|| AppError::tool_not_found(key_hash))?;
        record.enabled = true;
        Ok(())
    }

    /// Delete a key by its stored hash, preserving no trail in the store
    /// itself (audit records live in the envelope's audit log, untouched).
    pub fn delete(&self, key_hash: &str) -> AppResult<()> {
        self.keys
            .write()
            .expect("api key store lock poisoned")
            .remove(key_hash)
            .map(|_| ())
            .ok_or_else(|| AppError::tool_not_found(key_hash))
    }

    /// Look up a key record by its displayable partial form (first 12 chars).
    #[must_use]
    pub fn find_by_partial(&self, partial: &str) -> Option<ApiKey> {
        self.keys
            .read()
            .expect("api key store lock poisoned")
            .values()
            .find(|k| k.key_prefix == partial)
            .cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<ApiKey> {
        self.keys
            .read()
            .expect("api key store lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}
