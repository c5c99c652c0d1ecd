// ABOUTME: AuthManager - credential verification, session lifecycle, principal resolution.
// ABOUTME: Owns the SessionStore and ApiKeyStore; bearer tokens are opaque UUIDs, not JWTs,
// ABOUTME: because sessions are explicitly in-memory-only (spec §9 Open Question).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::api_key_store::ApiKeyStore;
use super::principal::{Principal, PrincipalKind};
use super::session::{Session, SessionStore};
use crate::errors::{AppError, AppResult, ErrorKind};
use axum::http::HeaderMap;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

/// A basic-credential login request. The spec's REST surface accepts any of
/// `user_id`/`username`/`uid`/`user_name` as the identity field.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BasicCredentials {
    #[serde(alias = "username", alias = "uid", alias = "user_name")]
    pub user_id: String,
    pub password: String,
}

struct UserRecord {
    principal: Principal,
    password_hash: String,
}

/// Credentials verification, session and API-key lifecycle, principal
/// resolution from an inbound request (spec §4.3).
pub struct AuthManager {
    users: RwLock<HashMap<String, UserRecord>>,
    sessions: SessionStore,
    api_keys: ApiKeyStore,
}

impl AuthManager {
    #[must_use]
    pub fn new(session_timeout_hours: i64) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sessions: SessionStore::new(session_timeout_hours),
            api_keys: ApiKeyStore::new(),
        }
    }

    #[must_use]
    pub fn api_keys(&self) -> &ApiKeyStore {
        &self.api_keys
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Seed a user account with a bcrypt-hashed password. Newly created admin
    /// accounts always go through this path, never plaintext (spec §4.3 supplement).
    ///
    /// # Errors
    /// Returns `Internal` if bcrypt hashing fails.
    pub fn create_user(&self, user_id: &str, password: &str, principal: Principal) -> AppResult<()> {
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::internal(format!("failed to hash password: {e}")))?;
        self.users
            .write()
            .expect("user table lock poisoned")
            .insert(
                user_id.to_string(),
                UserRecord {
                    principal,
                    password_hash: hash,
                },
            );
        Ok(())
    }

    /// Verify basic credentials and create a session.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` if the user is unknown or the password
    /// does not match.
    pub fn authenticate_basic(&self, creds: &BasicCredentials) -> AppResult<Session> {
        let users = self.users.read().expect("user table lock poisoned");
        let user = users
            .get(&creds.user_id)
            .ok_or_else(|| AppError::new(ErrorKind::InvalidCredentials, "unknown user"))?;
        let ok = bcrypt::verify(&creds.password, &user.password_hash)
            .map_err(|e| AppError::internal(format!("bcrypt verification failed: {e}")))?;
        if !ok {
            return Err(AppError::new(ErrorKind::InvalidCredentials, "invalid password"));
        }
        let principal = user.principal.clone();
        drop(users);
        let token = Uuid::new_v4().to_string();
        Ok(self.sessions.create(token, principal))
    }

    /// Validate a bearer token.
    ///
    /// # Errors
    /// Returns `InvalidToken` if the token is unknown or has timed out.
    pub fn validate_bearer(&self, token: &str) -> AppResult<Session> {
        self.sessions
            .validate(token)
            .ok_or_else(|| AppError::new(ErrorKind::InvalidToken, "invalid or expired session token"))
    }

    /// Destroy a session by token (explicit logout).
    pub fn logout(&self, token: &str) {
        self.sessions.destroy(token);
    }

    /// Validate an API key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the key is unknown, disabled, or expired.
    pub fn validate_api_key(&self, key: &str) -> AppResult<Principal> {
        self.api_keys.validate(key)
    }

    /// Resolve a principal from inbound request headers: `X-API-Key` takes
    /// priority, falling back to `Authorization: Bearer <token>` (spec §4.3).
    ///
    /// # Errors
    /// Returns `InvalidKey`/`InvalidToken` per the failing credential, or
    /// `InvalidCredentials` if neither header is present.
    pub fn resolve_request(&self, headers: &HeaderMap) -> AppResult<Principal> {
        if let Some(key) = headers.get("X-API-Key").and_then(|v| v.to_str().ok()) {
            return self.validate_api_key(key);
        }
        if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
            if let Some(token) = auth.strip_prefix("Bearer ") {
                return self.validate_bearer(token).map(|s| s.principal);
            }
        }
        Err(AppError::new(
            ErrorKind::InvalidCredentials,
            "no X-API-Key or Authorization: Bearer header present",
        ))
    }

    /// Whether `user_id` is an admin account that may not be disabled/deleted
    /// (spec §4.3: "an admin user cannot be disabled or deleted — Conflict otherwise").
    #[must_use]
    pub fn is_protected_admin(&self, user_id: &str) -> bool {
        self.users
            .read()
            .expect("user table lock poisoned")
            .get(user_id)
            .is_some_and(Self::record_is_admin)
    }

    fn record_is_admin(record: &UserRecord) -> bool {
        record.principal.is_admin()
    }

    /// List every seeded user account's resolved principal, for the admin
    /// user-management surface (spec §6 "user CRUD under `/api/admin/users`").
    #[must_use]
    pub fn list_users(&self) -> Vec<Principal> {
        let users = self.users.read().expect("user table lock poisoned");
        let mut list: Vec<Principal> = users.values().map(|record| record.principal.clone()).collect();
        list.sort_by(|a, b| a.principal_id.cmp(&b.principal_id));
        list
    }

    /// Delete a user account.
    ///
    /// # Errors
    /// Returns `Conflict` if the target is a protected admin account.
    pub fn delete_user(&self, user_id: &str) -> AppResult<()> {
        if self.is_protected_admin(user_id) {
            return Err(AppError::conflict("admin account cannot be deleted"));
        }
        self.users
            .write()
            .expect("user table lock poisoned")
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| AppError::tool_not_found(user_id))
    }
}

/// Build a `Principal` from allow-list/regex inputs, deriving `tool_access_mode`.
#[must_use]
pub fn build_principal(
    principal_id: impl Into<String>,
    kind: PrincipalKind,
    roles: HashSet<String>,
    allowed_tools: HashSet<String>,
    allowed_patterns: Vec<String>,
) -> Principal {
    let mode = Principal::derive_access_mode(&allowed_tools, &allowed_patterns);
    Principal {
        principal_id: principal_id.into(),
        kind,
        roles,
        tool_access_mode: mode,
        allowed_tools,
        allowed_patterns,
        rate_limit: None,
        expires_at: None,
        tenant_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_basic_then_validate_bearer_yields_same_principal() {
        let mgr = AuthManager::new(24);
        let principal = Principal::admin("alice");
        mgr.create_user("alice", "hunter2", principal).unwrap();

        let session = mgr
            .authenticate_basic(&BasicCredentials {
                user_id: "alice".to_string(),
                password: "hunter2".to_string(),
            })
            .expect("login should succeed");

        let validated = mgr.validate_bearer(&session.token).expect("token should validate");
        assert_eq!(validated.principal.principal_id, "alice");

        mgr.logout(&session.token);
        assert!(mgr.validate_bearer(&session.token).is_err());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let mgr = AuthManager::new(24);
        mgr.create_user("bob", "correct", Principal::admin("bob")).unwrap();
        let err = mgr
            .authenticate_basic(&BasicCredentials {
                user_id: "bob".to_string(),
                password: "wrong".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
    }

    #[test]
    fn admin_user_cannot_be_deleted() {
        let mgr = AuthManager::new(24);
        mgr.create_user("root", "x", Principal::admin("root")).unwrap();
        let err = mgr.delete_user("root").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn resolve_request_prefers_api_key_over_bearer() {
        let mgr = AuthManager::new(24);
        let (full_key, _) = mgr.api_keys().create(
            build_principal(
                "svc",
                PrincipalKind::ApiKey,
                HashSet::new(),
                HashSet::from(["echo".to_string()]),
                Vec::new(),
            ),
            false,
        );
        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", full_key.parse().unwrap());
        headers.insert("Authorization", "Bearer not-a-real-token".parse().unwrap());
        let principal = mgr.resolve_request(&headers).expect("should resolve via API key");
        assert_eq!(principal.principal_id, "svc");
    }
}
