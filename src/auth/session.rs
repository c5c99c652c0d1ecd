// ABOUTME: Session - a short-lived bearer-token credential binding to a Principal.
// ABOUTME: In-memory only (spec §9 Open Question: session persistence is a deployment decision).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::principal::Principal;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// A session binds a bearer token to a `Principal` for a bounded lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// In-memory session table guarded by a reader-writer lock (spec §5): reads
/// (`validate`) are parallel, writes (`create`/`destroy`) are exclusive.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    timeout: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(timeout_hours: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout: Duration::hours(timeout_hours),
        }
    }

    /// Create a new session bound to `principal`, returning the bearer token.
    pub fn create(&self, token: String, principal: Principal) -> Session {
        let now = Utc::now();
        let session = Session {
            token: token.clone(),
            principal,
            created_at: now,
            last_used_at: now,
        };
        self.sessions
            .write()
            .expect("session store lock poisoned")
            .insert(token, session.clone());
        session
    }

    /// Validate a bearer token, refreshing `last_used_at` on success. Returns
    /// `None` if the token is unknown or has exceeded the inactivity timeout.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().expect("session store lock poisoned");
        let session = sessions.get_mut(token)?;
        if Utc::now() - session.last_used_at > self.timeout {
            sessions.remove(token);
            return None;
        }
        session.last_used_at = Utc::now();
        Some(session.clone())
    }

    /// Destroy a session on explicit logout. No-op if the token is unknown.
    pub fn destroy(&self, token: &str) {
        self.sessions
            .write()
            .expect("session store lock poisoned")
            .remove(token);
    }

    /// Number of currently live sessions, for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().expect("session store lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_after_logout_returns_none() {
        let store = SessionStore::new(24);
        let session = store.create("tok-1".to_string(), Principal::admin("root"));
        assert!(store.validate(&session.token).is_some());
        store.destroy(&session.token);
        assert!(store.validate(&session.token).is_none());
    }

    #[test]
    fn validate_expires_after_inactivity_timeout() {
        let store = SessionStore::new(0);
        let session = store.create("tok-2".to_string(), Principal::admin("root"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.validate(&session.token).is_none());
    }
}
