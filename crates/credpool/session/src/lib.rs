//! Session gate for the credpool engine.
//!
//! A deliberately minimal shared-passphrase gate: a fixed allow-set of
//! passphrases, not per-user credentials. Sessions are process-lifetime
//! only and never persisted. Every inventory operation is refused unless
//! the caller holds a session.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;

/// An authenticated caller's ephemeral state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub display_name: String,
    pub logged_in_at: DateTime<Utc>,
}

/// Gate mapping caller identities to sessions.
pub struct SessionGate {
    passphrases: HashSet<String>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionGate {
    /// Create a gate with a fixed allow-set of passphrases. An empty set
    /// means nobody can log in.
    pub fn new(passphrases: impl IntoIterator<Item = String>) -> Self {
        Self {
            passphrases: passphrases.into_iter().collect(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Check a secret against the allow-set; on match create or overwrite
    /// the caller's session.
    pub fn login(
        &self,
        identity: &str,
        display_name: &str,
        secret: &str,
    ) -> Result<Session, SessionError> {
        if !self.passphrases.contains(secret) {
            return Err(SessionError::InvalidSecret);
        }
        let session = Session {
            display_name: display_name.to_string(),
            logged_in_at: Utc::now(),
        };
        let mut sessions = self.sessions.write().map_err(|_| SessionError::LockError)?;
        sessions.insert(identity.to_string(), session.clone());
        Ok(session)
    }

    pub fn is_authenticated(&self, identity: &str) -> bool {
        self.sessions
            .read()
            .map(|sessions| sessions.contains_key(identity))
            .unwrap_or(false)
    }

    /// The caller's session, if authenticated.
    pub fn session(&self, identity: &str) -> Option<Session> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(identity).cloned())
    }

    pub fn logout(&self, identity: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::LockError)?;
        sessions
            .remove(identity)
            .map(|_| ())
            .ok_or(SessionError::WasNotAuthenticated)
    }
}

/// Session-related errors. Purely informational; no storage side effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid passphrase")]
    InvalidSecret,

    #[error("not logged in")]
    WasNotAuthenticated,

    #[error("session lock poisoned")]
    LockError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SessionGate {
        SessionGate::new(["hunter2".to_string(), "swordfish".to_string()])
    }

    #[test]
    fn valid_passphrase_creates_a_session() {
        let gate = gate();
        let session = gate.login("42", "alice", "hunter2").unwrap();
        assert_eq!(session.display_name, "alice");
        assert!(gate.is_authenticated("42"));
        assert_eq!(gate.session("42").unwrap().display_name, "alice");
    }

    #[test]
    fn invalid_passphrase_is_rejected() {
        let gate = gate();
        assert!(matches!(
            gate.login("42", "alice", "wrong"),
            Err(SessionError::InvalidSecret)
        ));
        assert!(!gate.is_authenticated("42"));
    }

    #[test]
    fn relogin_overwrites_the_session() {
        let gate = gate();
        gate.login("42", "alice", "hunter2").unwrap();
        gate.login("42", "alice-renamed", "swordfish").unwrap();
        assert_eq!(gate.session("42").unwrap().display_name, "alice-renamed");
    }

    #[test]
    fn logout_requires_a_session() {
        let gate = gate();
        assert_eq!(gate.logout("42"), Err(SessionError::WasNotAuthenticated));

        gate.login("42", "alice", "hunter2").unwrap();
        assert_eq!(gate.logout("42"), Ok(()));
        assert!(!gate.is_authenticated("42"));
    }

    #[test]
    fn empty_allow_set_rejects_everyone() {
        let gate = SessionGate::new(Vec::new());
        assert!(matches!(
            gate.login("42", "alice", "anything"),
            Err(SessionError::InvalidSecret)
        ));
    }
}
