//! Session identity: where the bearer token lives and who it says the user is.
//!
//! The token in the active [`TokenStore`] is the single source of identity. There is
//! no fallback user id: a missing or unreadable token is `Unauthenticated`.

pub mod jwt;
pub mod store;

pub use jwt::Claims;
pub use store::{CookieTokenStore, FileTokenStore, MemoryTokenStore, StoredSession, TokenStore};

use chrono::Utc;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No authenticated session")]
    Unauthenticated,
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Token carries no user id claim")]
    MissingUserId,
    #[error("Session storage failed: {0}")]
    Storage(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Backend user id. Serialized as a JSON number when it is numeric, which is what
/// the backend's request models expect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::default()))
    }

    pub fn store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.store)
    }

    pub fn token(&self) -> Option<String> {
        self.store.token()
    }

    pub fn claims(&self) -> SessionResult<Claims> {
        let token = self.store.token().ok_or(SessionError::Unauthenticated)?;
        Claims::decode(&token)
    }

    /// The current user's id, read from the token's `sub`, `user_id` or `id` claim.
    pub fn user_id(&self) -> SessionResult<UserId> {
        self.claims()?.user_id().ok_or(SessionError::MissingUserId)
    }

    /// True when a decodable, unexpired token is stored.
    pub fn is_authenticated(&self) -> bool {
        match self.claims() {
            Ok(claims) => !claims.is_expired_at(Utc::now()),
            Err(_) => false,
        }
    }

    pub fn sign_in(&self, token: &str, user: Option<&serde_json::Value>) -> SessionResult<()> {
        if token.trim().is_empty() {
            return Err(SessionError::MalformedToken("empty token".to_string()));
        }
        self.store.save(token, user)
    }

    pub fn sign_out(&self) {
        self.store.clear();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_token", &self.store.token().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests;
