//! Token storage backends.

use super::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Where the bearer token and the cached user profile are kept.
pub trait TokenStore: Send + Sync {
    fn token(&self) -> Option<String>;

    fn user(&self) -> Option<Value> {
        None
    }

    fn save(&self, token: &str, user: Option<&Value>) -> SessionResult<()>;

    /// Forget token and user. Never fails; storage errors are logged.
    fn clear(&self);
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StoredSession {
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

/// Process-local storage.
#[derive(Default, Debug)]
pub struct MemoryTokenStore {
    inner: RwLock<StoredSession>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(StoredSession {
                token: Some(token.into()),
                user: None,
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        read(&self.inner).token
    }

    fn user(&self) -> Option<Value> {
        read(&self.inner).user
    }

    fn save(&self, token: &str, user: Option<&Value>) -> SessionResult<()> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.token = Some(token.to_string());
        if let Some(user) = user {
            guard.user = Some(user.clone());
        }
        Ok(())
    }

    fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = StoredSession::default();
    }
}

/// JSON file on disk, so a session survives restarts.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<StoredSession>,
}

impl FileTokenStore {
    /// Opens the store, reading any previously saved session. A missing file is an
    /// empty session; an unreadable one is an error.
    pub fn open(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let cached = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SessionError::Storage(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredSession::default(),
            Err(e) => return Err(SessionError::Storage(e.to_string())),
        };

        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, session: &StoredSession) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Storage(e.to_string()))?;
        }
        let bytes = serde_json::to_vec_pretty(session).map_err(|e| SessionError::Storage(e.to_string()))?;
        std::fs::write(&self.path, bytes).map_err(|e| SessionError::Storage(e.to_string()))
    }
}

impl TokenStore for FileTokenStore {
    fn token(&self) -> Option<String> {
        read(&self.cached).token
    }

    fn user(&self) -> Option<Value> {
        read(&self.cached).user
    }

    fn save(&self, token: &str, user: Option<&Value>) -> SessionResult<()> {
        let mut next = read(&self.cached);
        next.token = Some(token.to_string());
        if let Some(user) = user {
            next.user = Some(user.clone());
        }
        self.persist(&next)?;
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = next;
        Ok(())
    }

    fn clear(&self) {
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = StoredSession::default();
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Session file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove session file"),
        }
    }
}

/// Read-only view over a request's `Cookie` header, for server-side rendering.
#[derive(Debug, Clone, Default)]
pub struct CookieTokenStore {
    token: Option<String>,
}

impl CookieTokenStore {
    const COOKIE_NAMES: [&'static str; 2] = ["token", "auth"];

    pub fn from_header(header: &str) -> Self {
        let pairs: Vec<(&str, &str)> = header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let token = Self::COOKIE_NAMES.iter().find_map(|name| {
            pairs
                .iter()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| v.to_string())
        });

        Self { token }
    }
}

impl TokenStore for CookieTokenStore {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }

    fn save(&self, _token: &str, _user: Option<&Value>) -> SessionResult<()> {
        Err(SessionError::Storage("cookie store is read-only".to_string()))
    }

    fn clear(&self) {
        debug!("Ignoring clear on read-only cookie store");
    }
}

fn read(lock: &RwLock<StoredSession>) -> StoredSession {
    lock.read().unwrap_or_else(|e| e.into_inner()).clone()
}
