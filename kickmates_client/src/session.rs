//! Explicit authentication handle.
//!
//! The token and current user live in one shared [`Session`] that is passed to
//! whatever needs them (the API client, the CLI). A JSON file in the data
//! directory keeps the session across runs.

use crate::error::Result;
use crate::models::{AuthResponse, User};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

impl From<AuthResponse> for AuthSession {
    fn from(auth: AuthResponse) -> Self {
        Self {
            token: auth.token,
            user: auth.user,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session. A missing file means logged out; an
    /// unreadable one is discarded.
    pub fn load(&self) -> Result<Option<AuthSession>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "discarding corrupt session file");
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &AuthSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(session)?)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    current: Arc<RwLock<Option<AuthSession>>>,
    store: Option<SessionStore>,
}

impl Session {
    /// A session that lives only in memory.
    pub fn ephemeral() -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            store: None,
        }
    }

    pub fn load(store: SessionStore) -> Result<Self> {
        let current = store.load()?;
        if let Some(session) = &current {
            tracing::info!(user = %session.user.username, "restored saved session");
        }
        Ok(Self {
            current: Arc::new(RwLock::new(current)),
            store: Some(store),
        })
    }

    pub fn establish(&self, auth: impl Into<AuthSession>) -> Result<()> {
        let auth = auth.into();
        if let Some(store) = &self.store {
            store.save(&auth)?;
        }
        tracing::info!(user = %auth.user.username, "session established");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(auth);
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.teardown()?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Drops the session after the server rejected its token.
    pub fn invalidate(&self) -> Result<()> {
        if self.is_authenticated() {
            tracing::warn!("server rejected session token, clearing session");
        }
        self.teardown()
    }

    fn teardown(&self) -> Result<()> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        if let Some(store) = &self.store {
            store.clear()?;
        }
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn user(&self) -> Option<User> {
        self.current().map(|session| session.user)
    }

    /// `Authorization` header value for the current token.
    pub fn bearer(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| format!("Bearer {}", session.token))
    }
}
