//! The session context: the one place the credential lives.
//!
//! Every reader (route gate, Remote Resource Client) goes through a cloned
//! [`SessionContext`]. Writes are limited to three paths: [`SessionContext::establish`]
//! (login success, requires a [`LoginGrant`]), [`SessionContext::sign_out`]
//! (explicit logout) and [`SessionContext::invalidate`] (authentication
//! failure or a gate rejection).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::token_gate::{self, CredentialClaims, LoginGrant, TokenGateError};

/// Key of the single persisted entry.
pub const CREDENTIAL_KEY: &str = "token";

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("credential store io failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("credential store at {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("credential store lock was poisoned")]
    Poisoned,
}

/// Client-persisted key-value storage holding the credential.
pub trait CredentialStore: fmt::Debug + Send + Sync {
    fn load(&self) -> Result<Option<String>, CredentialStoreError>;
    fn persist(&self, credential: &str) -> Result<(), CredentialStoreError>;
    fn clear(&self) -> Result<(), CredentialStoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            credential: Mutex::new(Some(credential.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>, CredentialStoreError> {
        let guard = self
            .credential
            .lock()
            .map_err(|_| CredentialStoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn persist(&self, credential: &str) -> Result<(), CredentialStoreError> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| CredentialStoreError::Poisoned)?;
        *guard = Some(credential.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| CredentialStoreError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// JSON object on disk, `{"token": "<credential>"}`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CredentialStoreError {
        CredentialStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>, CredentialStoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(self.io_error(error)),
        };
        let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&bytes)
            .map_err(|source| CredentialStoreError::Decode {
                path: self.path.clone(),
                source,
            })?;
        Ok(entries
            .get(CREDENTIAL_KEY)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string))
    }

    fn persist(&self, credential: &str) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| self.io_error(error))?;
        }
        let mut entries = serde_json::Map::new();
        entries.insert(
            CREDENTIAL_KEY.to_string(),
            serde_json::Value::String(credential.to_string()),
        );
        let body = serde_json::Value::Object(entries).to_string();
        std::fs::write(&self.path, body).map_err(|error| self.io_error(error))
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.io_error(error)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    SignedOut,
    Active,
    /// Cleared because the credential was rejected, locally or by the backend.
    Expired,
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    store: Box<dyn CredentialStore>,
    status: watch::Sender<SessionStatus>,
}

impl SessionContext {
    pub fn new(store: impl CredentialStore + 'static) -> Self {
        let initial = match store.load() {
            Ok(Some(_)) => SessionStatus::Active,
            Ok(None) => SessionStatus::SignedOut,
            Err(error) => {
                tracing::warn!(reason = %error, "failed to read stored credential");
                SessionStatus::SignedOut
            }
        };
        let (status, _) = watch::channel(initial);
        Self {
            inner: Arc::new(SessionInner {
                store: Box::new(store),
                status,
            }),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryCredentialStore::default())
    }

    /// Current credential, if one is stored. Store failures read as absent.
    #[must_use]
    pub fn credential(&self) -> Option<String> {
        match self.inner.store.load() {
            Ok(credential) => credential,
            Err(error) => {
                tracing::warn!(reason = %error, "failed to read stored credential");
                None
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    pub fn establish(&self, grant: LoginGrant) -> Result<(), CredentialStoreError> {
        let role = grant.claims().role.clone().unwrap_or_default();
        self.inner.store.persist(&grant.into_token())?;
        self.inner.status.send_replace(SessionStatus::Active);
        tracing::info!(role = %role, "session established");
        Ok(())
    }

    pub fn sign_out(&self) {
        self.clear_store();
        self.inner.status.send_replace(SessionStatus::SignedOut);
        tracing::info!("session signed out");
    }

    /// Authentication failure path: clear the credential and publish
    /// [`SessionStatus::Expired`] so the application root routes to login.
    pub fn invalidate(&self, reason: &str) {
        self.clear_store();
        self.inner.status.send_replace(SessionStatus::Expired);
        tracing::info!(reason, "session invalidated");
    }

    /// Route admission: runs the token gate over the stored credential and
    /// clears it on any failure.
    pub fn admit(&self, now: DateTime<Utc>) -> Result<CredentialClaims, TokenGateError> {
        let credential = self.credential();
        match token_gate::check(credential.as_deref(), now) {
            Ok(claims) => Ok(claims),
            Err(error) => {
                if credential.is_some() {
                    self.invalidate(&error.to_string());
                } else if self.status() == SessionStatus::Active {
                    self.inner.status.send_replace(SessionStatus::SignedOut);
                }
                Err(error)
            }
        }
    }

    fn clear_store(&self) {
        if let Err(error) = self.inner.store.clear() {
            tracing::warn!(reason = %error, "failed to clear stored credential");
        }
    }
}
