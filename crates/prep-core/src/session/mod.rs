//! Credential storage and the authenticated-session handle.
//!
//! The chat pipeline never touches stored credentials directly. It asks a
//! [`Session`] whether the user is authenticated and for the bearer token;
//! the session reads through an injected [`CredentialStore`].

mod monitor;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

pub use monitor::{SessionCheck, SessionMonitor};

/// Stored login: bearer token, its expiry, and the backend's user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

impl Credentials {
    /// A token is expired once `now` is strictly past its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Persistence seam for credentials.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>>;
    fn save(&self, credentials: &Credentials) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON file store (`$PREP_HOME/session.json`).
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session from {}", self.path.display()))?;
        let credentials = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", self.path.display()))?;
        Ok(Some(credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let body = serde_json::to_string_pretty(credentials)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, body)
            .with_context(|| format!("Failed to write session to {}", tmp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", tmp_path.display()))?;
        }

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// In-process store, used by tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store poisoned"))?;
        *guard = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store poisoned"))?;
        *guard = None;
        Ok(())
    }
}

/// Shared session handle.
///
/// Cloning is cheap; all clones observe the same store and the same
/// authenticated/logged-out signal.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
    status: Arc<watch::Sender<bool>>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let authenticated = match store.load() {
            Ok(Some(credentials)) => !credentials.is_expired_at(Utc::now()),
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "Ignoring unreadable session");
                false
            }
        };
        let (status, _) = watch::channel(authenticated);
        Self {
            store,
            status: Arc::new(status),
        }
    }

    /// Session backed by `$PREP_HOME/session.json`.
    pub fn from_default_path() -> Self {
        Self::new(Arc::new(FileCredentialStore::new(
            crate::config::paths::session_path(),
        )))
    }

    /// Returns stored credentials, expired or not.
    ///
    /// An unreadable store counts as logged out and is cleared.
    pub fn credentials(&self) -> Option<Credentials> {
        match self.store.load() {
            Ok(credentials) => credentials,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "Unreadable session, logging out");
                self.logout();
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.credentials()
            .is_some_and(|c| !c.token.is_empty() && !c.is_expired_at(now))
    }

    pub fn token(&self) -> Option<String> {
        self.credentials().map(|c| c.token)
    }

    pub fn user(&self) -> Option<Value> {
        self.credentials().and_then(|c| c.user)
    }

    pub fn login(&self, credentials: &Credentials) -> Result<()> {
        self.store.save(credentials)?;
        tracing::info!(expires_at = %credentials.expires_at, "Logged in");
        self.status.send_replace(true);
        Ok(())
    }

    /// Clears stored credentials and notifies subscribers.
    pub fn logout(&self) {
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %format!("{err:#}"), "Failed to clear stored session");
        }
        if self.status.send_replace(false) {
            tracing::info!("Logged out");
        }
    }

    /// Receiver that flips to `false` when the session is logged out.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}
