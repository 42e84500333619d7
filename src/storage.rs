//! Session persistence - the identity saved after login
//!
//! The request client never reaches for ambient storage; it is handed a
//! [`Session`] that wraps whichever [`SessionStore`] the caller chose.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session storage failed: {0}")]
    Io(#[from] io::Error),

    #[error("Session file is corrupt: {0}")]
    Corrupt(#[from] serde_yaml::Error),

    #[error("Session store lock poisoned")]
    Poisoned,
}

/// What a successful login leaves behind
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    /// Opaque token issued by the backend. Persisted, never sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, token: Option<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            token,
        }
    }
}

/// Secure local storage for the identity
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Identity>, StorageError>;
    fn save(&self, identity: &Identity) -> Result<(), StorageError>;
    /// Must succeed when nothing is stored
    fn clear(&self) -> Result<(), StorageError>;
}

/// Identity kept as a YAML file readable only by the owner
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSessionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Identity>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_yaml::from_str(&content)?))
    }

    fn save(&self, identity: &Identity) -> Result<(), StorageError> {
        self.ensure_dir()?;
        let content = serde_yaml::to_string(identity)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // mode() only applies on creation; tighten files left by older runs
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, for tests and embedding
#[derive(Default)]
pub struct MemorySessionStore {
    identity: Mutex<Option<Identity>>,
}

impl MemorySessionStore {
    pub fn with_identity(identity: Identity) -> Self {
        MemorySessionStore {
            identity: Mutex::new(Some(identity)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Identity>, StorageError> {
        let guard = self.identity.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, identity: &Identity) -> Result<(), StorageError> {
        let mut guard = self.identity.lock().map_err(|_| StorageError::Poisoned)?;
        *guard = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self.identity.lock().map_err(|_| StorageError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// Shared handle to the persisted identity. Every read goes to the store,
/// so the last write wins.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: impl SessionStore + 'static) -> Self {
        Session {
            store: Arc::new(store),
        }
    }

    pub fn from_store(store: Arc<dyn SessionStore>) -> Self {
        Session { store }
    }

    pub fn in_memory() -> Self {
        Session::new(MemorySessionStore::default())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Session::new(FileSessionStore::new(path))
    }

    pub fn identity(&self) -> Result<Option<Identity>, StorageError> {
        self.store.load()
    }

    pub fn user_id(&self) -> Result<Option<String>, StorageError> {
        Ok(self.identity()?.map(|identity| identity.user_id))
    }

    pub fn is_present(&self) -> Result<bool, StorageError> {
        Ok(self.identity()?.is_some())
    }

    pub fn persist(&self, identity: &Identity) -> Result<(), StorageError> {
        tracing::debug!(user_id = %identity.user_id, "Persisting session");
        self.store.save(identity)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        tracing::debug!("Clearing session");
        self.store.clear()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
