//! Bearer-token persistence.
//!
//! DESIGN
//! ======
//! Exactly one opaque token, no schema and no expiry metadata: the backend is
//! the only judge of validity. None of the operations can fail from the
//! caller's point of view; storage problems are logged and read as "absent".
//! Each implementation serializes its operations behind a mutex so that
//! overlapping transitions never interleave a `set` with a `clear`.
//!
//! Tokens are stored and returned byte for byte. A blank token is never
//! stored by any implementation: `set` with one behaves like `clear`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Called by the session controller while it holds its sequence lock, so
/// operations should be short.
pub trait TokenStore: Send + Sync {
    /// Stored token, or `None` if unset or storage is unavailable.
    fn get(&self) -> Option<String>;
    /// Overwrite any existing token. A blank `token` clears instead.
    fn set(&self, token: &str);
    /// Remove the token. Idempotent.
    fn clear(&self);

    fn exists(&self) -> bool {
        self.get().is_some()
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-local token storage.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        Self { token: Mutex::new((!is_blank(&token)).then_some(token)) }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, token: &str) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = (!is_blank(token)).then(|| token.to_owned());
    }

    fn clear(&self) {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

// =============================================================================
// NULL
// =============================================================================

/// Used when there is nowhere to persist a token. Every call is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTokenStore;

impl TokenStore for NullTokenStore {
    fn get(&self) -> Option<String> {
        None
    }

    fn set(&self, _token: &str) {}

    fn clear(&self) {}
}

// =============================================================================
// FILE
// =============================================================================

/// Token persisted as the sole content of one file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = open_private(&self.path)?;
        file.write_all(token.as_bytes())?;
        file.sync_all()
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => (!is_blank(&raw)).then_some(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "token read failed");
                None
            }
        }
    }

    fn set(&self, token: &str) {
        if is_blank(token) {
            tracing::debug!("blank token; clearing instead");
            self.clear();
            return;
        }
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.write(token) {
            tracing::warn!(path = %self.path.display(), error = %e, "token write failed");
        }
    }

    fn clear(&self) {
        let _lock = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "token clear failed"),
        }
    }
}

fn is_blank(token: &str) -> bool {
    token.trim().is_empty()
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
