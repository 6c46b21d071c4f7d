//! Secure storage for the bearer credential.
//!
//! The host platform owns the actual secure storage (keychain, keystore); this
//! module models it as a single fallible key/value slot under the `authToken`
//! key. Callers treat any read failure as "no valid token".

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

/// Storage key under which the bearer token is persisted.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Failure while reading or writing the underlying secure storage.
#[derive(Debug, Error)]
#[error("token storage failure: {0}")]
pub struct TokenStoreError(#[from] std::io::Error);

/// Persistence for the single bearer credential.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Retrieve the stored token, if any.
    async fn get(&self) -> Result<Option<String>, TokenStoreError>;

    /// Persist a token, replacing any previous value.
    async fn set(&self, token: &str) -> Result<(), TokenStoreError>;

    /// Delete the stored token. Deleting an absent token is not an error.
    async fn clear(&self) -> Result<(), TokenStoreError>;
}

/// File-backed token store: one file named for [`AUTH_TOKEN_KEY`] inside a
/// directory the host designates as secure (app-private storage on device).
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            path: storage_dir.as_ref().join(AUTH_TOKEN_KEY),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self) -> Result<Option<String>, TokenStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim().to_string();
                Ok((!token.is_empty()).then_some(token))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, token: &str) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, token).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory token store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a token already present.
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.token.lock().await.clone())
    }

    async fn set(&self, token: &str) -> Result<(), TokenStoreError> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        *self.token.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileTokenStore::new(dir.path());

        assert!(store.get().await.unwrap().is_none());

        store.set("tok-123").await.unwrap();
        assert_eq!(store.get().await.unwrap().as_deref(), Some("tok-123"));

        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_clear_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileTokenStore::new(dir.path());

        store.clear().await.unwrap();
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_replaces_value() {
        let store = MemoryTokenStore::with_token("old");
        store.set("new").await.unwrap();
        assert_eq!(store.get().await.unwrap().as_deref(), Some("new"));
    }
}
