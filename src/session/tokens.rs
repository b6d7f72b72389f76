//! Durable storage for the access/refresh token pair.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use lines_common::TokenPair;

use crate::errors::SessionError;

/// Key-value store that survives restarts. Tokens are stored as-is, not
/// encrypted.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<TokenPair>, SessionError>;
    async fn save(&self, tokens: &TokenPair) -> Result<(), SessionError>;
    async fn clear(&self) -> Result<(), SessionError>;
}

/// Tokens in a JSON file: `{"accessToken": "...", "refreshToken": "..."}`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> SessionError {
        SessionError::TokenStore {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>, SessionError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| SessionError::CorruptTokens {
                path: self.path.clone(),
                source,
            })
    }

    async fn save(&self, tokens: &TokenPair) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(tokens).map_err(|source| {
            SessionError::CorruptTokens {
                path: self.path.clone(),
                source,
            }
        })?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_err(e))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

/// In-process store, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    pub fn current(&self) -> Option<TokenPair> {
        self.tokens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>, SessionError> {
        Ok(self.current())
    }

    async fn save(&self, tokens: &TokenPair) -> Result<(), SessionError> {
        *self.tokens.lock().unwrap_or_else(|p| p.into_inner()) = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        *self.tokens.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_clear() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested/tokens.json"));
        assert_eq!(store.load().await.unwrap(), None);

        store.save(&pair()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(pair()));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("accessToken"));
        assert!(raw.contains("refreshToken"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_reports_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();
        let err = FileTokenStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, SessionError::CorruptTokens { .. }));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::new();
        store.save(&pair()).await.unwrap();
        assert_eq!(store.current(), Some(pair()));
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
