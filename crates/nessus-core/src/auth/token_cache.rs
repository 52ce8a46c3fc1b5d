use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Token;
use crate::api::{ApiError, Result};

/// Default token file, relative to the working directory
pub const DEFAULT_TOKEN_FILE: &str = ".nessus_token";

/// Where a session token survives between process runs.
///
/// One token per location: two sessions sharing a cache overwrite each other.
pub trait TokenCache {
    /// The persisted token, if there is a usable one
    fn load(&self) -> Option<Token>;

    fn save(&self, token: &Token) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    token: Token,
    saved_at: DateTime<Utc>,
}

/// Token persisted as a small JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Remove the persisted token
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| ApiError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        }
        Ok(())
    }

    fn read(&self) -> std::result::Result<Option<CachedToken>, String> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        let cached: CachedToken = serde_json::from_str(&contents).map_err(|e| e.to_string())?;
        Ok(Some(cached))
    }
}

impl Default for FileTokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_FILE)
    }
}

impl TokenCache for FileTokenCache {
    fn load(&self) -> Option<Token> {
        match self.read() {
            Ok(Some(cached)) if !cached.token.is_empty() => {
                debug!(
                    path = %self.path.display(),
                    saved_at = %cached.saved_at,
                    "Loaded cached token"
                );
                Some(cached.token)
            }
            Ok(Some(_)) => {
                warn!(
                    path = %self.path.display(),
                    "Token file holds an empty token, ignoring"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Unreadable token file, ignoring"
                );
                None
            }
        }
    }

    fn save(&self, token: &Token) -> Result<()> {
        let persist_err =
            |e: String| ApiError::Persistence(format!("{}: {}", self.path.display(), e));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }
        let cached = CachedToken {
            token: token.clone(),
            saved_at: Utc::now(),
        };
        let contents =
            serde_json::to_string_pretty(&cached).map_err(|e| persist_err(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| persist_err(e.to_string()))?;

        // Confirm the file reads back with the same token
        match self.read() {
            Ok(Some(written)) if written.token == *token => Ok(()),
            Ok(_) => Err(persist_err("token read back does not match".to_string())),
            Err(e) => Err(persist_err(e)),
        }
    }
}

/// Process-local cache; nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    token: Mutex<Option<Token>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

impl TokenCache for MemoryTokenCache {
    fn load(&self) -> Option<Token> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &Token) -> Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| ApiError::Persistence("token cache lock poisoned".to_string()))?;
        *slot = Some(token.clone());
        Ok(())
    }
}

impl<C: TokenCache + ?Sized> TokenCache for &C {
    fn load(&self) -> Option<Token> {
        (**self).load()
    }

    fn save(&self, token: &Token) -> Result<()> {
        (**self).save(token)
    }
}
