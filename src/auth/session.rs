use std::{
    fs,
    path::PathBuf,
    sync::{Arc, Mutex, RwLock},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Where the session token survives between runs.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: Option<&str>) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredToken {
    auth_token: String,
}

/// Token kept in a small JSON file. Clearing the token removes the file.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session from {}", self.path.display()))?;
        let stored: StoredToken = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session file {}", self.path.display()))?;
        Ok(Some(stored.auth_token))
    }

    fn save(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let serialized = serde_json::to_string_pretty(&StoredToken {
                    auth_token: token.to_string(),
                })?;
                fs::write(&self.path, serialized)
                    .with_context(|| format!("Failed to write session to {}", self.path.display()))
            }
            None => {
                if self.path.exists() {
                    fs::remove_file(&self.path).with_context(|| {
                        format!("Failed to remove session file {}", self.path.display())
                    })?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<String>>,
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        let guard = self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone())
    }

    fn save(&self, token: Option<&str>) -> Result<()> {
        let mut guard = self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = token.map(str::to_string);
        Ok(())
    }
}

/// The signed-in state. The token is opaque and never expires client-side.
pub struct Session {
    storage: Arc<dyn TokenStorage>,
    token: RwLock<Option<String>>,
}

impl Session {
    pub fn restore(storage: Arc<dyn TokenStorage>) -> Result<Self> {
        let token = storage.load()?;
        Ok(Self {
            storage,
            token: RwLock::new(token),
        })
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some_and(|token| !token.is_empty())
    }

    pub fn set_token(&self, token: String) -> Result<()> {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.storage.save(Some(&token))?;
        *guard = Some(token);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.storage.save(None)?;
        *guard = None;
        Ok(())
    }
}
