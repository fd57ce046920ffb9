//! On-disk node state: the only way a `qsfs` process can see what an
//! earlier invocation did, since each subcommand runs in a fresh process
//! with no server loop holding `SessionStore`/`InMemoryStore` in memory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use quantum_shield::session::{SessionSnapshot, SessionStore};
use quantum_shield::store::{InMemoryStore, StoreSnapshot};

#[derive(Default, Serialize, Deserialize)]
pub struct NodeState {
    sessions: Vec<SessionSnapshot>,
    store: StoreSnapshot,
}

impl NodeState {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Rehydrate the session store and file store this state describes.
    pub fn into_parts(self) -> (SessionStore, InMemoryStore) {
        (SessionStore::import(self.sessions), InMemoryStore::import(self.store))
    }

    pub fn from_parts(sessions: &SessionStore, files: &InMemoryStore) -> Self {
        Self { sessions: sessions.export(), store: files.export() }
    }
}

/// `$QSFS_STATE`, else `~/.qsfs/state.json`.
pub fn default_state_path() -> PathBuf {
    if let Ok(path) = std::env::var("QSFS_STATE") {
        return PathBuf::from(path);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".qsfs").join("state.json")
}
