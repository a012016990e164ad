use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Last-known `(repo, path) -> file_hash` mapping used to detect
/// incremental changes. Injected into the pipeline, never ambient state.
#[async_trait]
pub trait HashStateStore: Send + Sync {
    async fn get(&self, repo: &str, path: &str) -> Option<String>;

    async fn insert(&self, repo: &str, path: &str, file_hash: &str);

    async fn remove(&self, repo: &str, path: &str);

    /// All paths currently known for a repo, for removed-file detection.
    async fn paths_for_repo(&self, repo: &str) -> Vec<String>;

    /// Persist the current state so it survives process restarts.
    async fn flush(&self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HashStateFile {
    /// repo -> path -> file_hash
    repos: HashMap<String, HashMap<String, String>>,
}

/// JSON-file-backed hash state, written atomically (tmp + rename).
pub struct JsonHashStateStore {
    path: PathBuf,
    state: RwLock<HashStateFile>,
}

impl JsonHashStateStore {
    /// Open the store, loading any persisted state from `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let bytes = tokio::fs::read(&path).await?;
            serde_json::from_slice(&bytes)?
        } else {
            HashStateFile::default()
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }
}

#[async_trait]
impl HashStateStore for JsonHashStateStore {
    async fn get(&self, repo: &str, path: &str) -> Option<String> {
        let state = self.state.read().await;
        state.repos.get(repo).and_then(|m| m.get(path)).cloned()
    }

    async fn insert(&self, repo: &str, path: &str, file_hash: &str) {
        let mut state = self.state.write().await;
        state
            .repos
            .entry(repo.to_string())
            .or_default()
            .insert(path.to_string(), file_hash.to_string());
    }

    async fn remove(&self, repo: &str, path: &str) {
        let mut state = self.state.write().await;
        if let Some(paths) = state.repos.get_mut(repo) {
            paths.remove(path);
        }
    }

    async fn paths_for_repo(&self, repo: &str) -> Vec<String> {
        let state = self.state.read().await;
        let mut paths: Vec<String> = state
            .repos
            .get(repo)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    async fn flush(&self) -> Result<()> {
        let state = self.state.read().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&*state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
