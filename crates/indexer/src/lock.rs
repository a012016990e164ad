use crate::error::{IndexerError, Result};
use fs2::FileExt;
use std::path::{Path, PathBuf};

/// Exclusive lock held for the duration of an indexing run, so two indexer
/// processes never race on the same store.
pub(crate) struct IndexWriteLock {
    #[allow(dead_code)]
    file: std::fs::File,
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

pub(crate) async fn acquire_index_write_lock(store_root: &Path) -> Result<IndexWriteLock> {
    let path: PathBuf = store_root.join("index.lock");
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let lock = tokio::task::spawn_blocking(move || -> Result<IndexWriteLock> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                IndexerError::Lock(format!("open index lock {}: {err}", path.display()))
            })?;

        file.lock_exclusive().map_err(|err| {
            IndexerError::Lock(format!("acquire index lock {}: {err}", path.display()))
        })?;

        Ok(IndexWriteLock { file })
    })
    .await
    .map_err(|err| IndexerError::Lock(format!("join index lock task: {err}")))??;

    Ok(lock)
}
