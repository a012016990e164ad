use crate::collection::Collection;
use crate::error::{Result, VectorStoreError};
use crate::types::{
    CollectionSchema, PointFilter, ScoredPoint, UpsertOutcome, VectorPoint,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Query-side seam of the store, so the retrieval engine can be exercised
/// against simulated collection failures in tests.
#[async_trait]
pub trait VectorQuery: Send + Sync {
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &PointFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>>;
}

/// Store of named collections with JSON persistence.
///
/// Writes take the outer write lock, so writers to the same collection are
/// serialized; readers work on the shared snapshot and never block each
/// other.
pub struct VectorStore {
    root: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

impl VectorStore {
    /// Open a store rooted at `root`, loading any persisted collections.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        let mut collections = HashMap::new();
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            let collection: Collection = serde_json::from_slice(&bytes)?;
            log::info!(
                "Loaded collection {name} ({} points, schema {})",
                collection.len(),
                collection.schema()
            );
            collections.insert(name.to_string(), collection);
        }

        Ok(Self {
            root,
            collections: RwLock::new(collections),
        })
    }

    /// Create the collection if absent. Re-ensuring with the same schema is
    /// a no-op; a different schema is an error: schema changes go through
    /// a parallel collection and [`crate::CollectionMigration`], never an
    /// in-place alter.
    pub async fn ensure_collection(&self, name: &str, schema: CollectionSchema) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            if existing.schema() != schema {
                return Err(VectorStoreError::SchemaMismatch {
                    name: name.to_string(),
                    existing: existing.schema().to_string(),
                    requested: schema.to_string(),
                });
            }
            return Ok(());
        }

        log::info!("Creating collection {name} (schema {schema})");
        collections.insert(name.to_string(), Collection::new(schema));
        Ok(())
    }

    pub async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<UpsertOutcome> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        let outcome = target.upsert(points)?;
        log::debug!(
            "Upsert into {collection}: {} written, {} unchanged",
            outcome.written,
            outcome.unchanged
        );
        Ok(outcome)
    }

    /// Delete points matching the filter. Filter-bounded so housekeeping
    /// cost scales with the changed set, not the index size.
    pub async fn delete(&self, collection: &str, filter: &PointFilter) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        let removed = target.delete(filter);
        if removed > 0 {
            log::debug!("Deleted {removed} points from {collection}");
        }
        Ok(removed)
    }

    /// Drop an entire collection (the retire step of a schema cutover).
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .remove(name)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(name.to_string()))?;
        let file = self.collection_file(name);
        if file.exists() {
            tokio::fs::remove_file(&file).await?;
        }
        log::info!("Dropped collection {name}");
        Ok(())
    }

    pub async fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(Collection::len)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))
    }

    pub async fn get_point(&self, collection: &str, id: &str) -> Result<Option<VectorPoint>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        Ok(target.get(id).cloned())
    }

    /// Directory this store persists into.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist every collection, each written atomically (tmp + rename).
    pub async fn save(&self) -> Result<()> {
        let collections = self.collections.read().await;
        for (name, collection) in collections.iter() {
            let bytes = serde_json::to_vec(collection)?;
            let path = self.collection_file(name);
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;
        }
        log::debug!("Persisted {} collection(s)", collections.len());
        Ok(())
    }

    fn collection_file(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl VectorQuery for VectorStore {
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &PointFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        target.query(vector, filter, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistanceMetric, PointPayload};
    use compass_protocol::ContentType;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn schema(size: usize) -> CollectionSchema {
        CollectionSchema {
            vector_size: size,
            metric: DistanceMetric::Cosine,
        }
    }

    fn point(id: &str, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            id: id.to_string(),
            vector,
            payload: PointPayload {
                repo: "compass".to_string(),
                branch: "main".to_string(),
                commit: "c1".to_string(),
                path: "src/a.rs".to_string(),
                language: "rust".to_string(),
                kind: ContentType::Code,
                start_line: 1,
                end_line: 3,
                symbols: Vec::new(),
                text: "fn a() {}".to_string(),
                file_hash: "h".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn ensure_collection_rejects_schema_change() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();

        store.ensure_collection("repo__code", schema(3)).await.unwrap();
        store.ensure_collection("repo__code", schema(3)).await.unwrap();
        let err = store.ensure_collection("repo__code", schema(4)).await;
        assert!(matches!(err, Err(VectorStoreError::SchemaMismatch { .. })));
    }

    #[tokio::test]
    async fn save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let store = VectorStore::open(dir.path()).await.unwrap();
            store.ensure_collection("repo__code", schema(3)).await.unwrap();
            store
                .upsert("repo__code", vec![point("p1", vec![1.0, 0.0, 0.0])])
                .await
                .unwrap();
            store.save().await.unwrap();
        }

        let reloaded = VectorStore::open(dir.path()).await.unwrap();
        assert_eq!(reloaded.collection_names().await, vec!["repo__code"]);
        assert_eq!(reloaded.count("repo__code").await.unwrap(), 1);
        let stored = reloaded.get_point("repo__code", "p1").await.unwrap().unwrap();
        assert_eq!(stored.vector, vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn query_unknown_collection_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let err = store
            .query("missing", &[1.0], &PointFilter::default(), 5)
            .await;
        assert!(matches!(err, Err(VectorStoreError::CollectionNotFound(_))));
    }

    #[tokio::test]
    async fn drop_collection_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        store.ensure_collection("old__code", schema(3)).await.unwrap();
        store.save().await.unwrap();
        assert!(dir.path().join("old__code.json").exists());

        store.drop_collection("old__code").await.unwrap();
        assert!(!dir.path().join("old__code.json").exists());
        assert!(store.collection_names().await.is_empty());
    }
}
