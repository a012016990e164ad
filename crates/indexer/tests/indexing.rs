//! End-to-end pipeline tests over a temporary repository tree, with a
//! deterministic in-process embedding provider that counts its calls.

use async_trait::async_trait;
use compass_chunker::{Chunker, ChunkerConfig};
use compass_embed::{EmbeddingProvider, EmbeddingRouter, Result as EmbedResult};
use compass_indexer::{
    HashStateStore, IndexMode, IndexingPipeline, JsonHashStateStore, PipelineConfig,
};
use compass_vector_store::{PointFilter, VectorStore};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 8;

/// Deterministic embedder: the vector is a pure function of the text, and
/// every batch call is counted so tests can assert embedding cost.
struct CountingEmbedder {
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; DIM];
                for (i, byte) in text.bytes().enumerate() {
                    vector[i % DIM] += f32::from(byte) / 255.0;
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

struct Fixture {
    repo: TempDir,
    state: TempDir,
    embedder: Arc<CountingEmbedder>,
    store: Arc<VectorStore>,
    hash_state: Arc<JsonHashStateStore>,
}

impl Fixture {
    async fn new() -> Self {
        let repo = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();

        fs::create_dir_all(repo.path().join("src")).unwrap();
        fs::write(
            repo.path().join("src/lib.rs"),
            "pub fn add(a: u32, b: u32) -> u32 {\n    a + b\n}\n",
        )
        .unwrap();
        fs::write(
            repo.path().join("src/io.rs"),
            "pub fn read_all(path: &str) -> std::io::Result<String> {\n    std::fs::read_to_string(path)\n}\n",
        )
        .unwrap();
        fs::write(repo.path().join("README.md"), "# Fixture\n\nAdds numbers.\n").unwrap();

        let embedder = CountingEmbedder::new();
        let store = Arc::new(
            VectorStore::open(state.path().join("collections"))
                .await
                .unwrap(),
        );
        let hash_state = Arc::new(
            JsonHashStateStore::open(state.path().join("hash_state.json"))
                .await
                .unwrap(),
        );

        Self {
            repo,
            state,
            embedder,
            store,
            hash_state,
        }
    }

    fn pipeline(&self, commit: &str) -> IndexingPipeline {
        let config = PipelineConfig::new("fixture", "main", commit);
        IndexingPipeline::new(
            self.repo.path(),
            config,
            Chunker::new(ChunkerConfig::default()).unwrap(),
            EmbeddingRouter::uniform(self.embedder.clone()),
            Arc::clone(&self.store),
            self.hash_state.clone(),
        )
        .unwrap()
    }
}

#[tokio::test]
async fn full_run_indexes_code_and_docs() {
    let fx = Fixture::new().await;
    let stats = fx.pipeline("c1").run(IndexMode::Full).await.unwrap();

    assert_eq!(stats.files_scanned, 3);
    assert_eq!(stats.files_indexed, 3);
    assert_eq!(stats.files_failed, 0);
    assert!(stats.points_written > 0);
    assert!(fx.store.count("fixture__code").await.unwrap() > 0);
    assert!(fx.store.count("fixture__docs").await.unwrap() > 0);
}

#[tokio::test]
async fn second_full_run_is_idempotent() {
    let fx = Fixture::new().await;
    let first = fx.pipeline("c1").run(IndexMode::Full).await.unwrap();
    let code_count = fx.store.count("fixture__code").await.unwrap();
    let docs_count = fx.store.count("fixture__docs").await.unwrap();

    let second = fx.pipeline("c1").run(IndexMode::Full).await.unwrap();

    // Same point ids, same payloads: every upsert is a no-op.
    assert_eq!(second.points_written, 0);
    assert_eq!(second.points_unchanged, first.points_written);
    assert_eq!(second.points_deleted, 0);
    assert_eq!(fx.store.count("fixture__code").await.unwrap(), code_count);
    assert_eq!(fx.store.count("fixture__docs").await.unwrap(), docs_count);
}

#[tokio::test]
async fn incremental_run_skips_unchanged_files_without_embedding() {
    let fx = Fixture::new().await;
    fx.pipeline("c1").run(IndexMode::Full).await.unwrap();
    let calls_after_full = fx.embedder.calls();

    let stats = fx
        .pipeline("c1")
        .run(IndexMode::Incremental)
        .await
        .unwrap();

    assert_eq!(stats.files_unchanged, 3);
    assert_eq!(stats.files_indexed, 0);
    // The embedding collaborator must not be called for unchanged files.
    assert_eq!(fx.embedder.calls(), calls_after_full);
}

#[tokio::test]
async fn incremental_run_reembeds_only_changed_files() {
    let fx = Fixture::new().await;
    fx.pipeline("c1").run(IndexMode::Full).await.unwrap();
    let calls_after_full = fx.embedder.calls();

    fs::write(
        fx.repo.path().join("src/lib.rs"),
        "pub fn add(a: u64, b: u64) -> u64 {\n    a + b\n}\n",
    )
    .unwrap();

    let stats = fx
        .pipeline("c2")
        .run(IndexMode::Incremental)
        .await
        .unwrap();

    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.files_unchanged, 2);
    assert!(stats.points_written > 0);
    // Exactly one batched embedding call for the changed file.
    assert_eq!(fx.embedder.calls(), calls_after_full + 1);
    // Superseded points from c1 for the changed path are gone.
    let stale = PointFilter {
        repo: Some("fixture".to_string()),
        path: Some("src/lib.rs".to_string()),
        commit_not: Some("c2".to_string()),
        ..Default::default()
    };
    assert_eq!(fx.store.delete("fixture__code", &stale).await.unwrap(), 0);
}

#[tokio::test]
async fn removed_file_is_cleaned_up_by_housekeeping() {
    let fx = Fixture::new().await;
    fx.pipeline("c1").run(IndexMode::Full).await.unwrap();
    let docs_before = fx.store.count("fixture__docs").await.unwrap();
    assert!(docs_before > 0);

    fs::remove_file(fx.repo.path().join("README.md")).unwrap();

    let stats = fx
        .pipeline("c2")
        .run(IndexMode::Incremental)
        .await
        .unwrap();

    assert_eq!(stats.files_deleted, 1);
    assert!(stats.points_deleted > 0);
    assert_eq!(fx.store.count("fixture__docs").await.unwrap(), 0);
    assert_eq!(
        fx.hash_state.get("fixture", "README.md").await,
        None,
        "hash state entry must be removed"
    );
}

#[tokio::test]
async fn hash_state_survives_restart() {
    let fx = Fixture::new().await;
    fx.pipeline("c1").run(IndexMode::Full).await.unwrap();
    let calls_after_full = fx.embedder.calls();

    // Reopen state from disk, as a fresh process would.
    let reopened: Arc<JsonHashStateStore> = Arc::new(
        JsonHashStateStore::open(fx.state.path().join("hash_state.json"))
            .await
            .unwrap(),
    );
    let store = Arc::new(
        VectorStore::open(fx.state.path().join("collections"))
            .await
            .unwrap(),
    );
    let pipeline = IndexingPipeline::new(
        fx.repo.path(),
        PipelineConfig::new("fixture", "main", "c1"),
        Chunker::new(ChunkerConfig::default()).unwrap(),
        EmbeddingRouter::uniform(fx.embedder.clone()),
        store,
        reopened,
    )
    .unwrap();

    let stats = pipeline.run(IndexMode::Incremental).await.unwrap();
    assert_eq!(stats.files_unchanged, 3);
    assert_eq!(fx.embedder.calls(), calls_after_full);
}

#[tokio::test]
async fn binary_file_is_skipped_and_remembered() {
    let fx = Fixture::new().await;
    fs::write(fx.repo.path().join("blob.rs"), b"\x00\x01\x02binary").unwrap();

    let stats = fx.pipeline("c1").run(IndexMode::Full).await.unwrap();
    assert_eq!(stats.files_skipped, 1);
    assert_eq!(stats.files_indexed, 3);

    // Next incremental run treats the binary file as unchanged.
    let stats = fx
        .pipeline("c1")
        .run(IndexMode::Incremental)
        .await
        .unwrap();
    assert_eq!(stats.files_unchanged, 4);
    assert_eq!(stats.files_skipped, 0);
}

#[tokio::test]
async fn failing_provider_isolates_and_then_aborts_past_threshold() {
    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
            Err(compass_embed::EmbedError::Provider {
                status: 503,
                message: "down".to_string(),
            })
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    let fx = Fixture::new().await;
    let pipeline = IndexingPipeline::new(
        fx.repo.path(),
        PipelineConfig::new("fixture", "main", "c1"),
        Chunker::new(ChunkerConfig::default()).unwrap(),
        EmbeddingRouter::uniform(Arc::new(FailingEmbedder)),
        Arc::clone(&fx.store),
        fx.hash_state.clone(),
    )
    .unwrap();

    // Every file fails, so the run must abort past the failure threshold.
    assert!(pipeline.run(IndexMode::Full).await.is_err());
}
