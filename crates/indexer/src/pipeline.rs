use crate::error::{IndexerError, Result};
use crate::hash_state::HashStateStore;
use crate::identity;
use crate::lock::acquire_index_write_lock;
use crate::scanner::FileScanner;
use crate::stats::IndexStats;
use compass_chunker::{Chunk, ChunkKind, ChunkOutcome, Chunker};
use compass_embed::{ContentClass, EmbeddingRouter};
use compass_protocol::ContentType;
use compass_vector_store::{
    CollectionSchema, DistanceMetric, PointFilter, PointPayload, VectorPoint, VectorStore,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Phase of one indexing run. `Failed` is reachable from every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Scanning,
    Chunking,
    Embedding,
    Upserting,
    Housekeeping,
    Done,
    Failed,
}

impl RunPhase {
    /// Legal forward transitions of the run state machine.
    #[must_use]
    pub fn can_transition(self, next: Self) -> bool {
        if next == Self::Failed {
            return self != Self::Done;
        }
        matches!(
            (self, next),
            (Self::Scanning, Self::Chunking)
                | (Self::Chunking, Self::Embedding)
                | (Self::Embedding, Self::Upserting)
                | (Self::Upserting, Self::Housekeeping)
                | (Self::Housekeeping, Self::Done)
        )
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scanning => "scanning",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Upserting => "upserting",
            Self::Housekeeping => "housekeeping",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Full re-index or hash-gated incremental pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Full,
    Incremental,
}

/// Pipeline configuration for one repository snapshot.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub repo: String,
    pub branch: String,
    pub commit: String,
    /// Collections are named `<stem>__code` and `<stem>__docs`.
    pub collection_stem: String,
    /// Abort the run once this share of processed files has failed.
    pub max_failure_rate: f32,
    pub upsert_batch_size: usize,
    pub max_upsert_attempts: u32,
    /// Concurrent per-file chunk+embed tasks.
    pub file_concurrency: usize,
    pub max_file_bytes: u64,
}

impl PipelineConfig {
    pub fn new(
        repo: impl Into<String>,
        branch: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        let repo = repo.into();
        Self {
            collection_stem: repo.clone(),
            repo,
            branch: branch.into(),
            commit: commit.into(),
            max_failure_rate: 0.2,
            upsert_batch_size: 128,
            max_upsert_attempts: 3,
            file_concurrency: 4,
            max_file_bytes: 1_048_576,
        }
    }

    #[must_use]
    pub fn code_collection(&self) -> String {
        format!("{}__code", self.collection_stem)
    }

    #[must_use]
    pub fn docs_collection(&self) -> String {
        format!("{}__docs", self.collection_stem)
    }
}

/// A file that passed the incremental gate and awaits chunking.
struct PendingFile {
    abs_path: PathBuf,
    rel_path: String,
    file_hash: String,
}

/// A chunked file awaiting embedding.
struct FileWork {
    rel_path: String,
    file_hash: String,
    chunks: Vec<Chunk>,
}

/// Orchestrates scan -> chunk -> embed -> upsert -> housekeeping for one
/// repository snapshot.
pub struct IndexingPipeline {
    root: PathBuf,
    config: PipelineConfig,
    chunker: Arc<Chunker>,
    router: EmbeddingRouter,
    store: Arc<VectorStore>,
    hash_state: Arc<dyn HashStateStore>,
}

impl IndexingPipeline {
    pub fn new(
        root: impl AsRef<Path>,
        config: PipelineConfig,
        chunker: Chunker,
        router: EmbeddingRouter,
        store: Arc<VectorStore>,
        hash_state: Arc<dyn HashStateStore>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root,
            config,
            chunker: Arc::new(chunker),
            router,
            store,
            hash_state,
        })
    }

    /// Run the pipeline. Per-file failures are isolated; the run fails only
    /// when the failure rate crosses the configured threshold or on an
    /// unrecoverable store error.
    pub async fn run(&self, mode: IndexMode) -> Result<IndexStats> {
        let started = Instant::now();
        let _lock = acquire_index_write_lock(self.store.root()).await?;

        let mut phase = RunPhase::Scanning;
        let mut stats = IndexStats::default();
        log::info!(
            "Indexing {} at {} ({mode:?})",
            self.config.repo,
            self.config.commit
        );

        let result = self.run_inner(mode, &mut phase, &mut stats).await;
        stats.time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                advance(&mut phase, RunPhase::Done);
                log::info!("Indexing complete: {stats}");
                Ok(stats)
            }
            Err(e) => {
                let failed_in = phase;
                advance(&mut phase, RunPhase::Failed);
                log::error!("Indexing failed in phase {failed_in}: {e}");
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        mode: IndexMode,
        phase: &mut RunPhase,
        stats: &mut IndexStats,
    ) -> Result<()> {
        self.ensure_collections().await?;

        // Scanning: find eligible files and hash their content.
        let scanner = FileScanner::new(&self.root, self.config.max_file_bytes);
        let scanned = scanner.scan();
        stats.files_scanned = scanned.len();

        let mut seen_paths: HashSet<String> = HashSet::with_capacity(scanned.len());
        let mut pending: Vec<PendingFile> = Vec::new();

        for file in scanned {
            seen_paths.insert(file.rel_path.clone());

            let bytes = match tokio::fs::read(&file.abs_path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Failed to read {}: {e}", file.rel_path);
                    stats.files_failed += 1;
                    stats.add_error(format!("{}: {e}", file.rel_path));
                    continue;
                }
            };
            let file_hash = identity::file_hash(&bytes);

            if mode == IndexMode::Incremental {
                let known = self.hash_state.get(&self.config.repo, &file.rel_path).await;
                if known.as_deref() == Some(file_hash.as_str()) {
                    stats.files_unchanged += 1;
                    continue;
                }
            }

            pending.push(PendingFile {
                abs_path: file.abs_path,
                rel_path: file.rel_path,
                file_hash,
            });
        }

        // Chunking: split each changed file, recording skips.
        advance(phase, RunPhase::Chunking);
        let mut work: Vec<FileWork> = Vec::with_capacity(pending.len());
        for file in pending {
            let bytes = match tokio::fs::read(&file.abs_path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Failed to read {}: {e}", file.rel_path);
                    stats.files_failed += 1;
                    stats.add_error(format!("{}: {e}", file.rel_path));
                    continue;
                }
            };

            match self.chunker.chunk_bytes(&bytes, &file.rel_path) {
                ChunkOutcome::Skipped(reason) => {
                    log::debug!("Skipping {}: {reason}", file.rel_path);
                    stats.files_skipped += 1;
                    // Remember the hash so the next incremental run skips
                    // the file without re-reading it through the chunker.
                    self.hash_state
                        .insert(&self.config.repo, &file.rel_path, &file.file_hash)
                        .await;
                }
                ChunkOutcome::Chunks(chunks) => {
                    stats.add_language(
                        compass_chunker::Language::from_path(&file.rel_path).as_str(),
                    );
                    work.push(FileWork {
                        rel_path: file.rel_path,
                        file_hash: file.file_hash,
                        chunks,
                    });
                }
            }
        }

        // Embedding: bounded parallelism across files; one file's failure
        // never aborts another's.
        advance(phase, RunPhase::Embedding);
        let semaphore = Arc::new(Semaphore::new(self.config.file_concurrency.max(1)));
        let mut tasks: JoinSet<(String, String, Result<Vec<(String, VectorPoint)>>)> =
            JoinSet::new();

        for file in work {
            let semaphore = Arc::clone(&semaphore);
            let router = self.router.clone();
            let config = self.config.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                let points = embed_file(&config, &router, &file).await;
                (file.rel_path, file.file_hash, points)
            });
        }

        let mut points_by_collection: HashMap<String, Vec<VectorPoint>> = HashMap::new();
        let mut indexed_paths: Vec<String> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (rel_path, file_hash, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    stats.files_failed += 1;
                    stats.add_error(format!("embedding task panicked: {e}"));
                    continue;
                }
            };

            match outcome {
                Ok(points) => {
                    stats.files_indexed += 1;
                    stats.chunks += points.len();
                    for (collection, point) in points {
                        points_by_collection.entry(collection).or_default().push(point);
                    }
                    indexed_paths.push(rel_path.clone());
                    self.hash_state
                        .insert(&self.config.repo, &rel_path, &file_hash)
                        .await;
                }
                Err(e) => {
                    log::warn!("Embedding failed for {rel_path}: {e}");
                    stats.files_failed += 1;
                    stats.add_error(format!("{rel_path}: {e}"));
                }
            }

        }

        let rate = stats.failure_rate();
        if rate > self.config.max_failure_rate {
            return Err(IndexerError::RunFailed(format!(
                "failure rate {:.0}% exceeds threshold {:.0}%",
                rate * 100.0,
                self.config.max_failure_rate * 100.0
            )));
        }

        // Upserting: batches per collection with bounded retry.
        advance(phase, RunPhase::Upserting);
        for (collection, points) in points_by_collection {
            for batch in points.chunks(self.config.upsert_batch_size) {
                self.upsert_with_retry(&collection, batch, stats).await;
            }
        }

        // Housekeeping: remove points for deleted files and stale commits.
        advance(phase, RunPhase::Housekeeping);
        self.housekeeping(&seen_paths, &indexed_paths, stats).await?;

        self.hash_state.flush().await?;
        self.store.save().await?;
        Ok(())
    }

    async fn ensure_collections(&self) -> Result<()> {
        let code_schema = CollectionSchema {
            vector_size: self.router.dimension_for(ContentClass::Code),
            metric: DistanceMetric::Cosine,
        };
        let docs_schema = CollectionSchema {
            vector_size: self.router.dimension_for(ContentClass::Docs),
            metric: DistanceMetric::Cosine,
        };
        self.store
            .ensure_collection(&self.config.code_collection(), code_schema)
            .await?;
        self.store
            .ensure_collection(&self.config.docs_collection(), docs_schema)
            .await?;
        Ok(())
    }

    /// Upsert one batch, retrying with exponential backoff. A batch that
    /// keeps failing is reported in the run stats, never silently dropped.
    async fn upsert_with_retry(
        &self,
        collection: &str,
        batch: &[VectorPoint],
        stats: &mut IndexStats,
    ) {
        let mut delay = Duration::from_millis(200);
        let attempts = self.config.max_upsert_attempts.max(1);

        for attempt in 1..=attempts {
            match self.store.upsert(collection, batch.to_vec()).await {
                Ok(outcome) => {
                    stats.points_written += outcome.written;
                    stats.points_unchanged += outcome.unchanged;
                    return;
                }
                Err(e) if attempt < attempts => {
                    log::warn!(
                        "Upsert batch into {collection} failed (attempt {attempt}/{attempts}), retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    log::error!(
                        "Upsert batch of {} points into {collection} failed after {attempts} attempts: {e}",
                        batch.len()
                    );
                    stats.add_error(format!(
                        "upsert into {collection} failed for {} points: {e}",
                        batch.len()
                    ));
                }
            }
        }
    }

    /// Delete points for removed files (by path) and superseded chunks of
    /// re-indexed files (by path + stale commit). Both deletes are filter
    /// bounded and safe to re-run.
    async fn housekeeping(
        &self,
        seen_paths: &HashSet<String>,
        indexed_paths: &[String],
        stats: &mut IndexStats,
    ) -> Result<()> {
        let collections = [self.config.code_collection(), self.config.docs_collection()];

        let known = self.hash_state.paths_for_repo(&self.config.repo).await;
        for path in known {
            if seen_paths.contains(&path) {
                continue;
            }
            for collection in &collections {
                let filter = PointFilter {
                    repo: Some(self.config.repo.clone()),
                    path: Some(path.clone()),
                    ..Default::default()
                };
                stats.points_deleted += self.store.delete(collection, &filter).await?;
            }
            self.hash_state.remove(&self.config.repo, &path).await;
            stats.files_deleted += 1;
            log::debug!("Removed deleted file {path} from index");
        }

        for path in indexed_paths {
            for collection in &collections {
                let filter = PointFilter {
                    repo: Some(self.config.repo.clone()),
                    path: Some(path.clone()),
                    commit_not: Some(self.config.commit.clone()),
                    ..Default::default()
                };
                stats.points_deleted += self.store.delete(collection, &filter).await?;
            }
        }

        Ok(())
    }
}

/// Embed one file's chunks per content class and build its vector points.
async fn embed_file(
    config: &PipelineConfig,
    router: &EmbeddingRouter,
    file: &FileWork,
) -> Result<Vec<(String, VectorPoint)>> {
    let mut points = Vec::with_capacity(file.chunks.len());

    for class in [ContentClass::Code, ContentClass::Docs] {
        let group: Vec<&Chunk> = file
            .chunks
            .iter()
            .filter(|c| content_class_of(c.kind) == class)
            .collect();
        if group.is_empty() {
            continue;
        }

        let texts: Vec<String> = group.iter().map(|c| c.text.clone()).collect();
        let vectors = router.provider_for(class).embed_batch(&texts).await?;

        let collection = match class {
            ContentClass::Code => config.code_collection(),
            ContentClass::Docs => config.docs_collection(),
        };

        for (chunk, vector) in group.into_iter().zip(vectors) {
            let hash = identity::chunk_hash(chunk);
            let id = identity::point_id(&config.repo, &config.commit, &chunk.path, &hash);
            points.push((
                collection.clone(),
                VectorPoint {
                    id,
                    vector,
                    payload: PointPayload {
                        repo: config.repo.clone(),
                        branch: config.branch.clone(),
                        commit: config.commit.clone(),
                        path: chunk.path.clone(),
                        language: chunk.language.clone(),
                        kind: content_type_of(chunk.kind),
                        start_line: chunk.start_line,
                        end_line: chunk.end_line,
                        symbols: chunk.symbols.clone(),
                        text: chunk.text.clone(),
                        file_hash: file.file_hash.clone(),
                    },
                },
            ));
        }
    }

    Ok(points)
}

const fn content_class_of(kind: ChunkKind) -> ContentClass {
    match kind {
        ChunkKind::Code => ContentClass::Code,
        ChunkKind::Docs => ContentClass::Docs,
    }
}

const fn content_type_of(kind: ChunkKind) -> ContentType {
    match kind {
        ChunkKind::Code => ContentType::Code,
        ChunkKind::Docs => ContentType::Docs,
    }
}

fn advance(phase: &mut RunPhase, next: RunPhase) {
    debug_assert!(phase.can_transition(next), "illegal transition {phase} -> {next}");
    log::debug!("Pipeline phase: {phase} -> {next}");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions_follow_the_state_machine() {
        use RunPhase::*;
        assert!(Scanning.can_transition(Chunking));
        assert!(Chunking.can_transition(Embedding));
        assert!(Embedding.can_transition(Upserting));
        assert!(Upserting.can_transition(Housekeeping));
        assert!(Housekeeping.can_transition(Done));
        assert!(!Scanning.can_transition(Embedding));
        assert!(!Done.can_transition(Scanning));
    }

    #[test]
    fn failed_is_reachable_from_any_live_phase() {
        use RunPhase::*;
        for phase in [Scanning, Chunking, Embedding, Upserting, Housekeeping] {
            assert!(phase.can_transition(Failed));
        }
        assert!(!Done.can_transition(Failed));
    }

    #[test]
    fn collection_names_derive_from_stem() {
        let config = PipelineConfig::new("compass", "main", "c1");
        assert_eq!(config.code_collection(), "compass__code");
        assert_eq!(config.docs_collection(), "compass__docs");
    }
}
