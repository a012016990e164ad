use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use compass_chunker::{Chunker, ChunkerConfig};
use compass_embed::{EmbeddingRouter, HttpEmbeddingProvider};
use compass_indexer::{IndexMode, IndexingPipeline, JsonHashStateStore, PipelineConfig};
use compass_search::{RetrievalEngine, SearchConfig};
use compass_server::{
    serve, CompassConfig, FileEvidenceReader, HttpAnswerGenerator, ToolHandler,
};
use compass_vector_store::{VectorQuery, VectorStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "compass", version, about = "Evidence-first code search")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "compass.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the configured repository snapshot into the vector store
    Index {
        #[arg(long, value_enum, default_value_t = ModeArg::Incremental)]
        mode: ModeArg,
    },
    /// Serve the tool protocol on stdin/stdout
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    Incremental,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for the tool protocol; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let config = CompassConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    match cli.command {
        Command::Index { mode } => index(&config, mode).await,
        Command::Serve => run_server(&config).await,
    }
}

fn build_router(config: &CompassConfig) -> anyhow::Result<EmbeddingRouter> {
    let code = Arc::new(HttpEmbeddingProvider::new(config.embedding.code.clone())?);
    let docs = Arc::new(HttpEmbeddingProvider::new(config.docs_embedding().clone())?);
    Ok(EmbeddingRouter::new(code, docs))
}

async fn index(config: &CompassConfig, mode: ModeArg) -> anyhow::Result<()> {
    let router = build_router(config)?;
    let store = Arc::new(VectorStore::open(config.store_dir.join("collections")).await?);
    let hash_state = Arc::new(
        JsonHashStateStore::open(config.store_dir.join("hash_state.json")).await?,
    );

    let pipeline = IndexingPipeline::new(
        &config.repo.root,
        PipelineConfig::new(&config.repo.name, &config.repo.branch, &config.repo.commit),
        Chunker::new(ChunkerConfig::default())?,
        router,
        store,
        hash_state,
    )?;

    let mode = match mode {
        ModeArg::Full => IndexMode::Full,
        ModeArg::Incremental => IndexMode::Incremental,
    };
    let stats = pipeline.run(mode).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_server(config: &CompassConfig) -> anyhow::Result<()> {
    let router = build_router(config)?;
    let store = Arc::new(VectorStore::open(config.store_dir.join("collections")).await?);
    let query: Arc<dyn VectorQuery> = store;

    let mut search_config = SearchConfig::new(&config.repo.name);
    search_config.per_collection_timeout_ms = config.search.per_collection_timeout_ms;
    search_config.rrf_k = config.search.rrf_k;

    let engine = RetrievalEngine::new(query, router, search_config);
    let reader = FileEvidenceReader::new(&config.repo.root, config.range_policy)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let generator = Arc::new(HttpAnswerGenerator::new(
        config.answer.base_url.clone(),
        config.answer.model.clone(),
        config.answer.api_key.clone(),
        config.answer.timeout_ms,
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?);

    let handler = Arc::new(ToolHandler::new(
        engine,
        reader,
        generator,
        config.answer.min_relevance,
        config.search.default_top_k,
        config.search.request_timeout_ms,
    ));

    log::info!(
        "Serving tool protocol for {} (stem {})",
        config.repo.name,
        config.repo.name
    );
    serve(handler, tokio::io::stdin(), tokio::io::stdout()).await
}
