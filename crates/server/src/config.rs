use crate::evidence::RangePolicy;
use compass_embed::HttpProviderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level server configuration, loaded from a TOML file with
/// `COMPASS_*` environment overrides for secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompassConfig {
    pub repo: RepoConfig,
    /// Directory holding collections, hash state and the index lock.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchSection,
    pub answer: AnswerConfig,
    #[serde(default = "default_range_policy")]
    pub range_policy: RangePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub name: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub commit: String,
    pub root: PathBuf,
}

/// Per-content-class embedding endpoints. When `docs` is omitted the code
/// model serves both classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub code: HttpProviderConfig,
    #[serde(default)]
    pub docs: Option<HttpProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_collection_timeout_ms")]
    pub per_collection_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            per_collection_timeout_ms: default_collection_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            default_top_k: default_top_k(),
            rrf_k: default_rrf_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,
    #[serde(default = "default_answer_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".compass")
}

fn default_branch() -> String {
    "main".to_string()
}

const fn default_collection_timeout_ms() -> u64 {
    5_000
}

const fn default_request_timeout_ms() -> u64 {
    15_000
}

const fn default_top_k() -> usize {
    10
}

const fn default_rrf_k() -> f32 {
    60.0
}

const fn default_min_relevance() -> f32 {
    0.25
}

const fn default_answer_timeout_ms() -> u64 {
    30_000
}

const fn default_range_policy() -> RangePolicy {
    RangePolicy::Reject
}

impl CompassConfig {
    /// Load from a TOML file, then apply environment overrides:
    /// `COMPASS_EMBED_API_KEY` and `COMPASS_ANSWER_API_KEY`.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("COMPASS_EMBED_API_KEY") {
            self.embedding.code.api_key = Some(key.clone());
            if let Some(docs) = &mut self.embedding.docs {
                docs.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("COMPASS_ANSWER_API_KEY") {
            self.answer.api_key = Some(key);
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.repo.name.is_empty() {
            anyhow::bail!("repo.name must not be empty");
        }
        if self.repo.commit.is_empty() {
            anyhow::bail!("repo.commit must not be empty");
        }
        if !(0.0..=1.0).contains(&self.answer.min_relevance) {
            anyhow::bail!("answer.min_relevance must be within [0, 1]");
        }
        Ok(())
    }

    /// Docs embedding endpoint, falling back to the code endpoint.
    #[must_use]
    pub fn docs_embedding(&self) -> &HttpProviderConfig {
        self.embedding.docs.as_ref().unwrap_or(&self.embedding.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
[repo]
name = "compass"
commit = "0f3c2a1"
root = "/srv/checkouts/compass"

[embedding.code]
base_url = "http://localhost:11434"
model = "nomic-embed-code"
dimension = 768

[answer]
base_url = "http://localhost:11434"
model = "qwen2.5-coder"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: CompassConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.repo.branch, "main");
        assert_eq!(config.search.default_top_k, 10);
        assert_eq!(config.range_policy, RangePolicy::Reject);
        assert_eq!(config.docs_embedding().model, "nomic-embed-code");
        assert!((config.answer.min_relevance - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn docs_endpoint_overrides_code_fallback() {
        let raw = format!(
            "{MINIMAL}\n[embedding.docs]\nbase_url = \"http://localhost:11434\"\nmodel = \"nomic-embed-text\"\ndimension = 768\n"
        );
        let config: CompassConfig = toml::from_str(&raw).unwrap();
        assert_eq!(config.docs_embedding().model, "nomic-embed-text");
    }

    #[test]
    fn validation_rejects_empty_commit() {
        let mut config: CompassConfig = toml::from_str(MINIMAL).unwrap();
        config.repo.commit.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_relevance() {
        let mut config: CompassConfig = toml::from_str(MINIMAL).unwrap();
        config.answer.min_relevance = 1.5;
        assert!(config.validate().is_err());
    }
}
