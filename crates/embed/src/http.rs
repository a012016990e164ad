use crate::error::{EmbedError, Result};
use crate::provider::EmbeddingProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum characters per text sent to the provider. Dense content can hit
/// ~2.3 tokens/char, so this keeps requests safely under common 8k-token
/// context windows.
const MAX_EMBED_CHARS: usize = 3_000;

/// Texts per request; providers reject oversized batches.
const BATCH_SIZE: usize = 64;

/// Configuration for one OpenAI-compatible embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    /// Base URL, e.g. `http://localhost:11434`
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub dimension: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_max_attempts() -> u32 {
    3
}

/// Embedding provider speaking the OpenAI `/v1/embeddings` wire format.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("compass/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.config.base_url);
        let req = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut builder = self.client.post(&url).json(&req);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(EmbedError::Provider { status, message });
        }

        let body: EmbedResponse = resp.json().await?;
        if body.data.is_empty() {
            return Err(EmbedError::EmptyResponse);
        }
        if body.data.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                sent: texts.len(),
                received: body.data.len(),
            });
        }

        let vectors: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();
        for vector in &vectors {
            if vector.len() != self.config.dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.config.dimension,
                    actual: vector.len(),
                });
            }
        }
        Ok(vectors)
    }

    /// Bounded retry with exponential backoff around one batch request.
    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut delay = Duration::from_millis(250);
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.request_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    log::warn!(
                        "Embedding attempt {attempt}/{max_attempts} failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) if e.is_retryable() => {
                    log::warn!("Embedding failed after {max_attempts} attempts: {e}");
                    return Err(EmbedError::Exhausted(max_attempts));
                }
                Err(e) => return Err(e),
            }
        }
        Err(EmbedError::Exhausted(max_attempts))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        let mut all = Vec::with_capacity(truncated.len());
        for batch in truncated.chunks(BATCH_SIZE) {
            all.extend(self.request_with_retry(batch).await?);
        }
        Ok(all)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Truncate `text` to at most `MAX_EMBED_CHARS` bytes on a UTF-8 boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
