use crate::error::ToolError;
use crate::evidence::FileEvidenceReader;
use crate::generate::AnswerGenerator;
use crate::tools::{
    AskCodeInput, AskCodeOutput, OpenFileInput, OpenFileOutput, SearchCodeInput,
};
use compass_protocol::{
    CollectionStatus, EvidenceRecord, QueryRequest, SearchResponse, ToolRequest, ToolResponse,
};
use compass_search::RetrievalEngine;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Dispatches the three protocol tools, enforcing input validation, the
/// overall request deadline and the evidence-first contract.
pub struct ToolHandler {
    engine: RetrievalEngine,
    reader: FileEvidenceReader,
    generator: Arc<dyn AnswerGenerator>,
    /// Evidence below this cosine score never grounds an answer.
    min_relevance: f32,
    default_top_k: usize,
    request_timeout_ms: u64,
}

impl ToolHandler {
    pub fn new(
        engine: RetrievalEngine,
        reader: FileEvidenceReader,
        generator: Arc<dyn AnswerGenerator>,
        min_relevance: f32,
        default_top_k: usize,
        request_timeout_ms: u64,
    ) -> Self {
        Self {
            engine,
            reader,
            generator,
            min_relevance,
            default_top_k,
            request_timeout_ms,
        }
    }

    /// Handle one request line. Always produces a well-formed response,
    /// carrying an error kind and a safe message on failure.
    pub async fn handle(&self, request: ToolRequest) -> ToolResponse {
        let id = request.id.clone();
        let deadline = Duration::from_millis(self.request_timeout_ms);

        let result = tokio::time::timeout(deadline, self.dispatch(&request))
            .await
            .unwrap_or_else(|_| {
                Err(ToolError::Upstream(format!(
                    "request timed out after {}ms",
                    deadline.as_millis()
                )))
            });

        match result {
            Ok(output) => ToolResponse::success(id, output),
            Err(e) => {
                log::debug!("Tool {} failed: {e}", request.tool);
                ToolResponse::failure(id, e.envelope())
            }
        }
    }

    async fn dispatch(&self, request: &ToolRequest) -> Result<Value, ToolError> {
        match request.tool.as_str() {
            "search_code" => {
                let input: SearchCodeInput = parse_input(&request.input)?;
                let response = self.search_code(input).await?;
                to_value(&response)
            }
            "open_file" => {
                let input: OpenFileInput = parse_input(&request.input)?;
                let output = self.open_file(input).await?;
                to_value(&output)
            }
            "ask_code" => {
                let input: AskCodeInput = parse_input(&request.input)?;
                let output = self.ask_code(input).await?;
                to_value(&output)
            }
            other => Err(ToolError::Validation(format!("unknown tool: {other}"))),
        }
    }

    async fn search_code(&self, input: SearchCodeInput) -> Result<SearchResponse, ToolError> {
        let request = QueryRequest {
            text: input.query,
            repo: input.repo,
            path_prefix: input.path_prefix,
            language: input.language,
            content_type: input.content_type,
            strict: input.strict,
            top_k: input.top_k.unwrap_or(self.default_top_k),
        };

        let response = self.engine.search(&request).await?;

        // Non-strict partial failure with nothing salvaged is reported as
        // partial_failure rather than an empty success.
        let any_failed = response
            .collections
            .iter()
            .any(|c| c.status == CollectionStatus::Failed);
        if any_failed && response.evidence.is_empty() {
            return Err(ToolError::Partial(
                "all surviving collections returned no evidence".to_string(),
            ));
        }

        Ok(response)
    }

    async fn open_file(&self, input: OpenFileInput) -> Result<OpenFileOutput, ToolError> {
        let (text, end_line) = self
            .reader
            .read_lines(&input.path, input.start_line, input.end_line)
            .await?;
        Ok(OpenFileOutput {
            path: input.path,
            start_line: input.start_line,
            end_line,
            text,
        })
    }

    /// Evidence-first orchestration: gather evidence, refuse without
    /// generation when nothing clears the relevance threshold.
    async fn ask_code(&self, input: AskCodeInput) -> Result<AskCodeOutput, ToolError> {
        let request = QueryRequest {
            text: input.question.clone(),
            repo: input.repo,
            path_prefix: None,
            language: None,
            content_type: input.content_type,
            strict: input.strict,
            top_k: input.top_k.unwrap_or(self.default_top_k),
        };

        let response = self.engine.search(&request).await?;
        let grounded: Vec<EvidenceRecord> = response
            .evidence
            .iter()
            .filter(|record| record.score >= self.min_relevance)
            .cloned()
            .collect();

        if grounded.is_empty() {
            log::info!(
                "No evidence above relevance {} for question; refusing to generate",
                self.min_relevance
            );
            return Ok(AskCodeOutput {
                answer: None,
                confident: false,
                evidence: response.evidence,
                collections: response.collections,
            });
        }

        let answer = self.generator.generate(&input.question, &grounded).await?;
        Ok(AskCodeOutput {
            answer: Some(answer),
            confident: true,
            evidence: grounded,
            collections: response.collections,
        })
    }
}

fn parse_input<T: DeserializeOwned>(input: &Value) -> Result<T, ToolError> {
    serde_json::from_value(input.clone())
        .map_err(|e| ToolError::Validation(format!("invalid input: {e}")))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Internal(format!("serialize: {e}")))
}
