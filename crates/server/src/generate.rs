use crate::error::ToolError;
use async_trait::async_trait;
use compass_protocol::EvidenceRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Answer-generation collaborator: receives only the evidence the retrieval
/// engine selected, never raw repository content beyond it.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        evidence: &[EvidenceRecord],
    ) -> Result<String, ToolError>;
}

/// Generator speaking the OpenAI chat-completions wire format.
pub struct HttpAnswerGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl HttpAnswerGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("compass/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }

    fn grounding_prompt(question: &str, evidence: &[EvidenceRecord]) -> String {
        let mut prompt = String::from(
            "Answer the question using only the evidence passages below. \
             Cite passages by path and line range. If the evidence is \
             insufficient, say so.\n\n",
        );
        for (i, record) in evidence.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] {}:{}-{}\n{}\n\n",
                i + 1,
                record.path,
                record.start_line,
                record.end_line,
                record.snippet
            ));
        }
        prompt.push_str(&format!("Question: {question}\n"));
        prompt
    }
}

#[async_trait]
impl AnswerGenerator for HttpAnswerGenerator {
    async fn generate(
        &self,
        question: &str,
        evidence: &[EvidenceRecord],
    ) -> Result<String, ToolError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Self::grounding_prompt(question, evidence),
            }],
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ToolError::Upstream(format!("generation provider: {e}")))?;
        if !resp.status().is_success() {
            return Err(ToolError::Upstream(format!(
                "generation provider returned {}",
                resp.status()
            )));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ToolError::Upstream(format!("generation response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ToolError::Upstream("generation provider returned no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_protocol::ContentType;

    #[test]
    fn prompt_contains_only_selected_evidence() {
        let evidence = vec![EvidenceRecord {
            path: "src/auth.rs".to_string(),
            start_line: 10,
            end_line: 20,
            snippet: "fn verify_token() {}".to_string(),
            score: 0.9,
            collection: "repo__code".to_string(),
            content_type: ContentType::Code,
        }];
        let prompt = HttpAnswerGenerator::grounding_prompt("how is auth verified?", &evidence);
        assert!(prompt.contains("src/auth.rs:10-20"));
        assert!(prompt.contains("fn verify_token() {}"));
        assert!(prompt.contains("how is auth verified?"));
    }
}
