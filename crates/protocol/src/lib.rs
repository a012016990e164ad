//! # Compass Protocol
//!
//! Wire types shared by the tool protocol handler, the retrieval engine and
//! the indexing pipeline: request/response envelopes, the error taxonomy and
//! the evidence record shape returned to callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const TOOL_PROTOCOL_VERSION: u32 = 1;

/// Content class a chunk (and its collection) belongs to.
///
/// `All` is only valid in queries; stored points are always `Code` or `Docs`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Code,
    Docs,
    All,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Docs => "docs",
            Self::All => "all",
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::All
    }
}

/// Outcome of querying one collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Ok,
    Failed,
}

/// Per-collection accounting attached to every search response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CollectionReport {
    pub name: String,
    pub content_type: ContentType,
    pub hits: usize,
    pub latency_ms: u64,
    pub status: CollectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The unit returned to a caller. Every field traces to a stored vector
/// point or to a direct file read; nothing here is synthesized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct EvidenceRecord {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
    /// Similarity score from the collection that produced this record.
    pub score: f32,
    pub collection: String,
    pub content_type: ContentType,
}

/// A retrieval request against one or both collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

const fn default_top_k() -> usize {
    10
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            repo: None,
            path_prefix: None,
            language: None,
            content_type: ContentType::All,
            strict: false,
            top_k: default_top_k(),
        }
    }
}

/// Result of a `search_code` call: fused evidence plus per-collection status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SearchResponse {
    pub evidence: Vec<EvidenceRecord>,
    pub collections: Vec<CollectionReport>,
}

/// Error taxonomy shared across every tool response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed request or input.
    Validation,
    /// No matching evidence, file or range.
    NotFound,
    /// Path traversal or disallowed location. Never retried.
    Security,
    /// Embedding, vector-store or generation provider failure.
    UpstreamUnavailable,
    /// Non-strict multi-collection query with at least one failed collection.
    PartialFailure,
    /// Unexpected failure.
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Security => "security",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::PartialFailure => "partial_failure",
            Self::Internal => "internal",
        }
    }
}

/// Structured error carried in failing tool responses.
///
/// Messages must stay safe for clients: no stack traces, no absolute
/// filesystem paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Security, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One request line on the tool protocol channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ToolRequest {
    pub id: serde_json::Value,
    pub tool: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

/// One response line on the tool protocol channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ToolResponse {
    pub id: serde_json::Value,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl ToolResponse {
    #[must_use]
    pub fn success(id: serde_json::Value, output: serde_json::Value) -> Self {
        Self {
            id,
            ok: true,
            output: Some(output),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: serde_json::Value, error: ErrorEnvelope) -> Self {
        Self {
            id,
            ok: false,
            output: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn content_type_round_trips_snake_case() {
        assert_eq!(serde_json::to_value(ContentType::Code).unwrap(), json!("code"));
        assert_eq!(serde_json::to_value(ContentType::All).unwrap(), json!("all"));
        let parsed: ContentType = serde_json::from_value(json!("docs")).unwrap();
        assert_eq!(parsed, ContentType::Docs);
    }

    #[test]
    fn query_request_defaults() {
        let req: QueryRequest = serde_json::from_value(json!({"text": "where is auth"})).unwrap();
        assert_eq!(req.content_type, ContentType::All);
        assert_eq!(req.top_k, 10);
        assert!(!req.strict);
    }

    #[test]
    fn failure_response_carries_error_kind() {
        let resp = ToolResponse::failure(
            json!(7),
            ErrorEnvelope::security("path escapes repository root: ../../etc/passwd"),
        );
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["error"]["kind"], json!("security"));
        assert!(value.get("output").is_none());
    }

    #[test]
    fn success_response_omits_error() {
        let resp = ToolResponse::success(json!("a1"), json!({"answer": 42}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["ok"], json!(true));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn error_kind_strings_are_stable() {
        assert_eq!(ErrorKind::UpstreamUnavailable.as_str(), "upstream_unavailable");
        assert_eq!(ErrorKind::PartialFailure.as_str(), "partial_failure");
    }
}
