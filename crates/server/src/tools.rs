use compass_protocol::{CollectionReport, ContentType, EvidenceRecord};
use serde::{Deserialize, Serialize};

/// Input for `search_code`: retrieval only, no generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCodeInput {
    pub query: String,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Input for `open_file`: a literal slice of one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFileInput {
    #[serde(default)]
    pub repo: Option<String>,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFileOutput {
    pub path: String,
    pub start_line: usize,
    /// May be smaller than requested under the clamp policy.
    pub end_line: usize,
    pub text: String,
}

/// Input for `ask_code`: retrieval plus grounded generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskCodeInput {
    pub question: String,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// `ask_code` result. `confident: false` with no answer is the
/// evidence-first refusal: nothing cleared the relevance threshold, so no
/// generation was attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskCodeOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub confident: bool,
    pub evidence: Vec<EvidenceRecord>,
    pub collections: Vec<CollectionReport>,
}
