use crate::provider::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Content class driving model and collection selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    Code,
    Docs,
}

impl ContentClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Docs => "docs",
        }
    }
}

/// Lookup table from content class to the provider configured for it.
///
/// Both entries may point at the same provider when one model serves both
/// classes.
#[derive(Clone)]
pub struct EmbeddingRouter {
    code: Arc<dyn EmbeddingProvider>,
    docs: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingRouter {
    pub fn new(code: Arc<dyn EmbeddingProvider>, docs: Arc<dyn EmbeddingProvider>) -> Self {
        Self { code, docs }
    }

    /// Route both classes to one provider.
    pub fn uniform(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            code: Arc::clone(&provider),
            docs: provider,
        }
    }

    #[must_use]
    pub fn provider_for(&self, class: ContentClass) -> &Arc<dyn EmbeddingProvider> {
        match class {
            ContentClass::Code => &self.code,
            ContentClass::Docs => &self.docs,
        }
    }

    /// Vector dimensionality for a class's collection schema.
    #[must_use]
    pub fn dimension_for(&self, class: ContentClass) -> usize {
        self.provider_for(class).dimension()
    }
}
