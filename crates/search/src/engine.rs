use crate::error::{Result, SearchError};
use crate::fusion::{rrf_merge, RankedList, DEFAULT_RRF_K};
use compass_embed::{ContentClass, EmbeddingRouter};
use compass_protocol::{
    CollectionReport, CollectionStatus, ContentType, QueryRequest, SearchResponse,
};
use compass_vector_store::{PointFilter, ScoredPoint, VectorQuery};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Retrieval engine configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Collections are `<stem>__code` and `<stem>__docs`.
    pub collection_stem: String,
    pub per_collection_timeout_ms: u64,
    pub rrf_k: f32,
}

impl SearchConfig {
    pub fn new(collection_stem: impl Into<String>) -> Self {
        Self {
            collection_stem: collection_stem.into(),
            per_collection_timeout_ms: 5_000,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

/// One targeted collection for a request.
#[derive(Debug, Clone, Copy)]
struct Target {
    class: ContentClass,
    content_type: ContentType,
}

const ALL_TARGETS: [Target; 2] = [
    Target {
        class: ContentClass::Code,
        content_type: ContentType::Code,
    },
    Target {
        class: ContentClass::Docs,
        content_type: ContentType::Docs,
    },
];

/// Stateless, request-scoped retrieval over one or both collections.
pub struct RetrievalEngine {
    store: Arc<dyn VectorQuery>,
    router: EmbeddingRouter,
    config: SearchConfig,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn VectorQuery>, router: EmbeddingRouter, config: SearchConfig) -> Self {
        Self {
            store,
            router,
            config,
        }
    }

    /// Execute a query request: fan out to the targeted collections in
    /// parallel, join on completion or per-collection timeout, and merge.
    ///
    /// Failure policy: under `strict` any failed collection fails the whole
    /// query. A query that targets a single collection fails on that
    /// collection's failure regardless of the flag, as does a query where
    /// every targeted collection failed.
    pub async fn search(&self, request: &QueryRequest) -> Result<SearchResponse> {
        if request.text.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query text is empty".to_string()));
        }
        if request.top_k == 0 {
            return Err(SearchError::InvalidQuery("top_k must be >= 1".to_string()));
        }

        let targets: Vec<Target> = match request.content_type {
            ContentType::Code => vec![ALL_TARGETS[0]],
            ContentType::Docs => vec![ALL_TARGETS[1]],
            ContentType::All => ALL_TARGETS.to_vec(),
        };

        let filter = PointFilter {
            repo: request.repo.clone(),
            path_prefix: request.path_prefix.clone(),
            language: request.language.clone(),
            ..Default::default()
        };
        let timeout = Duration::from_millis(self.config.per_collection_timeout_ms);

        let mut tasks: JoinSet<(String, ContentType, u64, Result<Vec<ScoredPoint>>)> =
            JoinSet::new();
        for target in &targets {
            let collection = self.collection_name(target.content_type);
            let content_type = target.content_type;
            let class = target.class;
            let provider = Arc::clone(self.router.provider_for(class));
            let store = Arc::clone(&self.store);
            let filter = filter.clone();
            let text = request.text.clone();
            let top_k = request.top_k;
            let name = collection.clone();

            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = tokio::time::timeout(timeout, async {
                    let vector = provider.embed(&text).await.map_err(|e| {
                        SearchError::CollectionUnavailable {
                            name: name.clone(),
                            message: format!("query embedding failed: {e}"),
                        }
                    })?;
                    store
                        .query(&name, &vector, &filter, top_k)
                        .await
                        .map_err(|e| SearchError::CollectionUnavailable {
                            name: name.clone(),
                            message: e.to_string(),
                        })
                })
                .await
                .unwrap_or_else(|_| {
                    Err(SearchError::CollectionUnavailable {
                        name: name.clone(),
                        message: format!("timed out after {}ms", timeout.as_millis()),
                    })
                });
                (collection, content_type, started.elapsed().as_millis() as u64, outcome)
            });
        }

        let mut reports = Vec::with_capacity(targets.len());
        let mut ranked: Vec<RankedList> = Vec::with_capacity(targets.len());
        let mut first_failure: Option<SearchError> = None;

        while let Some(joined) = tasks.join_next().await {
            let (collection, content_type, latency_ms, outcome) = joined.map_err(|e| {
                SearchError::CollectionUnavailable {
                    name: "unknown".to_string(),
                    message: format!("query task failed: {e}"),
                }
            })?;

            match outcome {
                Ok(hits) => {
                    reports.push(CollectionReport {
                        name: collection.clone(),
                        content_type,
                        hits: hits.len(),
                        latency_ms,
                        status: CollectionStatus::Ok,
                        error: None,
                    });
                    ranked.push(RankedList {
                        collection,
                        content_type,
                        hits,
                    });
                }
                Err(e) => {
                    log::warn!("Collection {collection} query failed: {e}");
                    reports.push(CollectionReport {
                        name: collection,
                        content_type,
                        hits: 0,
                        latency_ms,
                        status: CollectionStatus::Failed,
                        error: Some(e.to_string()),
                    });
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        if let Some(failure) = first_failure {
            let every_target_failed = ranked.is_empty();
            if request.strict || targets.len() == 1 || every_target_failed {
                return Err(failure);
            }
        }

        // Deterministic report order regardless of join completion order.
        reports.sort_by(|a, b| a.name.cmp(&b.name));

        let evidence = rrf_merge(&ranked, self.config.rrf_k, request.top_k);
        Ok(SearchResponse {
            evidence,
            collections: reports,
        })
    }

    fn collection_name(&self, content_type: ContentType) -> String {
        match content_type {
            ContentType::Docs => format!("{}__docs", self.config.collection_stem),
            _ => format!("{}__code", self.config.collection_stem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use compass_embed::EmbeddingProvider;
    use compass_vector_store::{PointPayload, Result as StoreResult, VectorStoreError};
    use pretty_assertions::assert_eq;

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> compass_embed::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    /// Store stub: code collection answers, docs collection (optionally)
    /// fails, simulating an unavailable collection.
    struct StubStore {
        fail_docs: bool,
    }

    fn payload(path: &str, kind: ContentType) -> PointPayload {
        PointPayload {
            repo: "compass".to_string(),
            branch: "main".to_string(),
            commit: "c1".to_string(),
            path: path.to_string(),
            language: "rust".to_string(),
            kind,
            start_line: 1,
            end_line: 10,
            symbols: Vec::new(),
            text: format!("snippet {path}"),
            file_hash: "h".to_string(),
        }
    }

    #[async_trait]
    impl VectorQuery for StubStore {
        async fn query(
            &self,
            collection: &str,
            _vector: &[f32],
            _filter: &PointFilter,
            _top_k: usize,
        ) -> StoreResult<Vec<ScoredPoint>> {
            if collection.ends_with("__docs") {
                if self.fail_docs {
                    return Err(VectorStoreError::CollectionNotFound(collection.to_string()));
                }
                return Ok(vec![ScoredPoint {
                    id: "d1".to_string(),
                    score: 0.8,
                    payload: payload("README.md", ContentType::Docs),
                }]);
            }
            Ok(vec![
                ScoredPoint {
                    id: "c1".to_string(),
                    score: 0.9,
                    payload: payload("src/a.rs", ContentType::Code),
                },
                ScoredPoint {
                    id: "c2".to_string(),
                    score: 0.7,
                    payload: payload("src/b.rs", ContentType::Code),
                },
            ])
        }
    }

    fn engine(fail_docs: bool) -> RetrievalEngine {
        RetrievalEngine::new(
            Arc::new(StubStore { fail_docs }),
            EmbeddingRouter::uniform(Arc::new(StubEmbedder)),
            SearchConfig::new("compass"),
        )
    }

    fn request(content_type: ContentType, strict: bool) -> QueryRequest {
        QueryRequest {
            content_type,
            strict,
            ..QueryRequest::new("where are files read")
        }
    }

    #[tokio::test]
    async fn all_content_types_fan_out_and_merge() {
        let response = engine(false)
            .search(&request(ContentType::All, false))
            .await
            .unwrap();

        assert_eq!(response.collections.len(), 2);
        assert!(response
            .collections
            .iter()
            .all(|c| c.status == CollectionStatus::Ok));
        // Hits from both collections are present in the merged evidence.
        assert!(response.evidence.iter().any(|e| e.content_type == ContentType::Code));
        assert!(response.evidence.iter().any(|e| e.content_type == ContentType::Docs));
    }

    #[tokio::test]
    async fn non_strict_reports_failed_collection_and_proceeds() {
        let response = engine(true)
            .search(&request(ContentType::All, false))
            .await
            .unwrap();

        let docs = response
            .collections
            .iter()
            .find(|c| c.name == "compass__docs")
            .unwrap();
        assert_eq!(docs.status, CollectionStatus::Failed);
        assert!(docs.error.is_some());

        let code = response
            .collections
            .iter()
            .find(|c| c.name == "compass__code")
            .unwrap();
        assert_eq!(code.status, CollectionStatus::Ok);
        assert!(!response.evidence.is_empty());
        assert!(response
            .evidence
            .iter()
            .all(|e| e.content_type == ContentType::Code));
    }

    #[tokio::test]
    async fn strict_fails_whole_query_on_one_collection_failure() {
        let err = engine(true)
            .search(&request(ContentType::All, true))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::CollectionUnavailable { .. }));
    }

    #[tokio::test]
    async fn single_collection_failure_is_total_even_non_strict() {
        let err = engine(true)
            .search(&request(ContentType::Docs, false))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::CollectionUnavailable { .. }));
    }

    #[tokio::test]
    async fn code_only_query_targets_one_collection() {
        let response = engine(false)
            .search(&request(ContentType::Code, false))
            .await
            .unwrap();
        assert_eq!(response.collections.len(), 1);
        assert_eq!(response.collections[0].name, "compass__code");
        assert_eq!(response.evidence.len(), 2);
        assert_eq!(response.evidence[0].path, "src/a.rs");
    }

    #[tokio::test]
    async fn empty_query_text_is_rejected() {
        let mut req = request(ContentType::Code, false);
        req.text = "   ".to_string();
        let err = engine(false).search(&req).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }
}
