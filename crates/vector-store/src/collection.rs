use crate::error::{Result, VectorStoreError};
use crate::types::{
    CollectionSchema, PointFilter, ScoredPoint, UpsertOutcome, VectorPoint,
};
use compass_protocol::ContentType;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named collection: a schema plus points keyed by their deterministic
/// id. BTreeMap keeps iteration (and persistence) order stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    schema: CollectionSchema,
    points: BTreeMap<String, VectorPoint>,
}

impl Collection {
    #[must_use]
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            points: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn schema(&self) -> CollectionSchema {
        self.schema
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&VectorPoint> {
        self.points.get(id)
    }

    /// Upsert a batch of points. Replace-in-place by id: re-submitting an
    /// identical point leaves the collection in the same logical state and
    /// is counted as `unchanged`.
    pub fn upsert(&mut self, points: Vec<VectorPoint>) -> Result<UpsertOutcome> {
        let mut outcome = UpsertOutcome::default();

        for point in points {
            if point.vector.len() != self.schema.vector_size {
                return Err(VectorStoreError::InvalidDimension {
                    expected: self.schema.vector_size,
                    actual: point.vector.len(),
                });
            }
            if point.payload.kind == ContentType::All {
                return Err(VectorStoreError::InvalidPayload(
                    "stored point kind must be code or docs".to_string(),
                ));
            }

            match self.points.get(&point.id) {
                Some(existing) if existing == &point => outcome.unchanged += 1,
                _ => {
                    self.points.insert(point.id.clone(), point);
                    outcome.written += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Delete every point matching the filter. Returns the removed count.
    pub fn delete(&mut self, filter: &PointFilter) -> usize {
        let before = self.points.len();
        self.points.retain(|_, point| !filter.matches(&point.payload));
        before - self.points.len()
    }

    /// Top-k nearest neighbors by cosine similarity among points matching
    /// the filter. Ties break by id for deterministic ordering.
    pub fn query(
        &self,
        vector: &[f32],
        filter: &PointFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        if vector.len() != self.schema.vector_size {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.schema.vector_size,
                actual: vector.len(),
            });
        }

        let query = ArrayView1::from(vector);
        let query_norm = query.dot(&query).sqrt();

        let mut scored: Vec<ScoredPoint> = self
            .points
            .values()
            .filter(|point| filter.matches(&point.payload))
            .map(|point| {
                let candidate = ArrayView1::from(point.vector.as_slice());
                let denom = query_norm * candidate.dot(&candidate).sqrt();
                let score = if denom > 0.0 {
                    query.dot(&candidate) / denom
                } else {
                    0.0
                };
                ScoredPoint {
                    id: point.id.clone(),
                    score,
                    payload: point.payload.clone(),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistanceMetric, PointPayload};
    use pretty_assertions::assert_eq;

    fn schema() -> CollectionSchema {
        CollectionSchema {
            vector_size: 3,
            metric: DistanceMetric::Cosine,
        }
    }

    fn point(id: &str, vector: [f32; 3], path: &str, commit: &str) -> VectorPoint {
        VectorPoint {
            id: id.to_string(),
            vector: vector.to_vec(),
            payload: PointPayload {
                repo: "compass".to_string(),
                branch: "main".to_string(),
                commit: commit.to_string(),
                path: path.to_string(),
                language: "rust".to_string(),
                kind: ContentType::Code,
                start_line: 1,
                end_line: 5,
                symbols: Vec::new(),
                text: "fn x() {}".to_string(),
                file_hash: "h".to_string(),
            },
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut collection = Collection::new(schema());
        let p = point("p1", [1.0, 0.0, 0.0], "src/a.rs", "c1");

        let first = collection.upsert(vec![p.clone()]).unwrap();
        assert_eq!(first, UpsertOutcome { written: 1, unchanged: 0 });

        let second = collection.upsert(vec![p]).unwrap();
        assert_eq!(second, UpsertOutcome { written: 0, unchanged: 1 });
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn upsert_replaces_changed_point_in_place() {
        let mut collection = Collection::new(schema());
        collection
            .upsert(vec![point("p1", [1.0, 0.0, 0.0], "src/a.rs", "c1")])
            .unwrap();
        let outcome = collection
            .upsert(vec![point("p1", [0.0, 1.0, 0.0], "src/a.rs", "c1")])
            .unwrap();
        assert_eq!(outcome.written, 1);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get("p1").unwrap().vector, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn upsert_rejects_wrong_dimension() {
        let mut collection = Collection::new(schema());
        let mut p = point("p1", [1.0, 0.0, 0.0], "src/a.rs", "c1");
        p.vector = vec![1.0, 0.0];
        assert!(matches!(
            collection.upsert(vec![p]),
            Err(VectorStoreError::InvalidDimension { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn delete_by_path_and_stale_commit() {
        let mut collection = Collection::new(schema());
        collection
            .upsert(vec![
                point("p1", [1.0, 0.0, 0.0], "src/a.rs", "c1"),
                point("p2", [0.0, 1.0, 0.0], "src/a.rs", "c2"),
                point("p3", [0.0, 0.0, 1.0], "src/b.rs", "c1"),
            ])
            .unwrap();

        let removed = collection.delete(&PointFilter {
            path: Some("src/a.rs".to_string()),
            commit_not: Some("c2".to_string()),
            ..Default::default()
        });

        assert_eq!(removed, 1);
        assert!(collection.get("p1").is_none());
        assert!(collection.get("p2").is_some());
        assert!(collection.get("p3").is_some());
    }

    #[test]
    fn query_ranks_by_cosine_with_stable_ties() {
        let mut collection = Collection::new(schema());
        collection
            .upsert(vec![
                point("b", [1.0, 0.0, 0.0], "src/b.rs", "c1"),
                point("a", [1.0, 0.0, 0.0], "src/a.rs", "c1"),
                point("c", [0.0, 1.0, 0.0], "src/c.rs", "c1"),
            ])
            .unwrap();

        let hits = collection
            .query(&[1.0, 0.0, 0.0], &PointFilter::default(), 3)
            .unwrap();
        assert_eq!(hits.len(), 3);
        // Equal scores: id order decides.
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
        assert_eq!(hits[2].id, "c");
        assert!(hits[0].score > hits[2].score);
    }

    #[test]
    fn query_applies_filter_before_ranking() {
        let mut collection = Collection::new(schema());
        collection
            .upsert(vec![
                point("a", [1.0, 0.0, 0.0], "src/a.rs", "c1"),
                point("b", [1.0, 0.0, 0.0], "tests/b.rs", "c1"),
            ])
            .unwrap();

        let hits = collection
            .query(
                &[1.0, 0.0, 0.0],
                &PointFilter {
                    path_prefix: Some("src/".to_string()),
                    ..Default::default()
                },
                10,
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.path, "src/a.rs");
    }
}
