use compass_protocol::{ContentType, EvidenceRecord};
use compass_vector_store::ScoredPoint;
use std::collections::HashMap;

/// RRF constant `k`. Dampens the advantage of rank 1 over rank 2 so items
/// ranked well by either list beat items ranked mediocrely by both.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// One collection's ranked hits, in the order the collection returned them.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub collection: String,
    pub content_type: ContentType,
    pub hits: Vec<ScoredPoint>,
}

struct Fused {
    record: EvidenceRecord,
    rrf_score: f32,
    best_rank: usize,
}

/// Reciprocal Rank Fusion across independently ranked lists.
///
/// Each item contributes `1 / (k + rank)` per list it appears in (rank is
/// 1-based); contributions are summed. Rank-based fusion is robust to the
/// lists carrying incomparable raw similarity scales. Ordering is fully
/// deterministic: summed score descending, then best single-list rank, then
/// path.
#[must_use]
pub fn rrf_merge(lists: &[RankedList], k: f32, limit: usize) -> Vec<EvidenceRecord> {
    let mut fused: HashMap<String, Fused> = HashMap::new();

    for list in lists {
        for (index, hit) in list.hits.iter().enumerate() {
            let rank = index + 1;
            let contribution = 1.0 / (k + rank as f32);

            match fused.get_mut(&hit.id) {
                Some(entry) => {
                    entry.rrf_score += contribution;
                    if rank < entry.best_rank {
                        // Keep the record from the list that ranked it best.
                        entry.best_rank = rank;
                        entry.record = to_record(hit, list);
                    }
                }
                None => {
                    fused.insert(
                        hit.id.clone(),
                        Fused {
                            record: to_record(hit, list),
                            rrf_score: contribution,
                            best_rank: rank,
                        },
                    );
                }
            }
        }
    }

    let mut merged: Vec<Fused> = fused.into_values().collect();
    merged.sort_by(|a, b| {
        b.rrf_score
            .partial_cmp(&a.rrf_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.best_rank.cmp(&b.best_rank))
            .then_with(|| a.record.path.cmp(&b.record.path))
    });
    merged.truncate(limit);
    merged.into_iter().map(|f| f.record).collect()
}

fn to_record(hit: &ScoredPoint, list: &RankedList) -> EvidenceRecord {
    EvidenceRecord {
        path: hit.payload.path.clone(),
        start_line: hit.payload.start_line,
        end_line: hit.payload.end_line,
        snippet: hit.payload.text.clone(),
        score: hit.score,
        collection: list.collection.clone(),
        content_type: list.content_type,
    }
}
