//! Similarity retrieval over a scope's collection.
//!
//! The query is embedded once, scored against the collection by cosine
//! distance, and mapped to a bounded similarity. An empty collection is a
//! valid state and returns an empty result list rather than an error.

use std::collections::HashSet;

use tracing::debug;

use crate::error::Result;
use crate::models::SearchHit;
use crate::scope::Scope;
use crate::service::RagService;

/// Map a cosine distance to a similarity in `[0, 1]`.
///
/// Distances at or below 1 use `1 - d`; larger distances (opposite-facing
/// vectors) fall off as `1 / (1 + d)`. The mapping is not monotonic across
/// the `d = 1` boundary, so results are re-sorted by similarity after
/// mapping rather than relying on distance order.
pub fn distance_to_similarity(distance: f32) -> f32 {
    if distance <= 1.0 {
        (1.0 - distance).max(0.0)
    } else {
        1.0 / (1.0 + distance)
    }
}

impl RagService {
    /// Top-k similarity search within one scope.
    ///
    /// Results are sorted by non-increasing similarity, de-duplicated on
    /// identical chunk text, and truncated to `top_k` (defaulting to the
    /// configured `retrieval.top_k`).
    pub async fn search(
        &self,
        scope: &Scope,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let top_k = top_k.unwrap_or(self.config.retrieval.top_k);

        let collection = self.collection(scope).await?;
        if collection.count().await? == 0 {
            debug!(scope = %scope, "search on empty collection");
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let scored = collection.nearest(&query_vec, top_k).await?;

        let mut hits: Vec<SearchHit> = scored
            .into_iter()
            .map(|(chunk, distance)| SearchHit {
                text: chunk.text,
                file_name: chunk.file_name,
                similarity: distance_to_similarity(distance),
                chunk_index: chunk.chunk_index,
                total_chunks: chunk.total_chunks,
                is_common: scope.is_common(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut seen = HashSet::new();
        hits.retain(|hit| seen.insert(hit.text.clone()));
        hits.truncate(top_k);

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_mapping_near_range() {
        assert!((distance_to_similarity(0.0) - 1.0).abs() < 1e-6);
        assert!((distance_to_similarity(0.25) - 0.75).abs() < 1e-6);
        assert!((distance_to_similarity(1.0) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_mapping_far_range() {
        assert!((distance_to_similarity(2.0) - (1.0 / 3.0)).abs() < 1e-6);
        assert!((distance_to_similarity(3.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_always_in_unit_interval() {
        for d in [0.0f32, 0.5, 0.999, 1.0, 1.001, 1.5, 2.0, 10.0] {
            let s = distance_to_similarity(d);
            assert!((0.0..=1.0).contains(&s), "similarity {} out of range", s);
        }
    }
}
