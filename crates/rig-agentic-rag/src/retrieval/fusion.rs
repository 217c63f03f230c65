//! Weighted Reciprocal Rank Fusion
//!
//! score(d) = (1 - w) / (C + r_sim(d) + 1) + w / (C + r_kw(d) + 1)
//!
//! where `r` is the 0-based rank of `d` in each list, `w` the keyword weight
//! and `C` the smoothing constant. A list that does not contain `d`
//! contributes nothing. Only ranks are used, so cosine similarities and BM25
//! scores never need to be made commensurable.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::state::SearchResult;

/// Smoothing constant `C`
pub const RRF_SMOOTHING: f64 = 60.0;

/// Contribution of a hit at 0-based `rank` in a list weighted by `weight`
pub fn rrf_contribution(weight: f64, rank: usize) -> f64 {
    weight / (RRF_SMOOTHING + rank as f64 + 1.0)
}

/// Per-chunk score accumulator that remembers first-seen order
#[derive(Debug, Default)]
struct FusionAccumulator {
    representatives: Vec<SearchResult>,
    scores: Vec<f64>,
    index: HashMap<String, usize>,
}

impl FusionAccumulator {
    fn add(&mut self, result: &SearchResult, contribution: f64) {
        match self.index.get(result.id()) {
            Some(&slot) => self.scores[slot] += contribution,
            None => {
                self.index
                    .insert(result.id().to_string(), self.representatives.len());
                self.representatives.push(result.clone());
                self.scores.push(contribution);
            }
        }
    }

    fn add_list(&mut self, results: &[SearchResult], weight: f64) {
        for (rank, result) in results.iter().enumerate() {
            self.add(result, rrf_contribution(weight, rank));
        }
    }

    /// Sort by fused score, descending; ties keep insertion order
    fn into_ranked(self, k: usize) -> Vec<SearchResult> {
        let mut slots: Vec<usize> = (0..self.representatives.len()).collect();
        slots.sort_by(|&a, &b| {
            self.scores[b]
                .partial_cmp(&self.scores[a])
                .unwrap_or(Ordering::Equal)
        });

        slots
            .into_iter()
            .take(k)
            .map(|slot| {
                let mut fused = self.representatives[slot].clone();
                fused.score = self.scores[slot];
                fused
            })
            .collect()
    }
}

/// Fuse a similarity ranking and a keyword ranking into the top `k` hits.
///
/// The returned results carry the fused score in `score`. When a chunk
/// appears in both lists, the similarity-list record is kept. Empty inputs
/// give an empty output; this function never fails.
pub fn reciprocal_rank_fusion(
    similar: &[SearchResult],
    keyword: &[SearchResult],
    k: usize,
    keyword_weight: f64,
) -> Vec<SearchResult> {
    let keyword_weight = keyword_weight.clamp(0.0, 1.0);

    let mut accumulator = FusionAccumulator::default();
    accumulator.add_list(similar, 1.0 - keyword_weight);
    accumulator.add_list(keyword, keyword_weight);
    accumulator.into_ranked(k)
}
