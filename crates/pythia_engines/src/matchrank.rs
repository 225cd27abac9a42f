#![forbid(unsafe_code)]

use std::cmp::Ordering;

use pythia_kernel_contracts::matchrun::{InvestorCandidate, MatchRow};
use pythia_kernel_contracts::weights::WeightSet;

/// Component-weighted fit score on the [0,100] scale.
pub fn score_candidate(weights: &WeightSet, candidate: &InvestorCandidate) -> f64 {
    let c = &weights.component_weights;
    let f = &candidate.fit;
    let weighted = c.team * f.team
        + c.traction * f.traction
        + c.market * f.market
        + c.product * f.product
        + c.moat * f.moat;
    let scaled = weighted * weights.final_score_multiplier * 10.0 / weights.normalization_divisor;
    scaled.clamp(0.0, 100.0)
}

/// Rank candidates by score descending, investor id ascending for ties, and
/// truncate to `limit`. Deterministic for identical inputs.
pub fn rank_candidates(
    weights: &WeightSet,
    candidates: &[InvestorCandidate],
    limit: usize,
) -> Vec<MatchRow> {
    let mut rows: Vec<MatchRow> = candidates
        .iter()
        .map(|candidate| MatchRow {
            investor_id: candidate.investor_id.clone(),
            score: score_candidate(weights, candidate),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.investor_id.cmp(&b.investor_id))
    });
    rows.truncate(limit);
    rows
}
