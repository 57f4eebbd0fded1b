//! Score normalization and combination.

use fog_core::{MAX_NODE_SCORE, MIN_NODE_SCORE};

/// Rescale one plugin's scores so the maximum becomes [`MAX_NODE_SCORE`].
///
/// Raw scores are clamped into range first. An all-zero vector is left
/// unchanged.
pub fn normalize_scores(scores: &mut [i64]) {
    for s in scores.iter_mut() {
        *s = (*s).clamp(MIN_NODE_SCORE, MAX_NODE_SCORE);
    }
    let max = scores.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return;
    }
    for s in scores.iter_mut() {
        *s = *s * MAX_NODE_SCORE / max;
    }
}

/// Weighted sum of per-plugin score vectors. Every vector must have
/// `nodes` entries.
pub fn combine_scores(per_plugin: &[(i64, Vec<i64>)], nodes: usize) -> Vec<i64> {
    let mut totals = vec![0i64; nodes];
    for (weight, scores) in per_plugin {
        for (total, score) in totals.iter_mut().zip(scores) {
            *total = total.saturating_add(weight.saturating_mul(*score));
        }
    }
    totals
}

/// Index of the highest total; the earliest wins a tie.
pub fn select_best(totals: &[i64]) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (idx, &total) in totals.iter().enumerate() {
        if best.is_none_or(|(_, b)| total > b) {
            best = Some((idx, total));
        }
    }
    best.map(|(idx, _)| idx)
}
