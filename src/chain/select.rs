//! Weighted tournament selection.

use std::collections::HashMap;
use std::hash::Hash;

use rand::Rng;

/// Sample `k` candidates uniformly (with replacement) and return the
/// highest-weighted one.
///
/// Degrades gracefully: an empty map yields `None`, a single candidate wins
/// outright, and all-equal weights (zero included) reduce to a uniform pick.
/// Candidates are ordered before sampling so a seeded RNG gives reproducible
/// tournaments.
pub fn tournament_select<K, R>(rng: &mut R, weights: &HashMap<K, f32>, k: usize) -> Option<K>
where
    K: Copy + Eq + Ord + Hash,
    R: Rng,
{
    if weights.is_empty() {
        return None;
    }
    let mut entries: Vec<(K, f32)> = weights.iter().map(|(&k, &w)| (k, w)).collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let rounds = k.max(1);
    let mut best: Option<(K, f32)> = None;
    for _ in 0..rounds {
        let (candidate, weight) = entries[rng.random_range(0..entries.len())];
        match best {
            Some((_, best_weight)) if weight <= best_weight => {}
            _ => best = Some((candidate, weight)),
        }
    }
    best.map(|(candidate, _)| candidate)
}
