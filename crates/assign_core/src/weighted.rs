use rand::Rng;

/// Pick an index with probability proportional to its weight.
///
/// Draws `r` uniformly from `[0, sum)` and returns the first index whose
/// running sum exceeds `r`, so zero-weight entries are never chosen.
/// Returns `None` when there is nothing to draw from (empty or all zero).
pub fn weighted_index<R: Rng + ?Sized>(rng: &mut R, weights: &[u32]) -> Option<usize> {
    let total: u64 = weights.iter().map(|w| *w as u64).sum();
    if total == 0 {
        return None;
    }

    let r = rng.gen_range(0..total);
    let mut cumulative = 0u64;
    for (i, w) in weights.iter().enumerate() {
        cumulative += *w as u64;
        if cumulative > r {
            return Some(i);
        }
    }
    None
}
