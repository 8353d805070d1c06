//! Exact one-sided binomial test.

use statrs::distribution::{Binomial, DiscreteCDF};

/// P(X >= wins) for X ~ Binomial(n, p): the p-value of the "greater"
/// alternative against success probability `p`.
///
/// Invalid parameters (p outside [0, 1], wins > n) give 1.0, which never
/// passes a significance gate.
pub fn binomial_p_greater(wins: u64, n: u64, p: f64) -> f64 {
    if wins == 0 {
        return 1.0;
    }
    if wins > n {
        return 1.0;
    }
    match Binomial::new(p, n) {
        // sf(x) = P(X > x)
        Ok(dist) => dist.sf(wins - 1).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}
