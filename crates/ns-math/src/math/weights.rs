//! Normalized log-weight utilities.
//!
//! Posterior weights are carried in the log domain end to end; these helpers
//! normalize them and summarize how concentrated they are.

use super::stable::log_sum_exp;

/// Normalize log weights in place so that `sum(exp(w)) == 1`.
///
/// Returns the log normalizer that was subtracted. Slices that are empty or
/// hold only -inf are left untouched and NEG_INFINITY is returned.
pub fn normalize_log_weights(log_weights: &mut [f64]) -> f64 {
    let log_total = log_sum_exp(log_weights);
    if !log_total.is_finite() {
        return log_total;
    }
    for w in log_weights.iter_mut() {
        *w -= log_total;
    }
    log_total
}

/// Effective sample size of a normalized log-weight distribution.
///
/// `exp(-sum(p * ln p))`, the exponential of the Shannon entropy. Terms whose
/// probability underflows to zero contribute nothing.
pub fn entropy_ess(log_weights: &[f64]) -> f64 {
    let mut entropy = 0.0;
    for &w in log_weights {
        let p = w.exp();
        if p > 0.0 {
            entropy -= p * w;
        }
    }
    entropy.exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sums_to_one() {
        let mut w = vec![-1.0, 0.5, -3.0, 2.0];
        let log_total = normalize_log_weights(&mut w);
        let total: f64 = w.iter().map(|x| x.exp()).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((log_total - log_sum_exp(&[-1.0, 0.5, -3.0, 2.0])).abs() < 1e-12);
    }

    #[test]
    fn normalize_leaves_all_neg_inf_alone() {
        let mut w = vec![f64::NEG_INFINITY; 3];
        assert_eq!(normalize_log_weights(&mut w), f64::NEG_INFINITY);
        assert!(w.iter().all(|x| *x == f64::NEG_INFINITY));
    }

    #[test]
    fn ess_of_uniform_weights_is_count() {
        let n = 37usize;
        let w = vec![-(n as f64).ln(); n];
        assert!((entropy_ess(&w) - n as f64).abs() < 1e-9);
    }

    #[test]
    fn ess_of_point_mass_is_one() {
        let w = [0.0, f64::NEG_INFINITY, f64::NEG_INFINITY];
        assert!((entropy_ess(&w) - 1.0).abs() < 1e-15);
    }
}
