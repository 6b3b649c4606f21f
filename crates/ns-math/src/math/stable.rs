//! Numerically stable primitives for log-domain quadrature.

use thiserror::Error;

/// Raised when `log_diff_exp` is asked for a negative mass.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("log_diff_exp({a}, {b}) is undefined: requires a >= b")]
pub struct LogDiffError {
    pub a: f64,
    pub b: f64,
}

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (-diff).exp().ln_1p()
}

/// Stable log(exp(a) - exp(b)).
///
/// `b == -inf` leaves `a` unchanged and `a == b` is an empty mass
/// (NEG_INFINITY). `b > a`, or a NaN operand, is an error.
pub fn log_diff_exp(a: f64, b: f64) -> Result<f64, LogDiffError> {
    if a.is_nan() || b.is_nan() || b > a {
        return Err(LogDiffError { a, b });
    }
    if b == f64::NEG_INFINITY {
        return Ok(a);
    }
    if a == b {
        return Ok(f64::NEG_INFINITY);
    }
    if a == f64::INFINITY {
        return Ok(f64::INFINITY);
    }
    Ok(a + log1mexp(b - a))
}

/// log(1 - exp(x)) for x < 0, switching form at -ln 2 so neither branch
/// cancels.
fn log1mexp(x: f64) -> f64 {
    if x > -std::f64::consts::LN_2 {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}
