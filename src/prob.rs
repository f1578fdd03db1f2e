//!
//! Log-space probability calculation
//!
//! * `logsumexp` of a slice
//! * row-wise normalisation of log-likelihood matrices into responsibilities
//! * log factorials and binomial coefficients (via `lgamma`)
//! * `ln_beta` and `digamma` for beta-binomial likelihoods
//!
use libm::lgamma;
use ndarray::{Array1, Array2, Axis};

///
/// `log(sum(exp(x)))` computed stably.
///
/// ```text
/// log(Σ exp(x_i)) = m + log(Σ exp(x_i - m))   where m = max x_i
/// ```
///
/// Returns `-inf` for an empty slice or when every element is `-inf`.
///
pub fn logsumexp(xs: &[f64]) -> f64 {
    let m = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !m.is_finite() {
        return m;
    }
    let s: f64 = xs.iter().map(|x| (x - m).exp()).sum();
    m + s.ln()
}

///
/// Turn each row of a log-likelihood matrix into posterior probabilities in place,
/// and return the log normaliser (marginal log-likelihood) of each row.
///
/// Rows whose entries are all `-inf` become NaN; they are not special-cased.
///
pub fn normalize_log_rows(m: &mut Array2<f64>) -> Array1<f64> {
    let mut norms = Array1::zeros(m.nrows());
    for (mut row, norm) in m.axis_iter_mut(Axis(0)).zip(norms.iter_mut()) {
        let z = match row.as_slice() {
            Some(xs) => logsumexp(xs),
            None => logsumexp(&row.to_vec()),
        };
        row.mapv_inplace(|x| (x - z).exp());
        *norm = z;
    }
    norms
}

///
/// `ln(p)`, with `p` floored at the smallest positive normal `f64`,
/// so that an empty category multiplied by a zero count stays finite.
///
pub fn ln_floor(p: f64) -> f64 {
    p.max(f64::MIN_POSITIVE).ln()
}

/// `ln(n!)`
pub fn ln_factorial(n: u64) -> f64 {
    lgamma(n as f64 + 1.0)
}

/// `ln(n choose k)`
pub fn ln_binomial(n: u64, k: u64) -> f64 {
    assert!(k <= n);
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// `ln B(a, b) = ln Γ(a) + ln Γ(b) - ln Γ(a + b)`
pub fn ln_beta(a: f64, b: f64) -> f64 {
    lgamma(a) + lgamma(b) - lgamma(a + b)
}

///
/// Digamma function `ψ(x) = d/dx ln Γ(x)` for `x > 0`.
///
/// Shifts `x` above 6 with `ψ(x) = ψ(x + 1) - 1/x`, then uses the asymptotic series.
///
pub fn digamma(x: f64) -> f64 {
    if x.is_nan() || x <= 0.0 {
        return f64::NAN;
    }
    let mut x = x;
    let mut acc = 0.0;
    while x < 6.0 {
        acc -= 1.0 / x;
        x += 1.0;
    }
    let f = 1.0 / (x * x);
    let series = f
        * (-1.0 / 12.0
            + f * (1.0 / 120.0
                + f * (-1.0 / 252.0 + f * (1.0 / 240.0 + f * (-1.0 / 132.0)))));
    acc + x.ln() - 0.5 / x + series
}

//
// tests
//
