//!
//! Genotype mixture over overdispersed ref/non-ref read counts
//!
//! Given its genotype `g`, a sample's ref/non-ref counts `(a, b)` follow a
//! beta-binomial distribution with shapes `(alpha_g, beta_g)`, i.e. a binomial
//! whose ref proportion is itself drawn from `Beta(alpha_g, beta_g)`.
//! The joint classes and mixture weights `pi` are laid out as in `mixture`.
//!
//! Shapes are parameterised by a mean `mu = alpha / (alpha + beta)` and a precision
//! `s = alpha + beta`. The precision of each genotype is fixed by the priors and sets
//! the overdispersion. The mean is fitted by MAP-EM under a Beta prior with the
//! concentrations of the binomial model, so binomial priors can be reused by adding
//! a `precision` table.
//!
use super::mixture::{
    class_indicator, genotype_of, n_classes, normalized, GenotypeTable, MixturePriors,
};
use super::{run_em, Model};
use crate::common::{Responsibilities, N_GENOTYPES};
use crate::data::DataView;
use crate::prob::{digamma, ln_beta, ln_floor, normalize_log_rows};
use anyhow::{ensure, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ref and non-ref
const N_CATEGORIES: usize = 2;

/// means are kept inside `[MIN_MEAN, 1 - MIN_MEAN]`
const MIN_MEAN: f64 = 1e-9;

/// bisection steps of the mean update
const MAX_BISECTIONS: usize = 100;

///
/// Priors of the beta-binomial mixture.
///
/// `pi` and `rho` are the Dirichlet and Beta concentrations of `MixturePriors`;
/// `precision` holds `alpha + beta` of `aa`, `ab` and `bb` for each sample.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BetaBinomialPriors {
    #[serde(flatten)]
    pub mixture: MixturePriors,
    pub precision: Vec<[f64; N_GENOTYPES]>,
}

impl BetaBinomialPriors {
    pub fn validate(&self, n_samples: usize, n_categories: usize) -> Result<()> {
        ensure!(
            n_categories == N_CATEGORIES,
            "the beta-binomial density needs ref/non-ref counts, got {} categories",
            n_categories
        );
        self.mixture.validate(n_samples, n_categories)?;
        ensure!(
            self.precision.len() == n_samples,
            "priors have {} precision tables, expected {}",
            self.precision.len(),
            n_samples
        );
        ensure!(
            self.precision
                .iter()
                .flatten()
                .all(|&x| x.is_finite() && x > 0.0),
            "precisions must be finite and positive"
        );
        Ok(())
    }
}

///
/// Mixture weights and per-sample `[alpha, beta]` of each genotype.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BetaBinomialParams {
    pub pi: Vec<f64>,
    pub shape: Vec<GenotypeTable>,
}

/// `[alpha, beta]` of mean `mu` and precision `s`
fn shape_of(mu: f64, s: f64) -> Vec<f64> {
    vec![mu * s, (1.0 - mu) * s]
}

/// mean `alpha / (alpha + beta)` of a shape pair
fn mean_of(shape: &[f64]) -> f64 {
    shape[0] / (shape[0] + shape[1])
}

impl BetaBinomialParams {
    ///
    /// Prior mean proportions at the prior precisions, the starting point of EM.
    ///
    pub fn from_priors(priors: &BetaBinomialPriors) -> Self {
        let shape = priors
            .mixture
            .rho
            .iter()
            .zip(priors.precision.iter())
            .map(|(t, precision)| {
                let rows = t.rows();
                GenotypeTable::from_fn(|g| {
                    let mu = normalized(rows[g].to_vec())[0].clamp(MIN_MEAN, 1.0 - MIN_MEAN);
                    shape_of(mu, precision[g])
                })
            })
            .collect();
        BetaBinomialParams {
            pi: normalized(priors.mixture.pi.clone()),
            shape,
        }
    }
    pub fn validate(&self, n_samples: usize, n_categories: usize) -> Result<()> {
        ensure!(
            n_categories == N_CATEGORIES,
            "the beta-binomial density needs ref/non-ref counts, got {} categories",
            n_categories
        );
        ensure!(
            self.pi.len() == n_classes(n_samples) && self.shape.len() == n_samples,
            "parameters are for {} samples, data has {}",
            self.shape.len(),
            n_samples
        );
        ensure!(
            self.shape.iter().all(|t| t.has_categories(N_CATEGORIES)),
            "shape tables must hold [alpha, beta] of each genotype"
        );
        ensure!(
            self.pi.iter().all(|&x| x.is_finite() && x >= 0.0),
            "mixture weights must be finite probabilities"
        );
        ensure!(
            self.shape
                .iter()
                .flat_map(|t| t.all())
                .all(|&x| x.is_finite() && x > 0.0),
            "shapes must be finite and positive"
        );
        Ok(())
    }
}

///
/// `ln P(a, b | alpha, beta)` of a beta-binomial without the binomial coefficient,
/// which does not depend on the genotype.
///
pub fn ln_beta_binomial(a: u32, b: u32, alpha: f64, beta: f64) -> f64 {
    ln_beta(a as f64 + alpha, b as f64 + beta) - ln_beta(alpha, beta)
}

/// `ψ(n + x) - ψ(x)`, exactly zero when `n` is zero
fn digamma_step(n: u32, x: f64) -> f64 {
    if n == 0 {
        0.0
    } else {
        digamma(n as f64 + x) - digamma(x)
    }
}

///
/// MAP mean of one genotype of one sample.
///
/// `counts` maps distinct `(a, b)` counts to their summed responsibility. The log
/// posterior is concave in the mean, so its derivative is bisected for the root.
///
fn fit_mean(counts: &[((u32, u32), f64)], precision: f64, prior: &[f64]) -> f64 {
    let (pa, pb) = (prior[0] - 1.0, prior[1] - 1.0);
    let gradient = |mu: f64| {
        let (x, y) = (mu * precision, (1.0 - mu) * precision);
        let data: f64 = counts
            .iter()
            .map(|&((a, b), w)| w * (digamma_step(a, x) - digamma_step(b, y)))
            .sum();
        precision * data + pa / mu - pb / (1.0 - mu)
    };

    let (mut lo, mut hi) = (MIN_MEAN, 1.0 - MIN_MEAN);
    if gradient(lo) <= 0.0 {
        return lo;
    }
    if gradient(hi) >= 0.0 {
        return hi;
    }
    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if gradient(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    0.5 * (lo + hi)
}

///
/// Beta-binomial genotype mixture over the samples of a ref/non-ref `DataView`.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct BetaBinomialMixture;

impl BetaBinomialMixture {
    fn log_likelihoods(&self, data: &DataView, params: &BetaBinomialParams) -> Array2<f64> {
        let n_samples = data.n_samples();
        let ln_pi: Vec<f64> = params.pi.iter().map(|&p| ln_floor(p)).collect();
        let mut ll = Array2::from_shape_fn((data.n_rows(), n_classes(n_samples)), |(_, c)| {
            ln_pi[c]
        });
        for s in 0..n_samples {
            let x = data.sample(s);
            let shapes = params.shape[s].rows();
            let per_genotype = Array2::from_shape_fn((data.n_rows(), N_GENOTYPES), |(i, g)| {
                ln_beta_binomial(x[[i, 0]], x[[i, 1]], shapes[g][0], shapes[g][1])
            });
            for c in 0..ll.ncols() {
                let mut column = ll.column_mut(c);
                column += &per_genotype.column(genotype_of(c, s, n_samples));
            }
        }
        ll
    }
    fn e_step(&self, data: &DataView, params: &BetaBinomialParams) -> (Responsibilities, f64) {
        let mut resp = self.log_likelihoods(data, params);
        let norms = normalize_log_rows(&mut resp);
        (resp, norms.sum())
    }
    fn m_step(
        &self,
        data: &DataView,
        resp: &Responsibilities,
        priors: &BetaBinomialPriors,
    ) -> BetaBinomialParams {
        let n_samples = data.n_samples();
        let nk = resp.sum_axis(Axis(0));
        let pi = normalized(
            nk.iter()
                .zip(priors.mixture.pi.iter())
                .map(|(n, a)| n + a - 1.0)
                .collect(),
        );
        let shape = (0..n_samples)
            .map(|s| {
                let weights = resp.dot(&class_indicator(s, n_samples));
                let x = data.sample(s);
                // responsibilities summed over rows of equal counts
                let mut grouped: BTreeMap<(u32, u32), [f64; N_GENOTYPES]> = BTreeMap::new();
                for (i, w) in weights.outer_iter().enumerate() {
                    let entry = grouped.entry((x[[i, 0]], x[[i, 1]])).or_default();
                    for g in 0..N_GENOTYPES {
                        entry[g] += w[g];
                    }
                }
                let prior = priors.mixture.rho[s].rows();
                GenotypeTable::from_fn(|g| {
                    let counts: Vec<((u32, u32), f64)> =
                        grouped.iter().map(|(&k, w)| (k, w[g])).collect();
                    let precision = priors.precision[s][g];
                    shape_of(fit_mean(&counts, precision, prior[g]), precision)
                })
            })
            .collect();
        BetaBinomialParams { pi, shape }
    }
    ///
    /// `ln` of the (unnormalised) Dirichlet prior of `pi` and Beta priors of the means
    ///
    fn log_prior(&self, params: &BetaBinomialParams, priors: &BetaBinomialPriors) -> f64 {
        let pi: f64 = params
            .pi
            .iter()
            .zip(priors.mixture.pi.iter())
            .map(|(&p, &a)| (a - 1.0) * ln_floor(p))
            .sum();
        let mean: f64 = params
            .shape
            .iter()
            .zip(priors.mixture.rho.iter())
            .map(|(t, b)| {
                t.rows()
                    .iter()
                    .zip(b.rows().iter())
                    .map(|(shape, prior)| {
                        let mu = mean_of(shape);
                        (prior[0] - 1.0) * ln_floor(mu) + (prior[1] - 1.0) * ln_floor(1.0 - mu)
                    })
                    .sum::<f64>()
            })
            .sum();
        pi + mean
    }
}

impl Model for BetaBinomialMixture {
    type Priors = BetaBinomialPriors;
    type Params = BetaBinomialParams;

    fn n_classes(&self, n_samples: usize) -> usize {
        n_classes(n_samples)
    }

    fn train(
        &self,
        data: &DataView,
        priors: &BetaBinomialPriors,
        max_iters: usize,
        threshold: f64,
    ) -> Result<BetaBinomialParams> {
        priors.validate(data.n_samples(), data.n_categories())?;
        Ok(run_em(
            BetaBinomialParams::from_priors(priors),
            max_iters,
            threshold,
            |params| {
                let (resp, ll) = self.e_step(data, params);
                (resp, ll + self.log_prior(params, priors))
            },
            |_, resp| self.m_step(data, &resp, priors),
        ))
    }

    fn classify(&self, data: &DataView, params: &BetaBinomialParams) -> Result<Responsibilities> {
        params.validate(data.n_samples(), data.n_categories())?;
        let (resp, _) = self.e_step(data, params);
        Ok(resp)
    }
}

//
// tests
//
