//!
//! Genotype mixture over categorical read counts
//!
//! Each sample of a site carries a genotype `aa`, `ab` or `bb`.
//! Given its genotype, a sample's read counts follow a multinomial distribution
//! with genotype-specific category probabilities `rho`
//! (two categories for ref/non-ref counts, i.e. binomial; three with an "other allele" count).
//! The mixture runs over the joint genotype of all samples of the view, with weights `pi`.
//!
//! Training is MAP-EM under Dirichlet priors on `pi` and on every `rho`.
//!
//! Joint class `c` of `n` samples has the genotype of sample `s` at base-3 digit `s`
//! (most significant first), so with two samples class `(i, j)` is `i * 3 + j`.
//!
use super::{run_em, Model};
use crate::common::{Responsibilities, N_GENOTYPES};
use crate::data::DataView;
use crate::prob::{ln_floor, normalize_log_rows};
use anyhow::{ensure, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

///
/// One vector per genotype, each over the count categories.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenotypeTable {
    pub aa: Vec<f64>,
    pub ab: Vec<f64>,
    pub bb: Vec<f64>,
}

impl GenotypeTable {
    /// vectors of `aa`, `ab` and `bb`, indexed by genotype
    pub fn rows(&self) -> [&[f64]; N_GENOTYPES] {
        [self.aa.as_slice(), self.ab.as_slice(), self.bb.as_slice()]
    }
    /// vector of a genotype index, `None` above `bb`
    pub fn get(&self, genotype: usize) -> Option<&[f64]> {
        self.rows().get(genotype).copied()
    }
    pub(super) fn from_fn<F: FnMut(usize) -> Vec<f64>>(mut f: F) -> Self {
        GenotypeTable {
            aa: f(0),
            ab: f(1),
            bb: f(2),
        }
    }
    pub(super) fn all(&self) -> impl Iterator<Item = &f64> + '_ {
        self.aa.iter().chain(self.ab.iter()).chain(self.bb.iter())
    }
    pub(super) fn has_categories(&self, n_categories: usize) -> bool {
        self.rows().iter().all(|v| v.len() == n_categories)
    }
    /// `(genotypes x categories)` matrix of `ln` values
    fn ln_matrix(&self, n_categories: usize) -> Array2<f64> {
        let rows = self.rows();
        Array2::from_shape_fn((N_GENOTYPES, n_categories), |(g, k)| ln_floor(rows[g][k]))
    }
}

///
/// Dirichlet concentrations of the mixture weights and of each sample's
/// genotype category probabilities.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixturePriors {
    /// one concentration per joint class
    pub pi: Vec<f64>,
    /// one table per sample
    pub rho: Vec<GenotypeTable>,
}

impl MixturePriors {
    ///
    /// Check shapes against `n_samples` samples of `n_categories` categories.
    ///
    /// Concentrations must be at least 1 so that the MAP estimate exists.
    ///
    pub fn validate(&self, n_samples: usize, n_categories: usize) -> Result<()> {
        ensure!(
            self.pi.len() == n_classes(n_samples),
            "priors have {} mixture weights, {} samples need {}",
            self.pi.len(),
            n_samples,
            n_classes(n_samples)
        );
        ensure!(
            self.rho.len() == n_samples,
            "priors have {} genotype tables, expected {}",
            self.rho.len(),
            n_samples
        );
        ensure!(
            self.rho.iter().all(|t| t.has_categories(n_categories)),
            "prior genotype tables must have {} categories",
            n_categories
        );
        ensure!(
            self.pi
                .iter()
                .chain(self.rho.iter().flat_map(|t| t.all()))
                .all(|&x| x.is_finite() && x >= 1.0),
            "prior concentrations must be finite and at least 1"
        );
        Ok(())
    }
}

///
/// Mixture weights and per-sample genotype category probabilities.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    pub pi: Vec<f64>,
    pub rho: Vec<GenotypeTable>,
}

impl MixtureParams {
    ///
    /// Prior means, used as the starting point of EM.
    ///
    pub fn from_priors(priors: &MixturePriors) -> Self {
        MixtureParams {
            pi: normalized(priors.pi.clone()),
            rho: priors
                .rho
                .iter()
                .map(|t| GenotypeTable::from_fn(|g| normalized(t.rows()[g].to_vec())))
                .collect(),
        }
    }
    pub fn n_samples(&self) -> usize {
        self.rho.len()
    }
    pub fn validate(&self, n_samples: usize, n_categories: usize) -> Result<()> {
        ensure!(
            self.pi.len() == n_classes(n_samples) && self.rho.len() == n_samples,
            "parameters are for {} samples, data has {}",
            self.rho.len(),
            n_samples
        );
        ensure!(
            self.rho.iter().all(|t| t.has_categories(n_categories)),
            "parameter genotype tables must have {} categories",
            n_categories
        );
        ensure!(
            self.pi
                .iter()
                .chain(self.rho.iter().flat_map(|t| t.all()))
                .all(|&x| x.is_finite() && x >= 0.0),
            "parameters must be finite probabilities"
        );
        Ok(())
    }
}

/// number of joint classes of `n_samples` samples
pub fn n_classes(n_samples: usize) -> usize {
    N_GENOTYPES.pow(n_samples as u32)
}

/// genotype of sample `s` in joint class `class`
pub fn genotype_of(class: usize, s: usize, n_samples: usize) -> usize {
    (class / N_GENOTYPES.pow((n_samples - 1 - s) as u32)) % N_GENOTYPES
}

/// `(classes x genotypes)` indicator of the genotype of sample `s` in each class
pub(super) fn class_indicator(s: usize, n_samples: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_classes(n_samples), N_GENOTYPES), |(c, g)| {
        if genotype_of(c, s, n_samples) == g {
            1.0
        } else {
            0.0
        }
    })
}

/// scale to sum 1; uniform if the sum is zero
pub(super) fn normalized(mut xs: Vec<f64>) -> Vec<f64> {
    let s: f64 = xs.iter().sum();
    let n = xs.len() as f64;
    for x in xs.iter_mut() {
        *x = if s > 0.0 { *x / s } else { 1.0 / n };
    }
    xs
}

///
/// Genotype mixture model over the samples of a `DataView`.
///
/// The number of samples (one for an independent model, two for a joint model)
/// and of count categories are taken from the view.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct CategoricalMixture;

impl CategoricalMixture {
    ///
    /// `(rows x classes)` matrix of `ln pi_c + ln P(counts | class c)`
    /// (multinomial coefficients dropped, they do not depend on the class).
    ///
    fn log_likelihoods(&self, data: &DataView, params: &MixtureParams) -> Array2<f64> {
        let n_samples = data.n_samples();
        let k = data.n_categories();
        let ln_pi: Vec<f64> = params.pi.iter().map(|&p| ln_floor(p)).collect();
        let mut ll = Array2::from_shape_fn((data.n_rows(), n_classes(n_samples)), |(_, c)| {
            ln_pi[c]
        });
        for s in 0..n_samples {
            let x = data.sample(s).mapv(|v| v as f64);
            let per_genotype = x.dot(&params.rho[s].ln_matrix(k).t());
            for c in 0..ll.ncols() {
                let mut column = ll.column_mut(c);
                column += &per_genotype.column(genotype_of(c, s, n_samples));
            }
        }
        ll
    }
    ///
    /// responsibilities and total log-likelihood
    ///
    fn e_step(&self, data: &DataView, params: &MixtureParams) -> (Responsibilities, f64) {
        let mut resp = self.log_likelihoods(data, params);
        let norms = normalize_log_rows(&mut resp);
        (resp, norms.sum())
    }
    ///
    /// MAP estimate of the parameters given responsibilities
    ///
    fn m_step(
        &self,
        data: &DataView,
        resp: &Responsibilities,
        priors: &MixturePriors,
    ) -> MixtureParams {
        let n_samples = data.n_samples();
        let k = data.n_categories();
        let nk = resp.sum_axis(Axis(0));
        let pi = normalized(
            nk.iter()
                .zip(priors.pi.iter())
                .map(|(n, a)| n + a - 1.0)
                .collect(),
        );
        let rho = (0..n_samples)
            .map(|s| {
                let weights = resp.dot(&class_indicator(s, n_samples));
                let x = data.sample(s).mapv(|v| v as f64);
                let expected = weights.t().dot(&x);
                let prior = priors.rho[s].rows();
                GenotypeTable::from_fn(|g| {
                    normalized(
                        (0..k)
                            .map(|j| expected[[g, j]] + prior[g][j] - 1.0)
                            .collect(),
                    )
                })
            })
            .collect();
        MixtureParams { pi, rho }
    }
    ///
    /// `ln` of the (unnormalised) Dirichlet prior densities at `params`
    ///
    fn log_prior(&self, params: &MixtureParams, priors: &MixturePriors) -> f64 {
        let pi: f64 = params
            .pi
            .iter()
            .zip(priors.pi.iter())
            .map(|(&p, &a)| (a - 1.0) * ln_floor(p))
            .sum();
        let rho: f64 = params
            .rho
            .iter()
            .zip(priors.rho.iter())
            .map(|(t, b)| {
                t.all()
                    .zip(b.all())
                    .map(|(&p, &a)| (a - 1.0) * ln_floor(p))
                    .sum::<f64>()
            })
            .sum();
        pi + rho
    }
}

impl Model for CategoricalMixture {
    type Priors = MixturePriors;
    type Params = MixtureParams;

    fn n_classes(&self, n_samples: usize) -> usize {
        n_classes(n_samples)
    }

    fn train(
        &self,
        data: &DataView,
        priors: &MixturePriors,
        max_iters: usize,
        threshold: f64,
    ) -> Result<MixtureParams> {
        priors.validate(data.n_samples(), data.n_categories())?;
        Ok(run_em(
            MixtureParams::from_priors(priors),
            max_iters,
            threshold,
            |params| {
                let (resp, ll) = self.e_step(data, params);
                (resp, ll + self.log_prior(params, priors))
            },
            |_, resp| self.m_step(data, &resp, priors),
        ))
    }

    fn classify(&self, data: &DataView, params: &MixtureParams) -> Result<Responsibilities> {
        params.validate(data.n_samples(), data.n_categories())?;
        let (resp, _) = self.e_step(data, params);
        Ok(resp)
    }
}

//
// tests
//

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::common::Sample;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    /// binomial priors pinning `aa`/`ab`/`bb` near 0%/50%/100% non-reference reads
    pub fn binomial_priors(n_samples: usize) -> MixturePriors {
        MixturePriors {
            pi: vec![2.0; n_classes(n_samples)],
            rho: (0..n_samples)
                .map(|_| GenotypeTable {
                    aa: vec![100.0, 2.0],
                    ab: vec![50.0, 50.0],
                    bb: vec![2.0, 100.0],
                })
                .collect(),
        }
    }

    /// 30 `aa_aa` sites, 10 `aa_ab` sites and 10 `ab_ab` sites
    pub fn joint_counts() -> Array2<u32> {
        let mut rows = Vec::new();
        for _ in 0..30 {
            rows.extend_from_slice(&[50, 0, 48, 2]);
        }
        for _ in 0..10 {
            rows.extend_from_slice(&[50, 1, 25, 25]);
        }
        for _ in 0..10 {
            rows.extend_from_slice(&[24, 26, 26, 24]);
        }
        Array2::from_shape_vec((50, 4), rows).unwrap()
    }

    #[test]
    fn class_layout() {
        assert_eq!(n_classes(1), 3);
        assert_eq!(n_classes(2), 9);
        // class 5 = (ab, bb)
        assert_eq!(genotype_of(5, 0, 2), 1);
        assert_eq!(genotype_of(5, 1, 2), 2);
        assert_eq!(genotype_of(2, 0, 1), 2);
        let ind = class_indicator(1, 2);
        assert_eq!(ind.shape(), &[9, 3]);
        assert_eq!(ind.row(4).to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn genotype_table_lookup() {
        let t = &binomial_priors(1).rho[0];
        assert_eq!(t.get(0), Some(&[100.0, 2.0][..]));
        assert_eq!(t.get(2), Some(&[2.0, 100.0][..]));
        assert_eq!(t.get(3), None);
        assert_eq!(t.rows()[1], &[50.0, 50.0][..]);
    }

    #[test]
    fn train_and_classify_joint() {
        let counts = joint_counts();
        let data = DataView::joint(counts.view());
        let model = CategoricalMixture;
        let params = model.train(&data, &binomial_priors(2), 100, 1e-6).unwrap();

        assert_abs_diff_eq!(params.pi.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        // aa_aa is the most abundant class
        assert!(params.pi[0] > params.pi[1]);
        assert!(params.rho[0].aa[0] > 0.9);

        let resp = model.classify(&data, &params).unwrap();
        assert_eq!(resp.shape(), &[50, 9]);
        for row in resp.outer_iter() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
        assert!(resp[[0, 0]] > 0.99);
        assert!(resp[[35, 1]] > 0.99);
        assert!(resp[[45, 4]] > 0.99);
    }

    #[test]
    fn train_independent_sample() {
        let counts = joint_counts();
        let data = DataView::independent(counts.view(), Sample::Tumour);
        let params = CategoricalMixture
            .train(&data, &binomial_priors(1), 100, 1e-6)
            .unwrap();
        assert_eq!(params.pi.len(), 3);
        let resp = CategoricalMixture.classify(&data, &params).unwrap();
        assert_eq!(resp.shape(), &[50, 3]);
        assert!(resp[[0, 0]] > 0.99);
        assert!(resp[[49, 1]] > 0.99);
    }

    #[test]
    fn zero_iterations_returns_prior_means() {
        let counts = joint_counts();
        let data = DataView::joint(counts.view());
        let priors = binomial_priors(2);
        let params = CategoricalMixture.train(&data, &priors, 0, 1e-6).unwrap();
        assert_eq!(params, MixtureParams::from_priors(&priors));
        assert_abs_diff_eq!(params.pi[3], 1.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let counts = joint_counts();
        let data = DataView::joint(counts.view());
        // independent priors for a joint view
        assert!(CategoricalMixture
            .train(&data, &binomial_priors(1), 10, 1e-6)
            .is_err());
        let mut weak = binomial_priors(2);
        weak.pi[0] = 0.5;
        assert!(CategoricalMixture.train(&data, &weak, 10, 1e-6).is_err());

        let params = MixtureParams::from_priors(&binomial_priors(1));
        assert!(CategoricalMixture.classify(&data, &params).is_err());
    }

    #[test]
    fn empty_data_keeps_prior_modes() {
        let counts: Array2<u32> = Array2::zeros((0, 4));
        let data = DataView::joint(counts.view());
        let params = CategoricalMixture
            .train(&data, &binomial_priors(2), 10, 1e-6)
            .unwrap();
        assert_abs_diff_eq!(params.rho[1].aa[0], 99.0 / 100.0, epsilon = 1e-9);
        let resp = CategoricalMixture.classify(&data, &params).unwrap();
        assert_eq!(resp.shape(), &[0, 9]);
    }
}
