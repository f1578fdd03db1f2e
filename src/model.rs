//!
//! Classification models
//!
//! * `mixture`: genotype mixture over per-sample categorical read counts, trained by MAP-EM
//! * `beta_binomial`: genotype mixture over overdispersed ref/non-ref counts
//! * `fisher`: label assignment by a Fisher exact test, without training
//!
pub mod beta_binomial;
pub mod fisher;
pub mod mixture;

use crate::common::Responsibilities;
use crate::data::DataView;
use anyhow::Result;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

///
/// A trainable classifier of sites into latent classes.
///
pub trait Model {
    /// prior specification consumed by `train`
    type Priors: Clone + std::fmt::Debug + Serialize + DeserializeOwned;
    /// trained state consumed by `classify`
    type Params: Clone + std::fmt::Debug + Serialize + DeserializeOwned;
    /// number of classes of a view of `n_samples` samples
    fn n_classes(&self, n_samples: usize) -> usize;
    ///
    /// Estimate parameters from `data`, stopping after `max_iters` iterations
    /// or when the objective changes by less than `threshold`.
    ///
    fn train(
        &self,
        data: &DataView,
        priors: &Self::Priors,
        max_iters: usize,
        threshold: f64,
    ) -> Result<Self::Params>;
    ///
    /// Posterior class probabilities `(rows x classes)` of each site.
    ///
    fn classify(&self, data: &DataView, params: &Self::Params) -> Result<Responsibilities>;
}

///
/// Alternate `e_step` and `m_step` from `init` for at most `max_iters` iterations.
///
/// `e_step` returns its statistics and the objective (log posterior) at the current
/// parameters. Iteration stops once the objective changes by less than `threshold`,
/// returning the parameters it was evaluated at.
///
pub fn run_em<P, T, E, M>(
    init: P,
    max_iters: usize,
    threshold: f64,
    mut e_step: E,
    mut m_step: M,
) -> P
where
    E: FnMut(&P) -> (T, f64),
    M: FnMut(&P, T) -> P,
{
    let mut params = init;
    let mut prev: Option<f64> = None;

    for iter in 0..max_iters {
        let (stats, objective) = e_step(&params);
        debug!("EM #{} log_posterior={}", iter, objective);

        if let Some(prev) = prev {
            if objective < prev {
                warn!("EM #{} log posterior decreased {} -> {}", iter, prev, objective);
            }
            if (objective - prev).abs() < threshold {
                info!(
                    "EM converged after {} iterations, log_posterior={}",
                    iter, objective
                );
                return params;
            }
        }
        prev = Some(objective);
        params = m_step(&params, stats);
    }

    warn!("EM reached max_iters={} before converging", max_iters);
    params
}
