//!
//! Proportional subsampling of training data
//!
//! A chromosome of length `C` in a genome of `N` rows contributes
//! `min(C, ceil(C / N * S))` rows to a sample of target size `S`,
//! drawn uniformly without replacement.
//! Only one chromosome is read at a time.
//!
//! Per-chromosome rounding up means the sample can exceed `S`
//! by less than the number of chromosomes.
//!
use crate::common::Counts;
use crate::io::CountsSource;
use crate::table::CountRecord;
use anyhow::Result;
use log::debug;
use ndarray::{concatenate, Array2, Axis};
use rand::seq::index;
use rand::Rng;

///
/// Number of rows a chromosome of `chrom_len` rows contributes to a sample of
/// `sample_size` rows drawn from `total` rows.
///
pub fn quota(chrom_len: usize, total: usize, sample_size: usize) -> usize {
    if total == 0 {
        return 0;
    }
    // ceil(C * S / N) in integers
    let (c, n, s) = (chrom_len as u128, total as u128, sample_size as u128);
    let q = (c * s + n - 1) / n;
    (q as usize).min(chrom_len)
}

///
/// Quotas of every chromosome given their lengths.
///
pub fn quotas(lengths: &[usize], sample_size: usize) -> Vec<usize> {
    let total = lengths.iter().sum();
    lengths
        .iter()
        .map(|&len| quota(len, total, sample_size))
        .collect()
}

///
/// `q` distinct row indices of `[0, len)`, in ascending order.
///
pub fn sample_indices<G: Rng>(rng: &mut G, len: usize, q: usize) -> Vec<usize> {
    let mut indices = index::sample(rng, len, q.min(len)).into_vec();
    indices.sort_unstable();
    indices
}

///
/// Genome-wide training sample of about `sample_size` rows.
///
/// Chromosome samples are concatenated in the source's chromosome order.
///
pub fn proportional_sample<S, G>(source: &mut S, sample_size: usize, rng: &mut G) -> Result<Counts>
where
    S: CountsSource,
    G: Rng,
{
    let names = source.chromosome_names();
    let lengths = names
        .iter()
        .map(|name| source.chromosome_length(name))
        .collect::<Result<Vec<_>>>()?;
    let total: usize = lengths.iter().sum();

    let mut samples = Vec::with_capacity(names.len());
    for (name, &len) in names.iter().zip(lengths.iter()) {
        let q = quota(len, total, sample_size);
        debug!("subsample chromosome={} length={} quota={}", name, len, q);
        if q == 0 {
            continue;
        }
        let indices = sample_indices(rng, len, q);
        samples.push(source.counts_at(name, &indices)?);
    }
    stack::<S::Row>(samples)
}

///
/// Sample of at most `sample_size` rows of a single chromosome.
///
pub fn chromosome_sample<S, G>(
    source: &mut S,
    name: &str,
    sample_size: usize,
    rng: &mut G,
) -> Result<Counts>
where
    S: CountsSource,
    G: Rng,
{
    let len = source.chromosome_length(name)?;
    let indices = sample_indices(rng, len, sample_size.min(len));
    source.counts_at(name, &indices)
}

///
/// Stack per-chromosome count matrices (an empty list gives zero rows).
///
pub fn stack<R: CountRecord>(parts: Vec<Counts>) -> Result<Counts> {
    if parts.is_empty() {
        return Ok(Array2::zeros((0, R::N_COLUMNS)));
    }
    let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
    Ok(concatenate(Axis(0), &views)?)
}

//
// tests
//
