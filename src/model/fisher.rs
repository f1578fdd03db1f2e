//!
//! Simple statistical test classifier
//!
//! Each sample is genotyped by its variant allele frequency and the two samples
//! are compared with a two-sided Fisher exact test on their ref/non-ref counts.
//! No training is involved.
//!
use crate::common::Responsibilities;
use crate::data::DataView;
use crate::driver::WindowClassifier;
use crate::prob::ln_binomial;
use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView2};

/// output labels, in column order of `FisherModel::classify`
pub const LABELS: [&str; 5] = ["Reference", "Germline", "Somatic", "LOH", "Unknown"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Label {
    Reference,
    Germline,
    Somatic,
    Loh,
    Unknown,
}

impl Label {
    pub fn index(self) -> usize {
        match self {
            Label::Reference => 0,
            Label::Germline => 1,
            Label::Somatic => 2,
            Label::Loh => 3,
            Label::Unknown => 4,
        }
    }
    pub fn name(self) -> &'static str {
        LABELS[self.index()]
    }
}

///
/// Two-sided Fisher exact test p-value of the 2x2 table `[[a, b], [c, d]]`.
///
/// Sums the hypergeometric probabilities of every table with the same margins
/// that is at most as probable as the observed one.
///
pub fn fisher_exact(a: u32, b: u32, c: u32, d: u32) -> f64 {
    let (a, b, c, d) = (a as u64, b as u64, c as u64, d as u64);
    let r1 = a + b;
    let r2 = c + d;
    let c1 = a + c;
    let ln_total = ln_binomial(r1 + r2, c1);
    let p_of = |x: u64| (ln_binomial(r1, x) + ln_binomial(r2, c1 - x) - ln_total).exp();

    let p_observed = p_of(a);
    let lo = c1.saturating_sub(r2);
    let hi = r1.min(c1);
    let p: f64 = (lo..=hi)
        .map(p_of)
        .filter(|&p| p <= p_observed * (1.0 + 1e-7))
        .sum();
    p.min(1.0)
}

///
/// Labels sites by per-sample genotype calls and a Fisher exact test.
///
#[derive(Clone, Debug)]
pub struct FisherModel {
    /// below this non-ref frequency a sample is `aa`
    pub min_var_freq: f64,
    /// above this non-ref frequency a sample is `bb`
    pub min_hom_freq: f64,
    /// samples with fewer reads are not genotyped
    pub min_depth: u32,
    /// significance level of the normal/tumour difference
    pub p_value: f64,
}

impl Default for FisherModel {
    fn default() -> Self {
        FisherModel {
            min_var_freq: 0.1,
            min_hom_freq: 0.9,
            min_depth: 6,
            p_value: 0.05,
        }
    }
}

impl FisherModel {
    ///
    /// genotype index (`aa`=0, `ab`=1, `bb`=2) of one sample, if deep enough
    ///
    fn genotype(&self, ref_count: u32, non_ref_count: u32) -> Option<usize> {
        let depth = ref_count + non_ref_count;
        if depth < self.min_depth || depth == 0 {
            return None;
        }
        let freq = non_ref_count as f64 / depth as f64;
        Some(if freq < self.min_var_freq {
            0
        } else if freq > self.min_hom_freq {
            2
        } else {
            1
        })
    }
    ///
    /// label of a site with counts `[normal_a, normal_b, tumour_a, tumour_b]`
    ///
    pub fn label(&self, counts: [u32; 4]) -> Label {
        let [na, nb, ta, tb] = counts;
        let (normal, tumour) = match (self.genotype(na, nb), self.genotype(ta, tb)) {
            (Some(n), Some(t)) => (n, t),
            _ => return Label::Unknown,
        };
        if normal == tumour {
            return if normal == 0 {
                Label::Reference
            } else {
                Label::Germline
            };
        }
        if fisher_exact(na, nb, ta, tb) < self.p_value {
            match (normal, tumour) {
                (0, _) => Label::Somatic,
                (1, _) => Label::Loh,
                _ => Label::Unknown,
            }
        } else if normal == 0 {
            Label::Reference
        } else {
            Label::Germline
        }
    }
    ///
    /// One-hot `(rows x labels)` matrix of the labels of a joint binomial view.
    ///
    pub fn classify(&self, data: &DataView) -> Result<Responsibilities> {
        ensure!(
            data.n_samples() == 2 && data.n_categories() == 2,
            "the Fisher test needs joint ref/non-ref counts"
        );
        let (normal, tumour) = (data.sample(0), data.sample(1));
        let mut out = Array2::zeros((data.n_rows(), LABELS.len()));
        for i in 0..data.n_rows() {
            let label = self.label([
                normal[[i, 0]],
                normal[[i, 1]],
                tumour[[i, 0]],
                tumour[[i, 1]],
            ]);
            out[[i, label.index()]] = 1.0;
        }
        Ok(out)
    }
}

impl WindowClassifier for FisherModel {
    fn n_classes(&self) -> usize {
        LABELS.len()
    }
    fn classify_window(&self, _chrom: &str, counts: ArrayView2<u32>) -> Result<Responsibilities> {
        self.classify(&DataView::joint(counts))
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use test_case::test_case;

    #[test]
    fn fisher_exact_known_values() {
        // R: fisher.test(matrix(c(1, 11, 9, 3), 2))$p.value
        assert_abs_diff_eq!(fisher_exact(1, 9, 11, 3), 0.002759, epsilon = 1e-6);
        // identical proportions
        assert_abs_diff_eq!(fisher_exact(10, 10, 10, 10), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fisher_exact(0, 0, 0, 0), 1.0, epsilon = 1e-9);
    }

    #[test_case([30, 0, 30, 0], Label::Reference ; "reference")]
    #[test_case([15, 15, 14, 16], Label::Germline ; "germline het")]
    #[test_case([0, 30, 0, 30], Label::Germline ; "germline hom")]
    #[test_case([30, 0, 15, 15], Label::Somatic ; "somatic")]
    #[test_case([15, 15, 30, 0], Label::Loh ; "loss of heterozygosity")]
    #[test_case([2, 0, 15, 15], Label::Unknown ; "shallow normal")]
    #[test_case([30, 0, 9, 1], Label::Reference ; "weak tumour variant not significant")]
    #[test_case([20, 0, 6, 2], Label::Reference ; "tumour het not significant")]
    fn labels(counts: [u32; 4], label: Label) {
        assert_eq!(FisherModel::default().label(counts), label);
    }

    #[test]
    fn classify_is_one_hot() {
        let counts = array![[30, 0, 15, 15], [30, 0, 30, 0]];
        let out = FisherModel::default()
            .classify_window("1", counts.view())
            .unwrap();
        assert_eq!(out.shape(), &[2, 5]);
        assert_eq!(out.row(0).to_vec(), vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(out.row(1).to_vec(), vec![1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(Label::Loh.name(), "LOH");
    }
}
