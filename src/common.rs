//!
//! Shared constants and small types used across the pipeline
//!
use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Number of rows classified together as one window.
pub const WINDOW_SIZE: usize = 100_000;

/// Per-sample genotypes, in class order.
///
/// `aa` is homozygous reference, `ab` heterozygous, `bb` homozygous non-reference.
pub const GENOTYPES: [&str; 3] = ["aa", "ab", "bb"];

/// number of genotypes per sample
pub const N_GENOTYPES: usize = GENOTYPES.len();

/// read counts matrix (rows x count columns)
pub type Counts = Array2<u32>;

/// posterior class probabilities (rows x classes)
pub type Responsibilities = Array2<f64>;

///
/// Biological samples of a tumour/normal pair.
///
/// The order of variants is the order of the sample blocks in every counts matrix,
/// and the major axis of the joint class index.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sample {
    Normal,
    Tumour,
}

impl Sample {
    /// all samples in block order
    pub const ALL: [Sample; 2] = [Sample::Normal, Sample::Tumour];
    /// position of this sample's block
    pub fn index(self) -> usize {
        match self {
            Sample::Normal => 0,
            Sample::Tumour => 1,
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            Sample::Normal => "normal",
            Sample::Tumour => "tumour",
        }
    }
}

impl std::fmt::Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

///
/// A value held once for each sample of the pair
/// (priors or parameters of the independent models).
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Independent<T> {
    pub normal: T,
    pub tumour: T,
}

impl<T> Independent<T> {
    pub fn get(&self, sample: Sample) -> &T {
        match sample {
            Sample::Normal => &self.normal,
            Sample::Tumour => &self.tumour,
        }
    }
}

///
/// Column names of the joint classes, `p_<normal>_<tumour>` for two samples.
///
/// Class `(i, j)` is column `i * N_GENOTYPES + j`.
///
pub fn joint_class_names(n_samples: usize) -> Vec<String> {
    (0..n_samples)
        .map(|_| GENOTYPES.iter())
        .multi_cartesian_product()
        .map(|genotypes| format!("p_{}", genotypes.into_iter().join("_")))
        .collect()
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_class_names_are_lexicographic() {
        let names = joint_class_names(2);
        assert_eq!(names.len(), 9);
        assert_eq!(names[0], "p_aa_aa");
        assert_eq!(names[1], "p_aa_ab");
        assert_eq!(names[2], "p_aa_bb");
        assert_eq!(names[3], "p_ab_aa");
        assert_eq!(names[8], "p_bb_bb");
        assert_eq!(joint_class_names(1), vec!["p_aa", "p_ab", "p_bb"]);
    }

    #[test]
    fn sample_block_order() {
        assert_eq!(Sample::ALL[0].index(), 0);
        assert_eq!(Sample::ALL[1].index(), 1);
        assert_eq!(Sample::Tumour.to_string(), "tumour");
    }
}
