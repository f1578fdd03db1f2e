//!
//! Data views
//!
//! A `DataView` projects a counts matrix into the per-sample count blocks a model consumes.
//! It only borrows the matrix.
//!
use crate::common::Sample;
use ndarray::{s, ArrayView2};

///
/// Per-sample `(rows x categories)` count blocks over the same rows.
///
#[derive(Clone, Debug)]
pub struct DataView<'a> {
    samples: Vec<ArrayView2<'a, u32>>,
}

impl<'a> DataView<'a> {
    ///
    /// Both samples of a counts matrix whose columns are `[normal block, tumour block]`.
    ///
    pub fn joint(counts: ArrayView2<'a, u32>) -> Self {
        let k = counts.ncols() / 2;
        DataView {
            samples: Sample::ALL
                .iter()
                .map(|sample| block(counts, *sample, k))
                .collect(),
        }
    }
    ///
    /// A single sample of a counts matrix whose columns are `[normal block, tumour block]`.
    ///
    pub fn independent(counts: ArrayView2<'a, u32>, sample: Sample) -> Self {
        let k = counts.ncols() / 2;
        DataView {
            samples: vec![block(counts, sample, k)],
        }
    }
    /// number of rows (sites)
    pub fn n_rows(&self) -> usize {
        self.samples.first().map_or(0, |b| b.nrows())
    }
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }
    /// number of count categories per sample
    pub fn n_categories(&self) -> usize {
        self.samples.first().map_or(0, |b| b.ncols())
    }
    /// count block of the `i`-th sample of this view
    pub fn sample(&self, i: usize) -> ArrayView2<'a, u32> {
        self.samples[i]
    }
}

fn block(counts: ArrayView2<u32>, sample: Sample, k: usize) -> ArrayView2<u32> {
    let offset = sample.index() * k;
    counts.slice_move(s![.., offset..offset + k])
}
