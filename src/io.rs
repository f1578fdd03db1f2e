//!
//! Input/output collaborators of the pipeline
//!
//! * `CountsSource`: per-chromosome access to a counts table
//! * `ClassifiedSink`: receiver of parameters, priors and classified windows
//!
pub mod jsm;
pub mod json;
pub mod tsv;
pub mod varscan;

use crate::common::Counts;
use crate::table::{counts_matrix, CountRecord};
use anyhow::Result;
use ndarray::{ArrayView2, Axis};
use serde::Serialize;
use std::ops::Range;

///
/// Chromosome-partitioned counts table.
///
/// Implementors only need to materialize the rows that are asked for,
/// so that callers can bound memory by asking for windows.
///
pub trait CountsSource {
    type Row: CountRecord;
    /// chromosome names in declared order
    fn chromosome_names(&self) -> Vec<String>;
    /// number of rows of the chromosome
    fn chromosome_length(&self, name: &str) -> Result<usize>;
    /// number of rows of all chromosomes
    fn total_row_count(&self) -> usize;
    /// rows `range` of the chromosome, in order
    fn rows(&mut self, name: &str, range: Range<usize>) -> Result<Vec<Self::Row>>;
    ///
    /// counts matrix of the whole chromosome
    ///
    fn counts(&mut self, name: &str) -> Result<Counts> {
        let len = self.chromosome_length(name)?;
        counts_matrix(&self.rows(name, 0..len)?)
    }
    ///
    /// counts of the rows at `indices` of the chromosome, in ascending index order
    ///
    fn counts_at(&mut self, name: &str, indices: &[usize]) -> Result<Counts> {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        Ok(self.counts(name)?.select(Axis(0), &indices))
    }
}

///
/// Receiver of classification results.
///
pub trait ClassifiedSink<R> {
    fn write_parameters<P: Serialize>(&mut self, params: &P) -> Result<()>;
    fn write_priors<P: Serialize>(&mut self, priors: &P) -> Result<()>;
    /// write a window of rows with its (rows x classes) result matrix
    fn write(&mut self, chrom: &str, rows: &[R], result: ArrayView2<f64>) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

///
/// `<path>.<kind>.json`, the location of a JSON sidecar next to an output table
///
pub fn sidecar_path(path: &std::path::Path, kind: &str) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.json", kind));
    std::path::PathBuf::from(name)
}
