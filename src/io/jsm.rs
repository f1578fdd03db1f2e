//!
//! Classified output tables
//!
//! * `JsmWriter`: input row columns followed by one probability column per joint class
//! * `LabelWriter`: input row columns followed by the label of the most probable class
//! * `ClassifiedRow`: a row of a classified joint counts table, read back for ranking
//!
use super::json::save_to_file;
use super::tsv::tsv_writer;
use super::{sidecar_path, ClassifiedSink};
use crate::common::joint_class_names;
use crate::table::TableRecord;
use anyhow::{ensure, Context, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

///
/// Writes classified windows as a tsv table, with parameters and priors as JSON sidecars.
///
pub struct JsmWriter<R> {
    path: PathBuf,
    writer: csv::Writer<File>,
    n_classes: usize,
    n_rows: usize,
    _row: PhantomData<R>,
}

impl<R: TableRecord> JsmWriter<R> {
    ///
    /// Create the table for `n_samples` joint genotype classes and write its header.
    ///
    pub fn create<P: AsRef<Path>>(path: P, n_samples: usize) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut writer = tsv_writer(&path)?;
        let classes = joint_class_names(n_samples);
        let header = R::HEADER
            .iter()
            .map(|s| s.to_string())
            .chain(classes.iter().cloned());
        writer
            .write_record(header)
            .with_context(|| format!("failed to write {:?}", path))?;
        Ok(JsmWriter {
            path,
            writer,
            n_classes: classes.len(),
            n_rows: 0,
            _row: PhantomData,
        })
    }
    /// number of rows written so far
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }
}

impl<R: TableRecord> ClassifiedSink<R> for JsmWriter<R> {
    fn write_parameters<P: Serialize>(&mut self, params: &P) -> Result<()> {
        save_to_file(sidecar_path(&self.path, "params"), params)
    }
    fn write_priors<P: Serialize>(&mut self, priors: &P) -> Result<()> {
        save_to_file(sidecar_path(&self.path, "priors"), priors)
    }
    fn write(&mut self, chrom: &str, rows: &[R], result: ArrayView2<f64>) -> Result<()> {
        ensure!(
            result.nrows() == rows.len() && result.ncols() == self.n_classes,
            "result of shape {:?} does not match {} rows x {} classes of `{}`",
            result.shape(),
            rows.len(),
            self.n_classes,
            chrom
        );
        for (row, probs) in rows.iter().zip(result.outer_iter()) {
            let fields = row
                .fields()
                .into_iter()
                .chain(probs.iter().map(|p| p.to_string()));
            self.writer
                .write_record(fields)
                .with_context(|| format!("failed to write {:?}", self.path))?;
        }
        self.n_rows += rows.len();
        Ok(())
    }
    fn close(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("failed to flush {:?}", self.path))
    }
}

///
/// Writes the label of the most probable class of each row.
///
/// Parameters and priors are not persisted by this writer.
///
pub struct LabelWriter<R> {
    path: PathBuf,
    writer: csv::Writer<File>,
    labels: Vec<String>,
    _row: PhantomData<R>,
}

impl<R: TableRecord> LabelWriter<R> {
    pub fn create<P: AsRef<Path>>(path: P, labels: &[&str]) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut writer = tsv_writer(&path)?;
        let header = R::HEADER.iter().chain(std::iter::once(&"label"));
        writer
            .write_record(header)
            .with_context(|| format!("failed to write {:?}", path))?;
        Ok(LabelWriter {
            path,
            writer,
            labels: labels.iter().map(|s| s.to_string()).collect(),
            _row: PhantomData,
        })
    }
}

impl<R: TableRecord> ClassifiedSink<R> for LabelWriter<R> {
    fn write_parameters<P: Serialize>(&mut self, _params: &P) -> Result<()> {
        Ok(())
    }
    fn write_priors<P: Serialize>(&mut self, _priors: &P) -> Result<()> {
        Ok(())
    }
    fn write(&mut self, chrom: &str, rows: &[R], result: ArrayView2<f64>) -> Result<()> {
        ensure!(
            result.nrows() == rows.len() && result.ncols() == self.labels.len(),
            "result of shape {:?} does not match {} rows x {} labels of `{}`",
            result.shape(),
            rows.len(),
            self.labels.len(),
            chrom
        );
        for (row, scores) in rows.iter().zip(result.outer_iter()) {
            // first maximum wins
            let best = scores
                .iter()
                .enumerate()
                .fold(0, |best, (i, &s)| if s > scores[best] { i } else { best });
            let fields = row
                .fields()
                .into_iter()
                .chain(std::iter::once(self.labels[best].clone()));
            self.writer
                .write_record(fields)
                .with_context(|| format!("failed to write {:?}", self.path))?;
        }
        Ok(())
    }
    fn close(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("failed to flush {:?}", self.path))
    }
}

///
/// One row of a classified joint (binomial) counts table.
///
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ClassifiedRow {
    pub chrom: String,
    pub position: u64,
    pub ref_base: char,
    pub normal_base: char,
    pub tumour_base: char,
    pub normal_counts_a: u32,
    pub normal_counts_b: u32,
    pub tumour_counts_a: u32,
    pub tumour_counts_b: u32,
    pub p_aa_aa: f64,
    pub p_aa_ab: f64,
    pub p_aa_bb: f64,
    pub p_ab_aa: f64,
    pub p_ab_ab: f64,
    pub p_ab_bb: f64,
    pub p_bb_aa: f64,
    pub p_bb_ab: f64,
    pub p_bb_bb: f64,
}

impl ClassifiedRow {
    ///
    /// Probability that the site is mutant in the tumour only
    /// (normal `aa`, tumour `ab` or `bb`).
    ///
    pub fn somatic_prob(&self) -> f64 {
        self.p_aa_ab + self.p_aa_bb
    }
    pub fn probs(&self) -> [f64; 9] {
        [
            self.p_aa_aa,
            self.p_aa_ab,
            self.p_aa_bb,
            self.p_ab_aa,
            self.p_ab_ab,
            self.p_ab_bb,
            self.p_bb_aa,
            self.p_bb_ab,
            self.p_bb_bb,
        ]
    }
}

impl TableRecord for ClassifiedRow {
    const HEADER: &'static [&'static str] = &[
        "chrom",
        "position",
        "ref_base",
        "normal_base",
        "tumour_base",
        "normal_counts_a",
        "normal_counts_b",
        "tumour_counts_a",
        "tumour_counts_b",
        "p_aa_aa",
        "p_aa_ab",
        "p_aa_bb",
        "p_ab_aa",
        "p_ab_ab",
        "p_ab_bb",
        "p_bb_aa",
        "p_bb_ab",
        "p_bb_bb",
    ];
    fn chrom(&self) -> &str {
        &self.chrom
    }
    fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.chrom.clone(),
            self.position.to_string(),
            self.ref_base.to_string(),
            self.normal_base.to_string(),
            self.tumour_base.to_string(),
            self.normal_counts_a.to_string(),
            self.normal_counts_b.to_string(),
            self.tumour_counts_a.to_string(),
            self.tumour_counts_b.to_string(),
        ];
        fields.extend(self.probs().iter().map(|p| p.to_string()));
        fields
    }
}

//
// tests
//
