//!
//! Extraction of the most somatic-looking sites of a classified table
//!
//! A single pass over the classified rows keeps a bounded `Reservoir` of the
//! highest scoring rows, where the score of a site is the probability of the two
//! joint genotypes mutant in the tumour only (`p_aa_ab + p_aa_bb`).
//! The reservoir is then cut at the widest gap between consecutive scores,
//! separating candidates from background.
//!
use crate::io::jsm::ClassifiedRow;
use crate::io::tsv::{tsv_writer, IndexedTable};
use crate::progress::{Event, ProgressListener};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;

/// Maximum number of rows kept while scanning.
pub const MAX_CANDIDATES: usize = 100_000;

/// Rows scoring at or below this are evicted as soon as they become the minimum.
pub const SCORE_THRESHOLD: f64 = 1e-6;

/// Chromosomes skipped unless told otherwise.
pub const DEFAULT_EXCLUDED: [&str; 2] = ["Y", "MT"];

///
/// Fixed capacity collection of `(score, item)`, sorted by ascending score.
///
/// The minimum is evicted when the collection overflows or when it scores at or
/// below the threshold. Once the collection is non-empty, an item scoring no higher
/// than the current minimum is rejected.
///
#[derive(Clone, Debug)]
pub struct Reservoir<T> {
    capacity: usize,
    threshold: f64,
    entries: VecDeque<(f64, T)>,
}

impl<T> Reservoir<T> {
    pub fn new(capacity: usize, threshold: f64) -> Self {
        Reservoir {
            capacity,
            threshold,
            entries: VecDeque::new(),
        }
    }
    ///
    /// Offer an item. Returns whether it was inserted (it may have been evicted right away).
    ///
    pub fn offer(&mut self, score: f64, item: T) -> bool {
        // after every entry not greater than the score, so NaN entries stay ahead
        let position = self.entries.partition_point(|(s, _)| !(score < *s));
        if position == 0 && !self.entries.is_empty() {
            return false;
        }
        self.entries.insert(position, (score, item));
        if let Some(&(min, _)) = self.entries.front() {
            if min <= self.threshold || self.entries.len() > self.capacity {
                self.entries.pop_front();
            }
        }
        true
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// scores in ascending order
    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(s, _)| *s)
    }
    ///
    /// Drop every entry below the widest gap between consecutive scores,
    /// keeping the entry just below the gap.
    ///
    /// The first of several equally wide gaps is used. Nothing is dropped when
    /// all scores are equal.
    ///
    pub fn trim_at_largest_gap(&mut self) {
        let index = largest_gap(&self.scores().collect::<Vec<_>>());
        self.entries.drain(..index);
    }
    /// items in ascending score order
    pub fn into_items(self) -> Vec<T> {
        self.entries.into_iter().map(|(_, item)| item).collect()
    }
}

///
/// Index `i` of the first maximum of `xs[i + 1] - xs[i]` (0 if there is no positive gap).
///
fn largest_gap(xs: &[f64]) -> usize {
    let mut max_diff = 0.0;
    let mut index = 0;
    for (i, w) in xs.windows(2).enumerate() {
        let diff = w[1] - w[0];
        if diff > max_diff {
            max_diff = diff;
            index = i;
        }
    }
    index
}

///
/// A row of the somatic call table.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SomaticCall {
    pub chrom: String,
    pub position: u64,
    pub ref_base: char,
    pub normal_base: char,
    pub tumour_base: char,
    pub normal_counts_a: u32,
    pub normal_counts_b: u32,
    pub tumour_counts_a: u32,
    pub tumour_counts_b: u32,
    pub somatic_prob: f64,
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

impl SomaticCall {
    pub const HEADER: [&'static str; 19] = [
        "chrom",
        "position",
        "ref_base",
        "normal_base",
        "tumour_base",
        "normal_counts_a",
        "normal_counts_b",
        "tumour_counts_a",
        "tumour_counts_b",
        "somatic_prob",
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
}

impl From<ClassifiedRow> for SomaticCall {
    fn from(row: ClassifiedRow) -> Self {
        SomaticCall {
            somatic_prob: row.somatic_prob(),
            chrom: row.chrom,
            position: row.position,
            ref_base: row.ref_base,
            normal_base: row.normal_base,
            tumour_base: row.tumour_base,
            normal_counts_a: row.normal_counts_a,
            normal_counts_b: row.normal_counts_b,
            tumour_counts_a: row.tumour_counts_a,
            tumour_counts_b: row.tumour_counts_b,
            p_aa_aa: row.p_aa_aa,
            p_aa_ab: row.p_aa_ab,
            p_aa_bb: row.p_aa_bb,
            p_ab_aa: row.p_ab_aa,
            p_ab_ab: row.p_ab_ab,
            p_ab_bb: row.p_ab_bb,
            p_bb_aa: row.p_bb_aa,
            p_bb_ab: row.p_bb_ab,
            p_bb_bb: row.p_bb_bb,
        }
    }
}

///
/// Scan all chromosomes of a classified table except `excluded`, in ascending name order,
/// and return the retained calls in ascending score order.
///
pub fn load_somatics(
    table: &mut IndexedTable<ClassifiedRow>,
    excluded: &[String],
    listener: &mut dyn ProgressListener,
) -> Result<Vec<SomaticCall>> {
    let mut reservoir = Reservoir::new(MAX_CANDIDATES, SCORE_THRESHOLD);
    let mut names = table.names();
    names.sort();

    for name in names.iter() {
        if excluded.contains(name) {
            debug!("skip chromosome {}", name);
            continue;
        }
        let len = table.length(name)?;
        table.for_each_row(name, 0..len, |_, row| {
            reservoir.offer(row.somatic_prob(), row);
            Ok(())
        })?;
        listener.on_event(&Event::ChromosomeScanned {
            name,
            rows: len,
            kept: reservoir.len(),
        });
    }

    reservoir.trim_at_largest_gap();
    Ok(reservoir
        .into_items()
        .into_iter()
        .map(SomaticCall::from)
        .collect())
}

///
/// Write the somatic calls of the classified table `jsm` to `out`, most probable first.
///
pub fn extract_somatics<P: AsRef<Path>, Q: AsRef<Path>>(
    jsm: P,
    out: Q,
    excluded: &[String],
    listener: &mut dyn ProgressListener,
) -> Result<usize> {
    let mut table = IndexedTable::open(jsm.as_ref())?;
    let mut calls = load_somatics(&mut table, excluded, listener)?;
    calls.reverse();

    let out = out.as_ref();
    let mut writer = tsv_writer(out)?;
    writer
        .write_record(SomaticCall::HEADER.iter())
        .with_context(|| format!("failed to write {:?}", out))?;
    for call in calls.iter() {
        writer
            .serialize(call)
            .with_context(|| format!("failed to write {:?}", out))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {:?}", out))?;
    info!("wrote {} somatic calls to {:?}", calls.len(), out);
    listener.on_event(&Event::Finished);
    Ok(calls.len())
}

//
// tests
//
