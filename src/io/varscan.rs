//!
//! VarScan somatic output to jcnt conversion
//!
//! VarScan reports one candidate site per line with ref/variant read counts of
//! each sample (`normal_reads1`/`normal_reads2`, `tumor_reads1`/`tumor_reads2`).
//! Both samples take the VarScan variant base as their non-reference base,
//! and an empty variant becomes `N`.
//!
//! Input may be gzip compressed (`.gz`).
//!
use super::tsv::tsv_writer;
use crate::table::{CountRow, TableRecord};
use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use log::{debug, info};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Rows are written out in batches of this size.
pub const FLUSH_ROWS: usize = 10_000;

///
/// The columns of a VarScan line used for conversion.
///
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VarscanRow {
    pub chrom: String,
    pub position: u64,
    #[serde(rename = "ref")]
    pub ref_base: String,
    pub var: String,
    pub normal_reads1: u32,
    pub normal_reads2: u32,
    pub tumor_reads1: u32,
    pub tumor_reads2: u32,
}

/// first character of a base column, `N` if empty
fn base(s: &str) -> char {
    s.chars().next().unwrap_or('N')
}

impl From<VarscanRow> for CountRow {
    fn from(row: VarscanRow) -> Self {
        let var = base(&row.var);
        CountRow {
            chrom: row.chrom,
            position: row.position,
            ref_base: base(&row.ref_base),
            normal_base: var,
            tumour_base: var,
            normal_counts_a: row.normal_reads1,
            normal_counts_b: row.normal_reads2,
            tumour_counts_a: row.tumor_reads1,
            tumour_counts_b: row.tumor_reads2,
        }
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let is_gz = path.extension().map_or(false, |ext| ext == "gz");
    Ok(if is_gz {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    })
}

///
/// Buffer of converted rows, grouped by chromosome in first-seen order.
///
/// A chromosome that was already flushed and then reappears after another
/// chromosome would break the contiguity of the jcnt table, and is rejected.
///
struct Batches {
    groups: Vec<(String, Vec<CountRow>)>,
    n_rows: usize,
    written: Vec<String>,
}

impl Batches {
    fn new() -> Self {
        Batches {
            groups: Vec::new(),
            n_rows: 0,
            written: Vec::new(),
        }
    }
    fn push(&mut self, row: CountRow) -> Result<()> {
        let is_last_written = self.written.last() == Some(&row.chrom);
        if !is_last_written && self.written.contains(&row.chrom) {
            bail!("rows of chromosome `{}` are not contiguous", row.chrom);
        }
        match self.groups.iter_mut().find(|(name, _)| *name == row.chrom) {
            Some((_, rows)) => rows.push(row),
            None => self.groups.push((row.chrom.clone(), vec![row])),
        }
        self.n_rows += 1;
        Ok(())
    }
    fn flush(&mut self, writer: &mut csv::Writer<File>) -> Result<()> {
        for (name, rows) in self.groups.drain(..) {
            if self.written.last() != Some(&name) && self.written.contains(&name) {
                bail!("rows of chromosome `{}` are not contiguous", name);
            }
            for row in rows.iter() {
                writer.write_record(row.fields())?;
            }
            debug!("flushed {} rows of chromosome {}", rows.len(), name);
            if self.written.last() != Some(&name) {
                self.written.push(name);
            }
        }
        self.n_rows = 0;
        writer.flush()?;
        Ok(())
    }
}

///
/// Convert the VarScan table `input` into the jcnt table `output`.
/// Returns the number of converted rows.
///
pub fn varscan_to_jcnt<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<usize> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(open_input(input)?);
    let mut writer = tsv_writer(output)?;
    writer
        .write_record(CountRow::HEADER)
        .with_context(|| format!("failed to write {:?}", output))?;

    let mut batches = Batches::new();
    let mut total = 0;
    for result in reader.deserialize() {
        let row: VarscanRow = result.with_context(|| format!("malformed row in {:?}", input))?;
        batches.push(CountRow::from(row))?;
        total += 1;
        if batches.n_rows >= FLUSH_ROWS {
            batches
                .flush(&mut writer)
                .with_context(|| format!("failed to write {:?}", output))?;
        }
    }
    batches
        .flush(&mut writer)
        .with_context(|| format!("failed to write {:?}", output))?;
    info!("converted {} rows from {:?}", total, input);
    Ok(total)
}

//
// tests
//
