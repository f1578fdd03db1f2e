//!
//! Tab-separated tables, indexed per chromosome
//!
//! `IndexedTable` scans its file once and remembers where each chromosome begins,
//! so only the requested rows are ever deserialized.
//! Consecutive requests continue from where the previous one stopped without seeking.
//!
use super::CountsSource;
use crate::common::Counts;
use crate::table::{CountRecord, TableRecord};
use anyhow::{anyhow, bail, ensure, Context, Result};
use csv::{Position, StringRecord};
use log::debug;
use ndarray::Array2;
use std::fs::File;
use std::marker::PhantomData;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// contiguous rows of one chromosome
#[derive(Clone, Debug)]
struct Block {
    name: String,
    start: Position,
    len: usize,
}

///
/// Read-only table with random access by (chromosome, row range).
///
/// Rows of a chromosome must be contiguous in the file.
///
pub struct IndexedTable<R> {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: StringRecord,
    record: StringRecord,
    blocks: Vec<Block>,
    /// (block, row) the reader is positioned at
    cursor: Option<(usize, usize)>,
    _row: PhantomData<R>,
}

///
/// tsv reader with a header line
///
pub fn tsv_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path.as_ref())
        .with_context(|| format!("failed to open {:?}", path.as_ref()))
}

///
/// tsv writer (the caller writes the header)
///
pub fn tsv_writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<File>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path.as_ref())
        .with_context(|| format!("failed to create {:?}", path.as_ref()))
}

impl<R: TableRecord> IndexedTable<R> {
    ///
    /// Open the table and index its chromosomes.
    ///
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut reader = tsv_reader(&path)?;
        let headers = reader
            .headers()
            .with_context(|| format!("failed to read header of {:?}", path))?
            .clone();
        let chrom_column = headers
            .iter()
            .position(|h| h == "chrom")
            .ok_or_else(|| anyhow!("{:?} has no `chrom` column", path))?;

        let mut blocks: Vec<Block> = Vec::new();
        let mut record = StringRecord::new();
        while reader
            .read_record(&mut record)
            .with_context(|| format!("failed to index {:?}", path))?
        {
            let chrom = record
                .get(chrom_column)
                .ok_or_else(|| anyhow!("short record in {:?}", path))?;
            match blocks.last_mut() {
                Some(block) if block.name == chrom => block.len += 1,
                _ => {
                    if blocks.iter().any(|b| b.name == chrom) {
                        bail!(
                            "rows of chromosome `{}` are not contiguous in {:?}",
                            chrom,
                            path
                        );
                    }
                    let start = record
                        .position()
                        .cloned()
                        .ok_or_else(|| anyhow!("no record position in {:?}", path))?;
                    blocks.push(Block {
                        name: chrom.to_owned(),
                        start,
                        len: 1,
                    });
                }
            }
        }
        debug!("indexed {:?}: {} chromosomes", path, blocks.len());

        Ok(IndexedTable {
            path,
            reader,
            headers,
            record,
            blocks,
            cursor: None,
            _row: PhantomData,
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    fn block_index(&self, name: &str) -> Result<usize> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| anyhow!("unknown chromosome `{}` in {:?}", name, self.path))
    }
    ///
    /// Position the reader at row `row` of block `b`.
    ///
    fn move_to(&mut self, b: usize, row: usize) -> Result<()> {
        if self.cursor == Some((b, row)) {
            return Ok(());
        }
        self.cursor = None;
        let start = self.blocks[b].start.clone();
        self.reader
            .seek(start)
            .with_context(|| format!("failed to seek in {:?}", self.path))?;
        for _ in 0..row {
            self.read_record()?;
        }
        self.cursor = Some((b, row));
        Ok(())
    }
    fn read_record(&mut self) -> Result<()> {
        let found = self
            .reader
            .read_record(&mut self.record)
            .with_context(|| format!("failed to read {:?}", self.path))?;
        ensure!(found, "unexpected end of {:?}", self.path);
        Ok(())
    }
    fn read_row(&mut self) -> Result<R> {
        self.read_record()?;
        let row: R = self
            .record
            .deserialize(Some(&self.headers))
            .with_context(|| format!("malformed row in {:?}", self.path))?;
        Ok(row)
    }
    ///
    /// Visit rows `range` of the chromosome in order.
    ///
    pub fn for_each_row<F>(&mut self, name: &str, range: Range<usize>, mut f: F) -> Result<()>
    where
        F: FnMut(usize, R) -> Result<()>,
    {
        let b = self.block_index(name)?;
        let len = self.blocks[b].len;
        ensure!(
            range.start <= range.end && range.end <= len,
            "rows {:?} out of range for chromosome `{}` of length {}",
            range,
            name,
            len
        );
        self.move_to(b, range.start)?;
        for i in range.clone() {
            // unknown until the read succeeds
            self.cursor = None;
            let row = self.read_row()?;
            self.cursor = Some((b, i + 1));
            f(i, row)?;
        }
        Ok(())
    }
    pub fn names(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.name.clone()).collect()
    }
    pub fn length(&self, name: &str) -> Result<usize> {
        Ok(self.blocks[self.block_index(name)?].len)
    }
    pub fn total(&self) -> usize {
        self.blocks.iter().map(|b| b.len).sum()
    }
}

impl<R: CountRecord> CountsSource for IndexedTable<R> {
    type Row = R;
    fn chromosome_names(&self) -> Vec<String> {
        self.names()
    }
    fn chromosome_length(&self, name: &str) -> Result<usize> {
        self.length(name)
    }
    fn total_row_count(&self) -> usize {
        self.total()
    }
    fn rows(&mut self, name: &str, range: Range<usize>) -> Result<Vec<R>> {
        let mut rows = Vec::with_capacity(range.len());
        self.for_each_row(name, range, |_, row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }
    ///
    /// Streams the chromosome once, keeping only the counts of selected rows.
    ///
    fn counts_at(&mut self, name: &str, indices: &[usize]) -> Result<Counts> {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        let len = self.length(name)?;
        if let Some(&last) = indices.last() {
            ensure!(last < len, "row {} out of range for `{}`", last, name);
        }
        let end = indices.last().map_or(0, |&last| last + 1);

        let mut flat = Vec::with_capacity(indices.len() * R::N_COLUMNS);
        let mut next = indices.iter().peekable();
        self.for_each_row(name, 0..end, |i, row| {
            while next.peek() == Some(&&i) {
                row.push_counts(&mut flat);
                next.next();
            }
            Ok(())
        })?;
        Ok(Array2::from_shape_vec((indices.len(), R::N_COLUMNS), flat)?)
    }
}

//
// tests
//
