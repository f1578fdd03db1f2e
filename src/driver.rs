//!
//! Chunked classification driver
//!
//! Every chromosome of a `CountsSource` is classified window by window,
//! so that peak memory depends on the window size and not on the chromosome length.
//!
//! ```text
//! for chrom in sorted(names):
//!     for [start, stop) in windows(len(chrom), W):
//!         rows   = source.rows(chrom, start..stop)
//!         result = classifier(counts(rows))
//!         sink.write(chrom, rows, result)
//! sink.close()
//! ```
//!
use crate::common::{Responsibilities, WINDOW_SIZE};
use crate::error::ConfigError;
use crate::io::{ClassifiedSink, CountsSource};
use crate::progress::{Event, ProgressListener};
use crate::table::counts_matrix;
use crate::utils::check_memory_usage;
use anyhow::{Context, Result};
use log::debug;
use ndarray::ArrayView2;
use std::ops::Range;

///
/// Classifies the counts of a window of rows of a chromosome.
///
pub trait WindowClassifier {
    /// number of columns of every result
    fn n_classes(&self) -> usize;
    /// `(rows x n_classes)` result of a `(rows x count columns)` window
    fn classify_window(&self, chrom: &str, counts: ArrayView2<u32>) -> Result<Responsibilities>;
}

///
/// Consecutive windows `[start, min(start + size, len))` partitioning `[0, len)`.
///
/// `size` must be positive.
///
pub fn windows(len: usize, size: usize) -> impl Iterator<Item = Range<usize>> {
    (0..len)
        .step_by(size.max(1))
        .map(move |start| start..(start + size).min(len))
}

///
/// Window-by-window classification of a whole genome.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Driver {
    window_size: usize,
}

impl Default for Driver {
    fn default() -> Self {
        Driver {
            window_size: WINDOW_SIZE,
        }
    }
}

impl Driver {
    pub fn new(window_size: usize) -> Result<Self, ConfigError> {
        if window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Driver { window_size })
    }
    pub fn window_size(&self) -> usize {
        self.window_size
    }
    ///
    /// Classify every row of `source` and write it to `sink`, then close the sink.
    ///
    /// Chromosomes are visited in ascending name order and rows keep their order
    /// within a chromosome. Returns the number of rows written.
    ///
    pub fn run<S, C, W>(
        &self,
        source: &mut S,
        classifier: &C,
        sink: &mut W,
        listener: &mut dyn ProgressListener,
    ) -> Result<usize>
    where
        S: CountsSource,
        C: WindowClassifier + ?Sized,
        W: ClassifiedSink<S::Row>,
    {
        let mut names = source.chromosome_names();
        names.sort();
        listener.on_event(&Event::ClassifyStarted {
            chromosomes: names.len(),
            rows: source.total_row_count(),
        });

        let mut n_rows = 0;
        for name in names.iter() {
            let len = source.chromosome_length(name)?;
            for range in windows(len, self.window_size) {
                debug!("classify chromosome={} window={:?}", name, range);
                let rows = source.rows(name, range.clone())?;
                let counts = counts_matrix(&rows)?;
                let result = classifier
                    .classify_window(name, counts.view())
                    .with_context(|| {
                        format!("failed to classify rows {:?} of chromosome {}", range, name)
                    })?;
                sink.write(name, &rows, result.view())?;
                n_rows += rows.len();
            }
            listener.on_event(&Event::ChromosomeClassified { name, rows: len });
            check_memory_usage();
        }
        sink.close()?;
        listener.on_event(&Event::Finished);
        Ok(n_rows)
    }
}

//
// tests
//
