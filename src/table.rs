//!
//! Count tables
//!
//! * `CountRow`: one site of a joint (ref/non-ref) counts table
//! * `MultinomialCountRow`: one site with an extra "other allele" count per sample
//!
use crate::common::Counts;
use anyhow::Result;
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

///
/// A row of a tab-separated table whose first column names the chromosome.
///
pub trait TableRecord: DeserializeOwned + Clone {
    /// column names, in `fields` order
    const HEADER: &'static [&'static str];
    /// chromosome this row belongs to
    fn chrom(&self) -> &str;
    /// formatted column values
    fn fields(&self) -> Vec<String>;
}

///
/// A table row carrying per-sample read counts.
///
/// Counts are laid out as one block of `N_CATEGORIES` columns per sample
/// (normal block first, tumour block second).
///
pub trait CountRecord: TableRecord {
    /// number of count categories per sample
    const N_CATEGORIES: usize;
    /// number of count columns of the whole row
    const N_COLUMNS: usize = 2 * Self::N_CATEGORIES;
    /// append this row's counts (normal block, then tumour block)
    fn push_counts(&self, out: &mut Vec<u32>);
}

///
/// Build the counts matrix of a slice of rows, one matrix row per table row.
///
pub fn counts_matrix<R: CountRecord>(rows: &[R]) -> Result<Counts> {
    let mut flat = Vec::with_capacity(rows.len() * R::N_COLUMNS);
    for row in rows {
        row.push_counts(&mut flat);
    }
    Ok(Array2::from_shape_vec((rows.len(), R::N_COLUMNS), flat)?)
}

///
/// One genomic site with reference/non-reference read counts for each sample.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountRow {
    pub chrom: String,
    /// 1-based coordinate
    pub position: u64,
    pub ref_base: char,
    pub normal_base: char,
    pub tumour_base: char,
    pub normal_counts_a: u32,
    pub normal_counts_b: u32,
    pub tumour_counts_a: u32,
    pub tumour_counts_b: u32,
}

impl TableRecord for CountRow {
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
    ];
    fn chrom(&self) -> &str {
        &self.chrom
    }
    fn fields(&self) -> Vec<String> {
        vec![
            self.chrom.clone(),
            self.position.to_string(),
            self.ref_base.to_string(),
            self.normal_base.to_string(),
            self.tumour_base.to_string(),
            self.normal_counts_a.to_string(),
            self.normal_counts_b.to_string(),
            self.tumour_counts_a.to_string(),
            self.tumour_counts_b.to_string(),
        ]
    }
}

impl CountRecord for CountRow {
    const N_CATEGORIES: usize = 2;
    fn push_counts(&self, out: &mut Vec<u32>) {
        out.extend_from_slice(&[
            self.normal_counts_a,
            self.normal_counts_b,
            self.tumour_counts_a,
            self.tumour_counts_b,
        ]);
    }
}

///
/// One genomic site with reference, non-reference and other-allele read counts
/// for each sample.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultinomialCountRow {
    pub chrom: String,
    pub position: u64,
    pub ref_base: char,
    pub non_ref_base: char,
    pub normal_counts_a: u32,
    pub normal_counts_b: u32,
    pub normal_counts_other: u32,
    pub tumour_counts_a: u32,
    pub tumour_counts_b: u32,
    pub tumour_counts_other: u32,
}

impl TableRecord for MultinomialCountRow {
    const HEADER: &'static [&'static str] = &[
        "chrom",
        "position",
        "ref_base",
        "non_ref_base",
        "normal_counts_a",
        "normal_counts_b",
        "normal_counts_other",
        "tumour_counts_a",
        "tumour_counts_b",
        "tumour_counts_other",
    ];
    fn chrom(&self) -> &str {
        &self.chrom
    }
    fn fields(&self) -> Vec<String> {
        vec![
            self.chrom.clone(),
            self.position.to_string(),
            self.ref_base.to_string(),
            self.non_ref_base.to_string(),
            self.normal_counts_a.to_string(),
            self.normal_counts_b.to_string(),
            self.normal_counts_other.to_string(),
            self.tumour_counts_a.to_string(),
            self.tumour_counts_b.to_string(),
            self.tumour_counts_other.to_string(),
        ]
    }
}

impl CountRecord for MultinomialCountRow {
    const N_CATEGORIES: usize = 3;
    fn push_counts(&self, out: &mut Vec<u32>) {
        out.extend_from_slice(&[
            self.normal_counts_a,
            self.normal_counts_b,
            self.normal_counts_other,
            self.tumour_counts_a,
            self.tumour_counts_b,
            self.tumour_counts_other,
        ]);
    }
}

//
// tests
//

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::io::CountsSource;
    use anyhow::{anyhow, ensure};
    use std::ops::Range;

    ///
    /// Rows of one chromosome, in coordinate order.
    ///
    #[derive(Clone, Debug)]
    pub struct ChromosomeTable<R> {
        pub name: String,
        pub rows: Vec<R>,
    }

    impl<R> ChromosomeTable<R> {
        pub fn new(name: &str, rows: Vec<R>) -> Self {
            ChromosomeTable {
                name: name.to_owned(),
                rows,
            }
        }
        pub fn len(&self) -> usize {
            self.rows.len()
        }
        pub fn is_empty(&self) -> bool {
            self.rows.is_empty()
        }
    }

    ///
    /// In-memory `CountsSource` of chromosome tables, in declared order.
    ///
    #[derive(Clone, Debug)]
    pub struct GenomeTable<R> {
        chromosomes: Vec<ChromosomeTable<R>>,
    }

    impl<R> GenomeTable<R> {
        pub fn new(chromosomes: Vec<ChromosomeTable<R>>) -> Self {
            GenomeTable { chromosomes }
        }
        fn chromosome(&self, name: &str) -> Result<&ChromosomeTable<R>> {
            self.chromosomes
                .iter()
                .find(|table| table.name == name)
                .ok_or_else(|| anyhow!("unknown chromosome `{}`", name))
        }
    }

    impl<R: CountRecord> CountsSource for GenomeTable<R> {
        type Row = R;
        fn chromosome_names(&self) -> Vec<String> {
            self.chromosomes.iter().map(|t| t.name.clone()).collect()
        }
        fn chromosome_length(&self, name: &str) -> Result<usize> {
            Ok(self.chromosome(name)?.len())
        }
        fn total_row_count(&self) -> usize {
            self.chromosomes.iter().map(|t| t.len()).sum()
        }
        fn rows(&mut self, name: &str, range: Range<usize>) -> Result<Vec<R>> {
            let table = self.chromosome(name)?;
            ensure!(
                range.start <= range.end && range.end <= table.len(),
                "rows {:?} out of range for chromosome `{}` of length {}",
                range,
                name,
                table.len()
            );
            Ok(table.rows[range].to_vec())
        }
    }

    /// a joint counts row with given counts
    pub fn row(chrom: &str, position: u64, counts: [u32; 4]) -> CountRow {
        CountRow {
            chrom: chrom.to_owned(),
            position,
            ref_base: 'A',
            normal_base: 'C',
            tumour_base: 'C',
            normal_counts_a: counts[0],
            normal_counts_b: counts[1],
            tumour_counts_a: counts[2],
            tumour_counts_b: counts[3],
        }
    }

    /// genome whose row `i` of each chromosome has `normal_counts_a == i`
    pub fn indexed_genome(lengths: &[(&str, usize)]) -> GenomeTable<CountRow> {
        GenomeTable::new(
            lengths
                .iter()
                .map(|&(name, len)| {
                    let rows = (0..len)
                        .map(|i| row(name, i as u64 + 1, [i as u32, 1, 2, 3]))
                        .collect();
                    ChromosomeTable::new(name, rows)
                })
                .collect(),
        )
    }

    #[test]
    fn counts_matrix_layout() {
        let rows = vec![row("1", 10, [1, 2, 3, 4]), row("1", 11, [5, 6, 7, 8])];
        let m = counts_matrix(&rows).unwrap();
        assert_eq!(m.shape(), &[2, 4]);
        assert_eq!(m.row(1).to_vec(), vec![5, 6, 7, 8]);

        let empty: Vec<CountRow> = Vec::new();
        assert_eq!(counts_matrix(&empty).unwrap().shape(), &[0, 4]);
    }

    #[test]
    fn genome_table_source() {
        let mut genome = indexed_genome(&[("2", 5), ("1", 3)]);
        assert_eq!(genome.chromosome_names(), vec!["2", "1"]);
        assert_eq!(genome.chromosome_length("1").unwrap(), 3);
        assert_eq!(genome.total_row_count(), 8);
        let rows = genome.rows("2", 1..4).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].normal_counts_a, 1);
        assert!(genome.rows("2", 3..6).is_err());
        assert!(genome.chromosome_length("X").is_err());

        let counts = genome.counts_at("2", &[4, 0]).unwrap();
        assert_eq!(counts.column(0).to_vec(), vec![0, 4]);
    }

    #[test]
    fn multinomial_row_counts() {
        let r = MultinomialCountRow {
            chrom: "1".to_owned(),
            position: 1,
            ref_base: 'A',
            non_ref_base: 'T',
            normal_counts_a: 1,
            normal_counts_b: 2,
            normal_counts_other: 3,
            tumour_counts_a: 4,
            tumour_counts_b: 5,
            tumour_counts_other: 6,
        };
        let m = counts_matrix(&[r.clone()]).unwrap();
        assert_eq!(m.row(0).to_vec(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(r.fields().len(), MultinomialCountRow::HEADER.len());
    }
}
