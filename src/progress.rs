//!
//! Progress events of the slow passes
//!
//! Training, classification and somatic extraction report what they are doing
//! through a `ProgressListener` supplied by the caller,
//! instead of printing on their own.
//!
use log::info;

///
/// Something that happened during a run.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Event<'a> {
    /// `total` models are about to be trained
    TrainingStarted { total: usize },
    /// the `index`-th of `total` models (a sample, a chromosome or the whole genome) starts training on `rows` rows
    ModelTrainingStarted {
        name: &'a str,
        index: usize,
        total: usize,
        rows: usize,
    },
    /// the `index`-th model finished training
    ModelTrained {
        name: &'a str,
        index: usize,
        total: usize,
    },
    /// classification of `rows` rows in `chromosomes` chromosomes starts
    ClassifyStarted { chromosomes: usize, rows: usize },
    /// all rows of a chromosome were classified and written
    ChromosomeClassified { name: &'a str, rows: usize },
    /// all rows of a chromosome were scanned, `kept` candidates remain
    ChromosomeScanned {
        name: &'a str,
        rows: usize,
        kept: usize,
    },
    /// the pass is over
    Finished,
}

///
/// Receiver of progress events.
///
pub trait ProgressListener {
    fn on_event(&mut self, event: &Event);
}

///
/// Reports events through the `log` facade.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl ProgressListener for LogProgress {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::TrainingStarted { total } => info!("training {} model(s)", total),
            Event::ModelTrainingStarted {
                name,
                index,
                total,
                rows,
            } => info!("training {} ({}/{}) on {} rows", name, index + 1, total, rows),
            Event::ModelTrained { name, index, total } => {
                info!("trained {} ({}/{})", name, index + 1, total)
            }
            Event::ClassifyStarted { chromosomes, rows } => {
                info!("classifying {} rows in {} chromosomes", rows, chromosomes)
            }
            Event::ChromosomeClassified { name, rows } => {
                info!("classified chromosome {} ({} rows)", name, rows)
            }
            Event::ChromosomeScanned { name, rows, kept } => {
                info!("scanned chromosome {} ({} rows), {} candidates", name, rows, kept)
            }
            Event::Finished => info!("done"),
        }
    }
}

///
/// Ignores every event.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn on_event(&mut self, _event: &Event) {}
}

///
/// Keeps a readable trace of every event, for tests.
///
#[derive(Clone, Debug, Default)]
pub struct RecordProgress {
    pub events: Vec<String>,
}

impl ProgressListener for RecordProgress {
    fn on_event(&mut self, event: &Event) {
        self.events.push(format!("{:?}", event));
    }
}
