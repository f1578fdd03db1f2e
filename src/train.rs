//!
//! Training orchestration
//!
//! Builds the parameters used for classification at one of three granularities:
//!
//! * `Layout::Joint`: one joint model over the whole genome (or a genome-wide subsample)
//! * `Layout::Independent`: one single-sample model per sample over the whole genome
//! * `Layout::PerChromosome`: one joint model per chromosome, trained on that chromosome only
//!
use crate::common::{Counts, Independent, Sample};
use crate::data::DataView;
use crate::io::CountsSource;
use crate::model::Model;
use crate::progress::{Event, ProgressListener};
use crate::subsample::{chromosome_sample, proportional_sample, stack};
use anyhow::{Context, Result};
use derive_new::new;
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Granularity of trained parameters.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Joint,
    Independent,
    PerChromosome,
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Layout::Joint => "joint",
            Layout::Independent => "independent",
            Layout::PerChromosome => "per_chromosome",
        };
        write!(f, "{}", s)
    }
}

///
/// Trained (or loaded) parameters of a model, tagged with their layout.
///
/// Serialized as a JSON object whose `layout` field names the variant.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum Parameters<P> {
    Joint { params: P },
    Independent { normal: P, tumour: P },
    PerChromosome { chromosomes: BTreeMap<String, P> },
}

impl<P> Parameters<P> {
    pub fn layout(&self) -> Layout {
        match self {
            Parameters::Joint { .. } => Layout::Joint,
            Parameters::Independent { .. } => Layout::Independent,
            Parameters::PerChromosome { .. } => Layout::PerChromosome,
        }
    }
}

///
/// Parameters of the chromosomes trained so far.
///
#[derive(Clone, Debug, PartialEq)]
pub struct ChromosomeParameters<P> {
    chromosomes: BTreeMap<String, P>,
}

impl<P> ChromosomeParameters<P> {
    pub fn new() -> Self {
        ChromosomeParameters {
            chromosomes: BTreeMap::new(),
        }
    }
    pub fn insert(&mut self, name: &str, params: P) {
        self.chromosomes.insert(name.to_owned(), params);
    }
    pub fn get(&self, name: &str) -> Option<&P> {
        self.chromosomes.get(name)
    }
    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }
    pub fn into_parameters(self) -> Parameters<P> {
        Parameters::PerChromosome {
            chromosomes: self.chromosomes,
        }
    }
}

impl<P> Default for ChromosomeParameters<P> {
    fn default() -> Self {
        Self::new()
    }
}

///
/// Stopping rule and training data size.
///
#[derive(Clone, Copy, Debug, PartialEq, new)]
pub struct TrainingConfig {
    pub max_iters: usize,
    pub convergence_threshold: f64,
    /// rows to subsample for training, 0 to use every row
    pub subsample_size: usize,
}

///
/// Trains a `Model` on the rows of a `CountsSource`.
///
pub struct Trainer<M, G> {
    model: M,
    config: TrainingConfig,
    rng: G,
}

impl<M: Model, G: Rng> Trainer<M, G> {
    pub fn new(model: M, config: TrainingConfig, rng: G) -> Self {
        Trainer { model, config, rng }
    }
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }
    ///
    /// Counts of the whole genome, or of a proportional subsample of it.
    ///
    fn genome_counts<S: CountsSource>(&mut self, source: &mut S) -> Result<Counts> {
        if self.config.subsample_size > 0 {
            return proportional_sample(source, self.config.subsample_size, &mut self.rng);
        }
        let parts = source
            .chromosome_names()
            .iter()
            .map(|name| source.counts(name))
            .collect::<Result<Vec<_>>>()?;
        stack::<S::Row>(parts)
    }
    fn fit(&self, data: &DataView, priors: &M::Priors) -> Result<M::Params> {
        self.model.train(
            data,
            priors,
            self.config.max_iters,
            self.config.convergence_threshold,
        )
    }
    ///
    /// A single joint model over the whole genome.
    ///
    pub fn train_joint<S: CountsSource>(
        &mut self,
        source: &mut S,
        priors: &M::Priors,
        listener: &mut dyn ProgressListener,
    ) -> Result<Parameters<M::Params>> {
        let counts = self.genome_counts(source)?;
        listener.on_event(&Event::TrainingStarted { total: 1 });
        listener.on_event(&Event::ModelTrainingStarted {
            name: "genome",
            index: 0,
            total: 1,
            rows: counts.nrows(),
        });
        let params = self
            .fit(&DataView::joint(counts.view()), priors)
            .context("failed to train the joint model")?;
        listener.on_event(&Event::ModelTrained {
            name: "genome",
            index: 0,
            total: 1,
        });
        Ok(Parameters::Joint { params })
    }
    ///
    /// One single-sample model per sample, trained on the same rows.
    ///
    pub fn train_independent<S: CountsSource>(
        &mut self,
        source: &mut S,
        priors: &Independent<M::Priors>,
        listener: &mut dyn ProgressListener,
    ) -> Result<Parameters<M::Params>> {
        let counts = self.genome_counts(source)?;
        listener.on_event(&Event::TrainingStarted {
            total: Sample::ALL.len(),
        });
        let normal = self.fit_sample(&counts, Sample::Normal, priors, listener)?;
        let tumour = self.fit_sample(&counts, Sample::Tumour, priors, listener)?;
        Ok(Parameters::Independent { normal, tumour })
    }
    fn fit_sample(
        &self,
        counts: &Counts,
        sample: Sample,
        priors: &Independent<M::Priors>,
        listener: &mut dyn ProgressListener,
    ) -> Result<M::Params> {
        let (index, total) = (sample.index(), Sample::ALL.len());
        listener.on_event(&Event::ModelTrainingStarted {
            name: sample.name(),
            index,
            total,
            rows: counts.nrows(),
        });
        let data = DataView::independent(counts.view(), sample);
        let params = self
            .fit(&data, priors.get(sample))
            .with_context(|| format!("failed to train the {} model", sample))?;
        listener.on_event(&Event::ModelTrained {
            name: sample.name(),
            index,
            total,
        });
        Ok(params)
    }
    ///
    /// One joint model per chromosome, in ascending chromosome name order.
    ///
    /// With a positive subsample size each chromosome is trained on at most that many rows.
    ///
    pub fn train_per_chromosome<S: CountsSource>(
        &mut self,
        source: &mut S,
        priors: &M::Priors,
        listener: &mut dyn ProgressListener,
    ) -> Result<Parameters<M::Params>> {
        let mut names = source.chromosome_names();
        names.sort();
        let total = names.len();
        listener.on_event(&Event::TrainingStarted { total });

        let mut state = ChromosomeParameters::new();
        for (index, name) in names.iter().enumerate() {
            let counts = if self.config.subsample_size > 0 {
                chromosome_sample(source, name, self.config.subsample_size, &mut self.rng)?
            } else {
                source.counts(name)?
            };
            listener.on_event(&Event::ModelTrainingStarted {
                name,
                index,
                total,
                rows: counts.nrows(),
            });
            let params = self
                .fit(&DataView::joint(counts.view()), priors)
                .with_context(|| format!("failed to train the model of chromosome {}", name))?;
            state.insert(name, params);
            listener.on_event(&Event::ModelTrained { name, index, total });
        }
        info!("trained {} chromosome models", state.len());
        Ok(state.into_parameters())
    }
}

//
// tests
//
