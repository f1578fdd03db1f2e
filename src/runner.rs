//!
//! Classification runs
//!
//! A run is described by a `RunConfig`. It is resolved into a `Plan` once,
//! before any file is touched:
//!
//! * the model family and density select a `Variant` (model, table format and parameter layout)
//! * a priors file selects training, otherwise a parameters file selects loading
//!
//! The plan then drives training (or loading), persistence of the parameters and
//! window-by-window classification of every chromosome.
//!
use crate::combine::joint_responsibilities;
use crate::common::{Independent, Responsibilities, Sample};
use crate::data::DataView;
use crate::driver::{Driver, WindowClassifier};
use crate::error::ConfigError;
use crate::io::jsm::{JsmWriter, LabelWriter};
use crate::io::json::load_from_file;
use crate::io::tsv::IndexedTable;
use crate::io::ClassifiedSink;
use crate::model::fisher::{FisherModel, LABELS};
use crate::model::beta_binomial::BetaBinomialMixture;
use crate::model::mixture::CategoricalMixture;
use crate::model::Model;
use crate::progress::ProgressListener;
use crate::table::{CountRecord, CountRow, MultinomialCountRow};
use crate::train::{Layout, Parameters, Trainer, TrainingConfig};
use anyhow::{anyhow, Context, Result};
use derive_new::new;
use log::{info, warn};
use ndarray::ArrayView2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

///
/// Model family requested by the caller.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelFamily {
    /// one single-sample model per sample, combined into joint classes
    Independent,
    /// one joint two-sample model for the whole genome
    Joint,
    /// one joint two-sample model per chromosome
    Chromosome,
    /// Fisher exact test, no training
    Fisher,
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ModelFamily::Independent => "independent",
            ModelFamily::Joint => "joint",
            ModelFamily::Chromosome => "chromosome",
            ModelFamily::Fisher => "fisher",
        };
        write!(f, "{}", s)
    }
}

///
/// Likelihood family of the read counts.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Density {
    /// ref/non-ref counts (jcnt tables)
    Binomial,
    /// overdispersed ref/non-ref counts (jcnt tables)
    #[clap(name = "beta_binomial")]
    BetaBinomial,
    /// ref/non-ref/other counts (mcnt tables)
    Multinomial,
}

impl std::fmt::Display for Density {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Density::Binomial => "binomial",
            Density::BetaBinomial => "beta_binomial",
            Density::Multinomial => "multinomial",
        };
        write!(f, "{}", s)
    }
}

impl Density {
    /// format of the counts table read with this density
    pub fn table(self) -> TableKind {
        match self {
            Density::Binomial | Density::BetaBinomial => TableKind::Jcnt,
            Density::Multinomial => TableKind::Mcnt,
        }
    }
}

///
/// Format of the counts table.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableKind {
    /// `CountRow`
    Jcnt,
    /// `MultinomialCountRow`
    Mcnt,
}

///
/// What a (family, density) pair runs.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Mixture { layout: Layout, density: Density },
    Fisher,
}

///
/// Resolve the requested family and density, or report the combination as unsupported.
///
pub fn resolve(family: ModelFamily, density: Density) -> Result<Variant, ConfigError> {
    let layout = match family {
        ModelFamily::Fisher => return Ok(Variant::Fisher),
        ModelFamily::Independent => Layout::Independent,
        ModelFamily::Joint => Layout::Joint,
        ModelFamily::Chromosome => Layout::PerChromosome,
    };
    match (layout, density) {
        (Layout::Independent, Density::Multinomial) => {
            Err(ConfigError::Unsupported { family, density })
        }
        _ => Ok(Variant::Mixture { layout, density }),
    }
}

///
/// Where the parameters of a run come from.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSource {
    /// train with the priors in this file
    Train(PathBuf),
    /// load the parameters in this file
    Load(PathBuf),
    /// nothing to train or load
    Untrained,
}

///
/// Everything a classification run needs.
///
#[derive(Clone, Debug, new)]
pub struct RunConfig {
    pub family: ModelFamily,
    pub density: Density,
    /// counts table (jcnt or mcnt)
    pub counts: PathBuf,
    /// classified output table
    pub out: PathBuf,
    pub priors: Option<PathBuf>,
    pub params: Option<PathBuf>,
    pub training: TrainingConfig,
    pub window_size: usize,
    pub seed: u64,
}

///
/// A validated `RunConfig`.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub variant: Variant,
    pub source: ModelSource,
    pub driver: Driver,
}

impl RunConfig {
    ///
    /// Check the configuration without touching any file.
    ///
    pub fn plan(&self) -> Result<Plan, ConfigError> {
        let variant = resolve(self.family, self.density)?;
        let driver = Driver::new(self.window_size)?;
        let source = match (variant, &self.priors, &self.params) {
            (Variant::Fisher, _, _) => ModelSource::Untrained,
            (_, Some(priors), _) => ModelSource::Train(priors.clone()),
            (_, None, Some(params)) => ModelSource::Load(params.clone()),
            (_, None, None) => {
                return Err(ConfigError::MissingModelSource {
                    family: self.family,
                })
            }
        };
        Ok(Plan {
            variant,
            source,
            driver,
        })
    }
}

///
/// Classifies windows with trained mixture parameters of any layout.
///
/// Independent parameters classify each sample on its own and combine the two
/// results into joint classes.
///
#[derive(new)]
pub struct ModelClassifier<'a, M: Model> {
    model: &'a M,
    params: &'a Parameters<M::Params>,
}

impl<'a, M: Model> WindowClassifier for ModelClassifier<'a, M> {
    fn n_classes(&self) -> usize {
        self.model.n_classes(Sample::ALL.len())
    }
    fn classify_window(&self, chrom: &str, counts: ArrayView2<u32>) -> Result<Responsibilities> {
        match self.params {
            Parameters::Joint { params } => self.model.classify(&DataView::joint(counts), params),
            Parameters::Independent { normal, tumour } => {
                let normal = self
                    .model
                    .classify(&DataView::independent(counts, Sample::Normal), normal)?;
                let tumour = self
                    .model
                    .classify(&DataView::independent(counts, Sample::Tumour), tumour)?;
                joint_responsibilities(normal.view(), tumour.view())
            }
            Parameters::PerChromosome { chromosomes } => {
                let params = chromosomes
                    .get(chrom)
                    .ok_or_else(|| anyhow!("no parameters for chromosome {}", chrom))?;
                self.model.classify(&DataView::joint(counts), params)
            }
        }
    }
}

///
/// Run a classification as configured. Returns the number of classified rows.
///
pub fn run_classifier(config: &RunConfig, listener: &mut dyn ProgressListener) -> Result<usize> {
    let plan = config.plan()?;
    info!("plan: {:?}", plan);
    match plan.variant {
        Variant::Fisher => run_fisher(config, &plan, listener),
        Variant::Mixture { layout, density } => match density {
            Density::Binomial => {
                run_mixture::<CountRow, _>(config, &plan, layout, CategoricalMixture, listener)
            }
            Density::Multinomial => run_mixture::<MultinomialCountRow, _>(
                config,
                &plan,
                layout,
                CategoricalMixture,
                listener,
            ),
            Density::BetaBinomial => {
                run_mixture::<CountRow, _>(config, &plan, layout, BetaBinomialMixture, listener)
            }
        },
    }
}

/// priors file contents, by layout
enum LoadedPriors<P> {
    Shared(P),
    Independent(Independent<P>),
}

fn load_priors<P: DeserializeOwned>(path: &Path, layout: Layout) -> Result<LoadedPriors<P>> {
    let priors = match layout {
        Layout::Independent => LoadedPriors::Independent(load_from_file(path)?),
        Layout::Joint | Layout::PerChromosome => LoadedPriors::Shared(load_from_file(path)?),
    };
    Ok(priors)
}

fn load_parameters<P: DeserializeOwned>(path: &Path, layout: Layout) -> Result<Parameters<P>> {
    let params: Parameters<P> = load_from_file(path)?;
    if params.layout() != layout {
        return Err(ConfigError::ParameterLayout {
            expected: layout,
            found: params.layout(),
        }
        .into());
    }
    Ok(params)
}

fn run_mixture<R: CountRecord, M: Model + Clone>(
    config: &RunConfig,
    plan: &Plan,
    layout: Layout,
    model: M,
    listener: &mut dyn ProgressListener,
) -> Result<usize> {
    // model inputs are read (and checked) before the tables are opened
    let (priors, loaded) = match &plan.source {
        ModelSource::Train(path) => (Some(load_priors::<M::Priors>(path, layout)?), None),
        ModelSource::Load(path) => (None, Some(load_parameters::<M::Params>(path, layout)?)),
        ModelSource::Untrained => (None, None),
    };

    let mut source = IndexedTable::<R>::open(&config.counts)?;
    let mut sink = JsmWriter::<R>::create(&config.out, Sample::ALL.len())?;

    let params = match (priors, loaded) {
        (Some(priors), _) => {
            let mut trainer = Trainer::new(
                model.clone(),
                config.training,
                Xoshiro256PlusPlus::seed_from_u64(config.seed),
            );
            match (layout, priors) {
                (Layout::Joint, LoadedPriors::Shared(priors)) => {
                    sink.write_priors(&priors)?;
                    trainer.train_joint(&mut source, &priors, listener)?
                }
                (Layout::PerChromosome, LoadedPriors::Shared(priors)) => {
                    sink.write_priors(&priors)?;
                    trainer.train_per_chromosome(&mut source, &priors, listener)?
                }
                (_, LoadedPriors::Independent(priors)) => {
                    sink.write_priors(&priors)?;
                    trainer.train_independent(&mut source, &priors, listener)?
                }
                (layout, LoadedPriors::Shared(_)) => {
                    return Err(anyhow!("shared priors cannot train {} parameters", layout))
                }
            }
        }
        (None, Some(params)) => params,
        (None, None) => return Err(ConfigError::MissingModelSource { family: config.family }.into()),
    };
    sink.write_parameters(&params)
        .with_context(|| format!("failed to persist parameters of {:?}", config.out))?;

    let classifier = ModelClassifier::new(&model, &params);
    plan.driver
        .run(&mut source, &classifier, &mut sink, listener)
}

///
/// Label every row of a jcnt table with the Fisher exact test classifier.
///
fn run_fisher(
    config: &RunConfig,
    plan: &Plan,
    listener: &mut dyn ProgressListener,
) -> Result<usize> {
    if config.priors.is_some() || config.params.is_some() {
        warn!("the fisher model is not trained, ignoring priors and parameters");
    }
    let mut source = IndexedTable::<CountRow>::open(&config.counts)?;
    let mut sink = LabelWriter::<CountRow>::create(&config.out, &LABELS)?;
    plan.driver
        .run(&mut source, &FisherModel::default(), &mut sink, listener)
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::beta_binomial::tests::beta_binomial_priors;
    use crate::model::beta_binomial::BetaBinomialParams;
    use crate::model::mixture::tests::{binomial_priors, joint_counts};
    use crate::model::mixture::MixtureParams;
    use crate::progress::NoProgress;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;
    use test_case::test_case;

    #[test_case(ModelFamily::Joint, Density::Binomial, Some(TableKind::Jcnt) ; "joint binomial")]
    #[test_case(ModelFamily::Joint, Density::Multinomial, Some(TableKind::Mcnt) ; "joint multinomial")]
    #[test_case(ModelFamily::Chromosome, Density::Binomial, Some(TableKind::Jcnt) ; "chromosome binomial")]
    #[test_case(ModelFamily::Chromosome, Density::Multinomial, Some(TableKind::Mcnt) ; "chromosome multinomial")]
    #[test_case(ModelFamily::Independent, Density::Binomial, Some(TableKind::Jcnt) ; "independent binomial")]
    #[test_case(ModelFamily::Independent, Density::Multinomial, None ; "independent multinomial")]
    #[test_case(ModelFamily::Joint, Density::BetaBinomial, Some(TableKind::Jcnt) ; "joint beta binomial")]
    #[test_case(ModelFamily::Chromosome, Density::BetaBinomial, Some(TableKind::Jcnt) ; "chromosome beta binomial")]
    #[test_case(ModelFamily::Independent, Density::BetaBinomial, Some(TableKind::Jcnt) ; "independent beta binomial")]
    fn resolve_mixtures(family: ModelFamily, density: Density, table: Option<TableKind>) {
        match (resolve(family, density), table) {
            (Ok(Variant::Mixture { density: d, .. }), Some(table)) => {
                assert_eq!(d, density);
                assert_eq!(d.table(), table);
            }
            (Err(e), None) => assert_eq!(e, ConfigError::Unsupported { family, density }),
            (other, _) => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fisher_ignores_density() {
        assert_eq!(
            resolve(ModelFamily::Fisher, Density::BetaBinomial),
            Ok(Variant::Fisher)
        );
    }

    fn config(family: ModelFamily, density: Density) -> RunConfig {
        RunConfig::new(
            family,
            density,
            PathBuf::from("/nonexistent/in.jcnt"),
            PathBuf::from("/nonexistent/out.jsm"),
            None,
            None,
            TrainingConfig::new(100, 1e-6, 0),
            100_000,
            0,
        )
    }

    #[test]
    fn plan_selects_model_source() {
        let mut c = config(ModelFamily::Joint, Density::Binomial);
        assert_eq!(
            c.plan(),
            Err(ConfigError::MissingModelSource {
                family: ModelFamily::Joint
            })
        );
        c.params = Some(PathBuf::from("p.json"));
        assert_eq!(c.plan().unwrap().source, ModelSource::Load("p.json".into()));
        // priors win over parameters
        c.priors = Some(PathBuf::from("q.json"));
        assert_eq!(c.plan().unwrap().source, ModelSource::Train("q.json".into()));

        let f = config(ModelFamily::Fisher, Density::Binomial);
        assert_eq!(f.plan().unwrap().source, ModelSource::Untrained);

        let mut z = config(ModelFamily::Fisher, Density::Binomial);
        z.window_size = 0;
        assert_eq!(z.plan(), Err(ConfigError::ZeroWindow));
    }

    #[test]
    fn configuration_errors_come_before_io() {
        let mut c = config(ModelFamily::Independent, Density::Multinomial);
        c.priors = Some(PathBuf::from("/nonexistent/priors.json"));
        let err = run_classifier(&c, &mut NoProgress).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn independent_classifier_combines_samples() {
        let counts = joint_counts();
        let model = CategoricalMixture;
        let params = Parameters::Independent {
            normal: MixtureParams::from_priors(&binomial_priors(1)),
            tumour: MixtureParams::from_priors(&binomial_priors(1)),
        };
        let classifier = ModelClassifier::new(&model, &params);
        assert_eq!(classifier.n_classes(), 9);
        let resp = classifier.classify_window("1", counts.view()).unwrap();
        assert_eq!(resp.shape(), &[50, 9]);
        for row in resp.outer_iter() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
        // aa_aa, aa_ab and ab_ab blocks
        assert!(resp[[0, 0]] > 0.99);
        assert!(resp[[35, 1]] > 0.99);
        assert!(resp[[45, 4]] > 0.99);
    }

    #[test]
    fn per_chromosome_classifier_needs_the_chromosome() {
        let counts = joint_counts();
        let model = CategoricalMixture;
        let mut chromosomes = BTreeMap::new();
        chromosomes.insert(
            "1".to_owned(),
            MixtureParams::from_priors(&binomial_priors(2)),
        );
        let params = Parameters::PerChromosome { chromosomes };
        let classifier = ModelClassifier::new(&model, &params);
        assert!(classifier.classify_window("1", counts.view()).is_ok());
        assert!(classifier.classify_window("2", counts.view()).is_err());
    }

    #[test]
    fn beta_binomial_classifier_combines_samples() {
        let counts = joint_counts();
        let model = BetaBinomialMixture;
        let params = Parameters::Independent {
            normal: BetaBinomialParams::from_priors(&beta_binomial_priors(1)),
            tumour: BetaBinomialParams::from_priors(&beta_binomial_priors(1)),
        };
        let classifier = ModelClassifier::new(&model, &params);
        let resp = classifier.classify_window("1", counts.view()).unwrap();
        assert_eq!(resp.shape(), &[50, 9]);
        assert!(resp[[0, 0]] > 0.95);
        assert!(resp[[35, 1]] > 0.95);
        assert!(resp[[45, 4]] > 0.95);
    }
}
