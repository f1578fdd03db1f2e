use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use jointsnvmix::{
    common::WINDOW_SIZE,
    io::varscan::varscan_to_jcnt,
    progress::{Event, LogProgress, ProgressListener},
    runner::{run_classifier, Density, ModelFamily, RunConfig},
    somatic::extract_somatics,
    train::TrainingConfig,
    utils::timer,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, about, version)]
struct Opts {
    #[clap(subcommand)]
    command: Commands,
    /// Report progress in the log instead of progress bars
    #[clap(long)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify every site of a counts table into joint genotypes
    Classify {
        /// Model family
        #[clap(long, value_enum)]
        model: ModelFamily,
        /// Likelihood of the read counts
        #[clap(long, value_enum, default_value_t = Density::Binomial)]
        density: Density,
        /// Input counts table (jcnt, or mcnt for the multinomial density)
        #[clap(long)]
        counts: PathBuf,
        /// Output classified table
        #[clap(long)]
        out: PathBuf,
        /// Priors JSON. If given, parameters are trained
        #[clap(long)]
        priors: Option<PathBuf>,
        /// Parameters JSON to use instead of training
        #[clap(long)]
        params: Option<PathBuf>,
        /// Number of rows used for training, 0 for all rows
        #[clap(long, default_value_t = 0)]
        subsample_size: usize,
        /// Maximum number of EM iterations
        #[clap(long, default_value_t = 1000)]
        max_iters: usize,
        /// EM stops when the log posterior changes less than this
        #[clap(long, default_value_t = 1e-6)]
        convergence_threshold: f64,
        /// Number of rows classified at once
        #[clap(long, default_value_t = WINDOW_SIZE)]
        window_size: usize,
        /// Seed of the subsampling
        #[clap(long, default_value_t = 0)]
        seed: u64,
    },
    /// Rank the somatic candidates of a classified table
    ExtractSomatics {
        /// Classified table
        jsm: PathBuf,
        /// Output table of somatic calls
        out: PathBuf,
        /// Chromosomes to skip
        #[clap(long, default_values = &["Y", "MT"])]
        exclude: Vec<String>,
    },
    /// Convert VarScan somatic output (plain or .gz) into a jcnt table
    ///
    /// Rows of each chromosome must be contiguous in the input; a chromosome that
    /// reappears after another one is rejected.
    VarscanToJcnt {
        varscan: PathBuf,
        jcnt: PathBuf,
    },
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:.bold} {msg:.bold} [{elapsed_precise}] {bar:48.cyan/blue} {pos:>9}/{len:9} ETA {eta_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} {spinner:.magenta} {msg:.bold} [{elapsed_precise}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

///
/// Progress bars on stderr: models trained, rows classified, chromosomes scanned.
///
#[derive(Default)]
struct BarProgress {
    bar: Option<ProgressBar>,
}

impl BarProgress {
    fn start(&mut self, len: Option<u64>, prefix: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
        let bar = ProgressBar::with_draw_target(len, ProgressDrawTarget::stderr_with_hz(15));
        bar.set_style(if len.is_some() {
            bar_style()
        } else {
            spinner_style()
        });
        bar.set_prefix(prefix.to_string());
        self.bar = Some(bar);
    }
}

impl ProgressListener for BarProgress {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::TrainingStarted { total } => self.start(Some(*total as u64), "train"),
            Event::ClassifyStarted { rows, .. } => self.start(Some(*rows as u64), "classify"),
            Event::ChromosomeScanned { .. } if self.bar.is_none() => self.start(None, "scan"),
            _ => {}
        }
        let bar = match &self.bar {
            Some(bar) => bar,
            None => return,
        };
        match event {
            Event::ModelTrainingStarted { name, rows, .. } => {
                bar.set_message(format!("{} ({} rows)", name, rows))
            }
            Event::ModelTrained { .. } => bar.inc(1),
            Event::ChromosomeClassified { name, rows } => {
                bar.set_message(name.to_string());
                bar.inc(*rows as u64);
            }
            Event::ChromosomeScanned { name, kept, .. } => {
                bar.set_message(format!("{} ({} candidates)", name, kept));
                bar.tick();
            }
            Event::Finished => bar.finish(),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts: Opts = Opts::parse();
    println!("# started_at={}", chrono::Local::now());
    println!("# opts={:?}", opts);

    let mut listener: Box<dyn ProgressListener> = if opts.no_progress {
        Box::new(LogProgress)
    } else {
        Box::new(BarProgress::default())
    };

    let (result, ms) = timer(|| -> Result<()> {
        match &opts.command {
            Commands::Classify {
                model,
                density,
                counts,
                out,
                priors,
                params,
                subsample_size,
                max_iters,
                convergence_threshold,
                window_size,
                seed,
            } => {
                let config = RunConfig::new(
                    *model,
                    *density,
                    counts.clone(),
                    out.clone(),
                    priors.clone(),
                    params.clone(),
                    TrainingConfig::new(*max_iters, *convergence_threshold, *subsample_size),
                    *window_size,
                    *seed,
                );
                let n = run_classifier(&config, listener.as_mut())?;
                info!("classified {} rows into {:?}", n, out);
            }
            Commands::ExtractSomatics { jsm, out, exclude } => {
                extract_somatics(jsm, out, exclude, listener.as_mut())?;
            }
            Commands::VarscanToJcnt { varscan, jcnt } => {
                varscan_to_jcnt(varscan, jcnt)?;
            }
        }
        Ok(())
    });
    result?;
    println!("# elapsed_ms={}", ms);
    println!("# finished_at={}", chrono::Local::now());
    Ok(())
}
