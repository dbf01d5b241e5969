use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use gpmusic::dataset::{TrainingData, load_training_data};
use gpmusic::{GaussianProcessRegressor, KernelKind, KernelParameters, RandomWalk, WalkConfig};

/// Gaussian Process melody generator.
#[derive(Parser, Debug)]
#[command(name = "gpmusic")]
#[command(about = "Predict, sample and random-walk musical contours with Gaussian Processes")]
#[command(version)]
struct Cli {
    /// Seed for the random generator. Omit for a fresh entropy seed.
    /// Can also be set via GPMUSIC_SEED environment variable.
    #[arg(long, global = true, env = "GPMUSIC_SEED")]
    seed: Option<u64>,

    /// Round output values to the nearest integer (e.g. MIDI note numbers).
    #[arg(long, global = true)]
    round: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Posterior mean (and standard deviation) at query points.
    Predict {
        #[command(flatten)]
        model: ModelArgs,

        /// Also output the predictive standard deviation.
        #[arg(long)]
        std: bool,
    },
    /// Correlated samples from the posterior at query points.
    Sample {
        #[command(flatten)]
        model: ModelArgs,

        /// Number of samples to draw.
        #[arg(short = 'n', long, default_value_t = 1)]
        samples: usize,
    },
    /// Random walk drawn from the kernel's prior.
    Walk {
        #[command(flatten)]
        kernel: KernelArgs,

        /// Number of steps.
        #[arg(long, default_value_t = 32)]
        steps: usize,

        /// Level the walk fluctuates around.
        #[arg(long, default_value_t = 60.0)]
        start: f64,

        /// Spacing between steps.
        #[arg(long, default_value_t = 1.0)]
        step_size: f64,

        /// Number of walks to generate.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// JSON file with training inputs `x` and targets `y`.
    /// Can also be set via GPMUSIC_DATA environment variable.
    #[arg(long, value_name = "FILE", env = "GPMUSIC_DATA")]
    data: PathBuf,

    /// Comma-separated 1-D query points; overrides `query` in the data file.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    query: Option<Vec<f64>>,

    /// Observation noise added to the kernel diagonal.
    #[arg(long, default_value_t = 1e-6)]
    alpha: f64,

    /// Center targets on their mean before fitting.
    #[arg(long)]
    center: bool,

    #[command(flatten)]
    kernel: KernelArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum KernelChoice {
    Rbf,
    RationalQuadratic,
    Periodic,
}

#[derive(Args, Debug)]
struct KernelArgs {
    /// Kernel family; ignored when the data file names a kernel.
    #[arg(long, value_enum, default_value = "rbf")]
    kernel: KernelChoice,

    /// Kernel length scale; larger values give smoother contours.
    #[arg(long, env = "GPMUSIC_LENGTH_SCALE", default_value_t = 1.0)]
    length_scale: f64,

    /// Kernel signal variance (amplitude squared).
    #[arg(long, env = "GPMUSIC_VARIANCE", default_value_t = 1.0)]
    variance: f64,

    /// Shape parameter of the rational quadratic kernel.
    #[arg(long, default_value_t = 1.0)]
    rq_alpha: f64,

    /// Period of the periodic kernel.
    #[arg(long, default_value_t = 8.0)]
    periodicity: f64,
}

impl KernelArgs {
    fn parameters(&self) -> KernelParameters {
        match self.kernel {
            KernelChoice::Rbf => KernelParameters::Rbf {
                length_scale: self.length_scale,
                variance: self.variance,
            },
            KernelChoice::RationalQuadratic => KernelParameters::RationalQuadratic {
                length_scale: self.length_scale,
                variance: self.variance,
                alpha: self.rq_alpha,
            },
            KernelChoice::Periodic => KernelParameters::Periodic {
                length_scale: self.length_scale,
                variance: self.variance,
                periodicity: self.periodicity,
            },
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match cli.command {
        Command::Predict { model, std } => {
            let (gp, query) = fit_model(&model)?;
            let mut prediction = gp
                .predict(&query, std)
                .context("Failed to predict at query points")?;
            if cli.round {
                round_all(&mut prediction.mean);
            }
            if prediction.clamped > 0 {
                log::info!(
                    "{} query points had negative variance floored to zero",
                    prediction.clamped
                );
            }
            print_json(&prediction)?;
        }
        Command::Sample { model, samples } => {
            let (gp, query) = fit_model(&model)?;
            let mut draws = gp
                .sample_y(&query, samples, &mut rng)
                .context("Failed to sample from the posterior")?;
            if cli.round {
                draws.iter_mut().for_each(|row| round_all(row));
            }
            print_json(&draws)?;
        }
        Command::Walk {
            kernel,
            steps,
            start,
            step_size,
            count,
        } => {
            let params = kernel.parameters();
            let kernel = params.build().context("Invalid kernel parameters")?;
            let walk = RandomWalk::new(WalkConfig {
                steps,
                start,
                step_size,
                ..WalkConfig::default()
            })
            .context("Invalid walk configuration")?;

            let mut walks = walk
                .generate_n(&kernel, count, &mut rng)
                .context("Failed to generate random walk")?;
            if cli.round {
                walks.iter_mut().for_each(|w| round_all(w));
            }
            print_json(&walks)?;
        }
    }

    Ok(())
}

/// Loads the dataset, builds the kernel and fits the regressor.
fn fit_model(args: &ModelArgs) -> Result<(GaussianProcessRegressor<KernelKind>, Vec<Vec<f64>>)> {
    let data: TrainingData = load_training_data(&args.data)
        .with_context(|| format!("Failed to load training data from {}", args.data.display()))?;

    let params = data.kernel.unwrap_or_else(|| args.kernel.parameters());
    let kernel = params.build().context("Invalid kernel parameters")?;
    log::info!("using {:?}", params);

    let query = match (&args.query, &data.query) {
        (Some(q), _) => gpmusic::promote_1d(q),
        (None, Some(q)) => q.to_vectors(),
        (None, None) => bail!("No query points: pass --query or add `query` to the data file"),
    };

    let mut gp = GaussianProcessRegressor::new(kernel, args.alpha)
        .context("Invalid alpha")?
        .with_centered_targets(args.center);
    gp.fit(&data.x.to_vectors(), &data.y)
        .context("Failed to fit Gaussian Process")?;

    if let Ok(lml) = gp.log_marginal_likelihood() {
        log::info!("log marginal likelihood: {:.4}", lml);
    }

    Ok((gp, query))
}

fn round_all(values: &mut [f64]) {
    values.iter_mut().for_each(|v| *v = v.round());
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
