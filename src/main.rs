use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use ferrite_deep::data::{synthetic, train_test_split};
use ferrite_deep::{Device, Estimator, FitConfig, ModelKind, RunSpec};

/// Train the bundled classifiers on synthetic data.
#[derive(Parser, Debug)]
#[command(name = "ferrite-deep", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize a random two-class dataset, train on 80%, report test AUC
    Train(TrainArgs),

    /// Write a default run configuration as JSON
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Run configuration written by `init-config`; flags below override it
    #[arg(long)]
    config: Option<String>,

    /// Architecture to train when no config is given
    #[arg(long, default_value = "cnn_multi")]
    model: ModelKind,

    /// Samples generated per class
    #[arg(long, default_value_t = 200)]
    samples: usize,

    /// Rows per sample (time steps for recurrent models)
    #[arg(long, default_value_t = 18)]
    labcounts: usize,

    /// Columns per sample (features per step)
    #[arg(long, default_value_t = 36)]
    window: usize,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    lr: Option<f64>,

    /// Seeds data generation, initialisation, shuffling and dropout
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write the trained weights
    #[arg(long)]
    save: Option<String>,
}

#[derive(Args, Debug)]
struct InitConfigArgs {
    #[arg(long)]
    model: ModelKind,

    #[arg(long, default_value_t = 18)]
    labcounts: usize,

    #[arg(long, default_value_t = 36)]
    window: usize,

    #[arg(long)]
    out: String,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ferrite_deep=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match Cli::parse().command {
        Commands::Train(args) => train(args),
        Commands::InitConfig(args) => init_config(args),
    }
}

fn init_config(args: InitConfigArgs) -> Result<()> {
    let spec = RunSpec::new(args.model.as_str(), args.model.default_spec(args.labcounts, args.window));
    spec.save_json(&args.out).with_context(|| format!("writing {}", args.out))?;
    println!("wrote {} config to {}", args.model, args.out);
    Ok(())
}

fn train(args: TrainArgs) -> Result<()> {
    let mut spec = match &args.config {
        Some(path) => RunSpec::load_json(path).with_context(|| format!("reading config {path}"))?,
        None => RunSpec::new(args.model.as_str(), args.model.default_spec(args.labcounts, args.window)),
    };
    if let Some(epochs) = args.epochs {
        spec.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        spec.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        spec.optimizer.set_learning_rate(lr);
    }
    if args.seed.is_some() {
        spec.seed = args.seed;
    }
    let seed = spec.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);

    let device = Device::detect();
    let sample_shape = spec.model.sample_shape(args.labcounts);
    let data = synthetic::random_normal(args.samples, &sample_shape, 2, &mut rng)
        .context("generating synthetic data")?;
    let (train_set, test_set) = train_test_split(&data, 0.2, &mut rng)?;

    let model = spec.model.build(device, &mut rng).context("building model")?;
    let mut clf = Estimator::new(model, device)?;
    clf.compile_with(&spec.optimizer, spec.loss);

    let config = FitConfig::new(spec.epochs, spec.batch_size).with_seed(rng.gen());
    clf.fit(
        &train_set.features,
        &train_set.labels,
        &config,
        Some((&test_set.features, &test_set.labels)),
    )?;
    let (loss, auc) = clf.evaluate(&test_set.features, &test_set.labels, spec.batch_size)?;

    println!("Test loss: {loss:.4}");
    println!("Test AUC:  {auc:.4}");

    if let Some(path) = &args.save {
        clf.save_weights(path).with_context(|| format!("saving weights to {path}"))?;
    }
    Ok(())
}
