use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facegen::{augment::NoiseSeed, DatasetRunner, GeneratorConfig};

#[derive(Parser)]
#[command(name = "facegen")]
#[command(about = "Expand per-person face photos into fixed-size augmented training sets")]
struct Cli {
    /// JSON configuration file; command-line flags take precedence
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Overrides {
    /// Base directory with one subdirectory per person
    #[arg(long, global = true)]
    dataset_path: Option<PathBuf>,

    /// Images generated per person
    #[arg(short, long, global = true)]
    quota: Option<usize>,

    /// Only process these persons (repeatable)
    #[arg(short, long = "person", global = true)]
    persons: Vec<String>,

    /// Exclude earlier `<person>_NNNN` output from the source pool
    #[arg(long, global = true)]
    exclude_generated: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate augmented images for every person
    Generate {
        /// Images between two progress messages
        #[arg(long)]
        progress_interval: Option<usize>,

        /// Seed the noise variants for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// JPEG quality of written images (1-100)
        #[arg(long)]
        jpeg_quality: Option<u8>,
    },

    /// List persons and source pools without writing anything
    List,
}

fn load_config(cli: &Cli) -> Result<GeneratorConfig> {
    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => GeneratorConfig::default(),
    };

    // Apply command line overrides
    if let Some(dataset_path) = &cli.overrides.dataset_path {
        config.dataset_path.clone_from(dataset_path);
    }
    if let Some(quota) = cli.overrides.quota {
        config.quota = quota;
    }
    if cli.overrides.exclude_generated {
        config.include_generated = false;
    }
    if let Commands::Generate {
        progress_interval,
        seed,
        jpeg_quality,
    } = &cli.command
    {
        if let Some(interval) = progress_interval {
            config.progress_interval = *interval;
        }
        if let Some(seed) = seed {
            config.noise_seed = NoiseSeed::Seeded(*seed);
        }
        if let Some(quality) = jpeg_quality {
            config.jpeg_quality = *quality;
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_generate(runner: &DatasetRunner, persons: &[String]) -> Result<()> {
    let summary = runner
        .run(persons)
        .context("Failed to enumerate person directories")?;

    if summary.persons() == 0 {
        println!(
            "No person folders found in {}",
            runner.config().dataset_path.display()
        );
        return Ok(());
    }

    println!("{summary}");
    if !summary.is_complete() {
        anyhow::bail!(
            "{} of {} persons were not fully processed",
            summary.persons() - summary.succeeded(),
            summary.persons()
        );
    }
    Ok(())
}

fn run_list(runner: &DatasetRunner, persons: &[String]) -> Result<()> {
    let plans = runner
        .plan(persons)
        .context("Failed to enumerate person directories")?;

    println!(
        "{} persons in {} (quota {})",
        plans.len(),
        runner.config().dataset_path.display(),
        runner.config().quota
    );
    for plan in plans {
        match plan.sources {
            Ok(sources) => println!(
                "  {}: {} source images, {} batches",
                plan.person, sources, plan.planned_batches
            ),
            Err(e) => println!("  {}: unusable ({e})", plan.person),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let runner = DatasetRunner::new(config);

    match cli.command {
        Commands::Generate { .. } => run_generate(&runner, &cli.overrides.persons),
        Commands::List => run_list(&runner, &cli.overrides.persons),
    }
}
