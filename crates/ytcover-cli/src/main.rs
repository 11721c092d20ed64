use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use ytcover_contracts::config::{CoverGenConfig, Driver};
use ytcover_contracts::events::{GenerationEvent, GenerationLog};
use ytcover_engine::{
    build_from_config, build_primary_from_config, CoverError, CoverProvider, ErrorReporter,
    GenerationRequest, ImageNormalizer,
};

#[derive(Debug, Parser)]
#[command(name = "ytcover", version, about = "Generate 16:9 YouTube covers from gameplay screenshots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Normalize(NormalizeArgs),
    ToPng(ToPngArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    game: String,
    #[arg(long)]
    description: String,
    /// JSON config file; environment variables override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    driver: Option<Driver>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    no_fallback: bool,
}

#[derive(Debug, Parser)]
struct NormalizeArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    filename: Option<String>,
}

#[derive(Debug, Parser)]
struct ToPngArgs {
    #[arg(long)]
    input: PathBuf,
}

fn main() {
    init_tracing();
    match run() {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("ytcover error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Normalize(args) => run_normalize(args),
        Command::ToPng(args) => run_to_png(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let events = args.events.as_ref().map(GenerationLog::new);
    let fallback = (!args.no_fallback)
        .then(|| config.driver.other())
        .filter(|driver| config.api_key_for(*driver).is_some());

    if let Some(log) = events.as_ref() {
        log.record(&GenerationEvent::CoverRequested {
            image_path: args.image.to_string_lossy().to_string(),
            game_name: args.game.clone(),
            driver: config.driver.to_string(),
            fallback: fallback.map(|driver| driver.to_string()),
        })?;
    }

    let provider: Box<dyn CoverProvider> = if args.no_fallback {
        build_primary_from_config(&config)?
    } else {
        build_from_config(&config, Some(failure_reporter(events.clone())))?
    };
    tracing::info!(
        provider = provider.name(),
        image = %args.image.display(),
        "generating cover"
    );

    let started = Instant::now();
    let request = GenerationRequest::new(&args.image, &args.game, &args.description);
    let cover_path = match provider.generate(&request) {
        Ok(path) => path,
        Err(err) => {
            if let Some(log) = events.as_ref() {
                record_failure(log, &err);
            }
            return Err(err).context("cover generation failed");
        }
    };

    if let Some(log) = events.as_ref() {
        log.record(&GenerationEvent::CoverGenerated {
            cover_path: cover_path.to_string_lossy().to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })?;
    }
    println!("{}", cover_path.display());
    Ok(())
}

fn resolve_config(args: &GenerateArgs) -> Result<CoverGenConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => CoverGenConfig::load(path)?,
        None => CoverGenConfig::default(),
    };
    config.apply_overrides_from(|key| std::env::var(key).ok())?;
    if let Some(driver) = args.driver {
        config.driver = driver;
    }
    if let Some(out) = args.out.as_ref() {
        config.output_path = Some(out.clone());
    }
    Ok(config)
}

fn failure_reporter(events: Option<GenerationLog>) -> ErrorReporter {
    Box::new(move |err: &CoverError| {
        tracing::error!(error = %err, "primary cover provider failed");
        if let Some(log) = events.as_ref() {
            record_failure(log, err);
        }
    })
}

fn record_failure(log: &GenerationLog, err: &CoverError) {
    let event = GenerationEvent::ProviderFailed {
        error: err.to_string(),
    };
    if let Err(log_err) = log.record(&event) {
        tracing::warn!(error = %log_err, path = %log.path().display(), "failed to record event");
    }
}

fn run_normalize(args: NormalizeArgs) -> Result<()> {
    let raw = fs::read(&args.input)
        .with_context(|| format!("failed reading {}", args.input.display()))?;
    let path = ImageNormalizer::new().normalize_and_save(&raw, &args.out, args.filename.as_deref())?;
    println!("{}", path.display());
    Ok(())
}

fn run_to_png(args: ToPngArgs) -> Result<()> {
    let path = convert_input(&args.input)?;
    println!("{}", path.display());
    Ok(())
}

fn convert_input(input: &Path) -> Result<PathBuf> {
    ImageNormalizer::new()
        .convert_to_png_with_alpha(input)
        .with_context(|| format!("failed converting {} to png", input.display()))
}
