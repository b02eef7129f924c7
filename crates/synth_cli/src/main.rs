//! Exactree CLI
//!
//! Fits an exact decision tree to a JSON dataset and writes the model, its
//! fingerprint and the emitted source.

use anyhow::{bail, Context, Result};
use clap::Parser;
use exactree_core::{records_from_json, Record, Regularization, SynthConfig, Synthesizer};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "exactree")]
#[command(author = "Exactree Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Synthesize exact piecewise-linear decision trees as source code", long_about = None)]
struct Args {
    /// Dataset path: {"inputs": [...], "outputs": [...]}
    #[arg(short, long)]
    input: PathBuf,

    /// Name of the emitted function
    #[arg(short, long, default_value = "synthesized")]
    function_name: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum tree depth (overrides config)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Regularization: l1 or none (overrides config)
    #[arg(long)]
    regularization: Option<String>,

    /// Output directory for model, hash and source
    #[arg(short, long, default_value = "exactree-out")]
    output: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Read `{"inputs": [...], "outputs": [...]}` into record sequences.
fn load_dataset(path: &Path) -> Result<(Vec<Record>, Vec<Record>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).context("Dataset is not valid JSON")?;

    let (Some(inputs), Some(outputs)) = (value.get("inputs"), value.get("outputs")) else {
        bail!("Dataset must be an object with `inputs` and `outputs` arrays");
    };
    let inputs = records_from_json(inputs).context("Invalid input records")?;
    let outputs = records_from_json(outputs).context("Invalid output records")?;
    Ok((inputs, outputs))
}

fn resolve_config(args: &Args) -> Result<SynthConfig> {
    let mut config = match &args.config {
        Some(path) => SynthConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SynthConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(name) = &args.regularization {
        config.regularization = name.parse::<Regularization>()?;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Exactree v{}", exactree_core::VERSION);

    let config = resolve_config(&args)?;
    info!(
        "Configuration: max_depth={}, regularization={}",
        config.max_depth, config.regularization
    );

    info!("Loading dataset from: {}", args.input.display());
    let (inputs, outputs) = load_dataset(&args.input)?;
    info!("Loaded {} examples", inputs.len());

    let model = Synthesizer::new(config)
        .fit(&inputs, &outputs)
        .context("Synthesis failed")?;
    info!(
        "Found exact tree: depth {}, {} leaves",
        model.depth(),
        model.root().leaf_count()
    );

    std::fs::create_dir_all(&args.output).context("Failed to create output directory")?;

    let model_path = args.output.join("model.json");
    model.save(&model_path).context("Failed to write model file")?;

    let hash_hex = model.fingerprint().context("Failed to fingerprint model")?;
    let hash_path = args.output.join("model.hash");
    std::fs::write(&hash_path, &hash_hex).context("Failed to write hash file")?;

    let source_path = args.output.join(format!("{}.py", args.function_name));
    std::fs::write(&source_path, model.emit_source(&args.function_name))
        .context("Failed to write source file")?;

    info!("Model: {}", model_path.display());
    info!("Hash: {} ({})", hash_path.display(), hash_hex);
    info!("Source: {}", source_path.display());
    Ok(())
}
