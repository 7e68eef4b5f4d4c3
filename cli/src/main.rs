//! Archgen CLI - merge layered architecture configuration

use archgen_config::{ArchgenConfig, LogFormat, LoggingConfig, OutputFormat};
use archgen_core::{validate_tree, HierarchicalMerger, LayerKind, ResolutionStrategy};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod layers;
mod report;

#[derive(Parser)]
#[command(name = "archgen")]
#[command(about = "Merge and validate layered architecture configuration")]
#[command(version)]
struct Cli {
    /// Tool configuration file
    #[arg(short, long, global = true, env = "ARCHGEN_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge domain, usecase, repository and interface layers
    Merge(MergeArgs),

    /// Check a configuration file against the business rules
    Validate {
        /// YAML file to check
        file: PathBuf,
    },

    /// Show the effective tool configuration
    Config,
}

#[derive(Args)]
struct MergeArgs {
    /// Directory holding <kind>.yaml layer files
    #[arg(short, long)]
    dir: Option<String>,

    /// Domain layer file
    #[arg(long)]
    domain: Option<String>,

    /// Use case layer file
    #[arg(long)]
    usecase: Option<String>,

    /// Repository layer file
    #[arg(long)]
    repository: Option<String>,

    /// Interface layer file
    #[arg(long)]
    interface: Option<String>,

    /// Conflict resolution strategy
    #[arg(short, long)]
    strategy: Option<String>,

    /// Output format (yaml, json)
    #[arg(short, long)]
    format: Option<String>,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit the full merge report instead of only the merged tree
    #[arg(long)]
    report: bool,

    /// Exit with status 2 when the merged configuration is invalid
    #[arg(long)]
    deny_invalid: bool,
}

enum Outcome {
    Done,
    Invalid,
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => archgen_config::load_from_file(path),
        None => archgen_config::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("{} Failed to load configuration: {}", "Error:".red().bold(), e);
        std::process::exit(1);
    });

    init_logging(&config.logging);

    let result = match cli.command {
        Commands::Merge(args) => cmd_merge(&config, args),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Config => cmd_config(&config).map(|()| Outcome::Done),
    };

    match result {
        Ok(Outcome::Done) => {}
        Ok(Outcome::Invalid) => std::process::exit(2),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = if config.filter.is_empty() {
        config.level.as_str().to_string()
    } else {
        config.filter.clone()
    };

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    match config.format {
        LogFormat::Json => registry.with(fmt.json()).init(),
        LogFormat::Compact => registry.with(fmt.compact()).init(),
        LogFormat::Pretty => registry.with(fmt).init(),
    }
}

fn cmd_merge(config: &ArchgenConfig, args: MergeArgs) -> Result<Outcome, String> {
    let mut layer_config = config.layers.clone();
    if args.dir.is_some() {
        layer_config.dir = args.dir;
    }
    for (kind, path) in [
        (LayerKind::Domain, args.domain),
        (LayerKind::UseCase, args.usecase),
        (LayerKind::Repository, args.repository),
        (LayerKind::Interface, args.interface),
    ] {
        if let Some(path) = path {
            layer_config.set_path(kind, path);
        }
    }
    if layer_config.is_empty() {
        return Err("No layers configured. Pass --dir or a per-layer file".to_string());
    }

    let strategy = match args.strategy {
        Some(name) => name.parse::<ResolutionStrategy>().map_err(|e| e.to_string())?,
        None => config.merge.strategy,
    };
    let format = match args.format {
        Some(name) => name.parse::<OutputFormat>()?,
        None => config.output.format,
    };

    let layers = layers::build_layers(&layer_config);
    tracing::debug!(%strategy, layers = layers.len(), report = args.report, "Starting merge");
    let result = HierarchicalMerger::new(strategy)
        .with_strict_precedence(config.merge.strict_precedence)
        .merge(&layers)
        .map_err(|e| format!("Merge failed: {e}"))?;

    report::print_summary(&result);
    let rendered = report::render(&result, format, args.report, config.output.include_metadata)?;

    let output = args.output.or_else(|| config.output.path.as_ref().map(PathBuf::from));
    match output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
            eprintln!("{} Wrote {}", "✓".green(), path.display().to_string().cyan());
        }
        None => print!("{rendered}"),
    }

    if args.deny_invalid && !result.is_valid() {
        return Ok(Outcome::Invalid);
    }
    Ok(Outcome::Done)
}

fn cmd_validate(file: &Path) -> Result<Outcome, String> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let tree: serde_json::Value = if archgen_core::interpolate::is_blank_document(&content) {
        serde_json::Value::Null
    } else {
        let mut value = serde_yaml::from_str(&content)
            .map_err(|e| format!("Invalid YAML in {}: {e}", file.display()))?;
        archgen_core::interpolate::expand_in_value(&mut value);
        value
    };

    let errors = validate_tree(&tree);
    if errors.is_empty() {
        println!("{} {} is valid", "✓".green(), file.display().to_string().cyan());
        return Ok(Outcome::Done);
    }

    println!("{} {}", file.display().to_string().bold(), "is invalid:".red());
    for error in &errors {
        println!("  - {error}");
    }
    Ok(Outcome::Invalid)
}

fn cmd_config(config: &ArchgenConfig) -> Result<(), String> {
    let rendered =
        serde_yaml::to_string(config).map_err(|e| format!("Failed to render configuration: {e}"))?;
    println!("{}", "Effective configuration:".bold());
    print!("{rendered}");
    Ok(())
}
