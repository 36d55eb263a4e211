use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facecheck_runtime::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod replay;

#[derive(Parser)]
#[command(name = "facecheck", version, about = "Face verification liveness tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded landmark trace through a full verification session
    Replay(replay::ReplayArgs),
    /// Check a classifier model file against its SHA-256 digest
    CheckModel {
        path: PathBuf,
        #[arg(long)]
        sha256: String,
    },
    /// Print the effective thresholds as TOML
    Thresholds {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => replay::run(args).await,
        Commands::CheckModel { path, sha256 } => {
            facecheck_models::verify_file_sha256("classifier", &path, &sha256)
                .with_context(|| format!("model check failed for {}", path.display()))?;
            println!("{}: checksum ok", path.display());
            Ok(())
        }
        Commands::Thresholds { config } => {
            let config = load_config(config.as_deref())?;
            config
                .thresholds
                .validate()
                .context("configured thresholds are inconsistent")?;
            print!("{}", toml::to_string_pretty(&config.thresholds)?);
            Ok(())
        }
    }
}

/// Config file if given, otherwise defaults; `FACECHECK_*` variables apply
/// either way.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p).with_context(|| format!("failed to load {}", p.display())),
        None => Ok(Config::from_env()),
    }
}
