//! audiovis CLI - cached waveform/spectrogram images and a transform worker
//!
//! Features:
//! - Render and cache visualization PNGs with ffmpeg
//! - Inspect and clear cache entries
//! - Compute waveform/spectrogram data for a file
//! - JSON-lines transform worker over stdin/stdout

use audiovis_core::ClearTarget;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::OutputFormat;

/// audiovis CLI - audio visualization toolkit
#[derive(Parser)]
#[command(name = "audiovis")]
#[command(version)]
#[command(about = "Waveform and spectrogram generation with an on-disk image cache", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache root directory (overrides config and environment)
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render (or fetch from cache) visualization images for an audio file
    Generate {
        /// Input audio file
        input: PathBuf,

        /// Cache key, usually the path relative to the music library
        /// (defaults to the input file name)
        #[arg(short, long)]
        key: Option<String>,

        /// Which images (waveform, spectrogram, both)
        #[arg(short = 't', long = "type", default_value = "both")]
        kind: ClearTarget,

        /// Re-render even when a cached image exists
        #[arg(long)]
        force: bool,
    },

    /// Print cache entry paths for a key
    Path {
        /// Cache key
        #[arg(short, long)]
        key: String,

        /// Which entries (waveform, spectrogram, both)
        #[arg(short = 't', long = "type", default_value = "both")]
        kind: ClearTarget,
    },

    /// Remove cache entries for a key
    Clear {
        /// Cache key
        #[arg(short, long)]
        key: String,

        /// Which entries (waveform, spectrogram, both)
        #[arg(short = 't', long = "type", default_value = "both")]
        kind: ClearTarget,
    },

    /// Decode an audio file and compute waveform/spectrogram data
    Transform {
        /// Input audio file
        input: PathBuf,

        /// Output width (waveform points / spectrogram columns)
        #[arg(short, long, default_value = "800")]
        width: i64,

        /// Spectrogram height; omit for a waveform only
        #[arg(long)]
        height: Option<i64>,

        /// Resample to this rate before transforming
        #[arg(short, long)]
        sample_rate: Option<u32>,
    },

    /// Serve transform requests as JSON lines on stdin/stdout
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let level = if cli.verbose {
        "audiovis=debug,audiovis_core=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref(), cli.cache_root)?;

    match cli.command {
        Commands::Generate { input, key, kind, force } => {
            commands::generate(&config, &input, key, kind, force, cli.format).await?;
        }
        Commands::Path { key, kind } => {
            commands::path(&config, &key, kind, cli.format)?;
        }
        Commands::Clear { key, kind } => {
            commands::clear(&config, &key, kind, cli.format).await?;
        }
        Commands::Transform { input, width, height, sample_rate } => {
            commands::transform(&config, &input, width, height, sample_rate, cli.format).await?;
        }
        Commands::Worker => {
            commands::worker(&config).await?;
        }
    }

    Ok(())
}
