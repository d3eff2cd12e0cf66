//! spread: synthetic RF spectrogram frames and annotation tooling

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "spread")]
#[command(about = "Generate labelled RF spectrogram frames and post-process their annotations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic frames of one class, or collisions of two classes.
    Synth(SynthArgs),

    /// Compress a directory of per-picture annotation files.
    Compress(CompressArgs),

    /// Merge adjacent boxes of one annotation file.
    Merge(MergeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SynthArgs {
    /// Class labels: one for single emissions, two for collisions.
    #[arg(long, num_args = 1..=2, required = true)]
    pub categories: Vec<i32>,

    /// Output directory for pictures, annotation files and the report.
    #[arg(long)]
    pub save_path: PathBuf,

    /// Synthesis configuration (JSON). Built-in defaults when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Class tables (JSON). Built-in tables when omitted.
    #[arg(long)]
    pub tables: Option<PathBuf>,

    /// Directory mold and background paths are relative to.
    #[arg(long)]
    pub mold_root: Option<PathBuf>,

    /// Seed of the random generator.
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

#[derive(Debug, Clone, Args)]
pub struct CompressArgs {
    /// Directory of `<prefix>_<id>.txt` annotation files.
    #[arg(long)]
    pub input: PathBuf,

    /// Directory receiving one annotation file per window.
    #[arg(long)]
    pub output: PathBuf,

    /// Pictures per compressed window.
    #[arg(long, default_value = "12")]
    pub factor: usize,

    /// Picture height in pixels.
    #[arg(long, default_value = "512")]
    pub image_size: usize,

    /// Keep compressed boxes unmerged.
    #[arg(long)]
    pub no_merge: bool,

    /// Output file prefix. Defaults to the prefix of the first input file.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Class tables (JSON). Built-in tables when omitted.
    #[arg(long)]
    pub tables: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct MergeArgs {
    /// Annotation file to merge.
    pub file: PathBuf,

    /// Class tables (JSON). Built-in tables when omitted.
    #[arg(long)]
    pub tables: Option<PathBuf>,

    /// Overwrite the file instead of printing the merged boxes.
    #[arg(long)]
    pub in_place: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth(args) => commands::run_synth(&args),
        Commands::Compress(args) => commands::run_compress(&args),
        Commands::Merge(args) => commands::run_merge(&args),
    }
}
