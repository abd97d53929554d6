//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Gantry - a build graph registry and module composition system for C/C++
#[derive(Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the demo project's executables
    Build(BuildArgs),

    /// Build and stage the demo project's distributable package
    Package(PackageArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Project root containing the demo sources
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    pub out: PathBuf,

    /// Build configuration (debug, release)
    #[arg(short, long, default_value = "debug")]
    pub config: String,

    /// Target platform (host, linux, macos, windows, raspi)
    #[arg(short, long, default_value = "host")]
    pub platform: String,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct PackageArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Directory to stage the package into (defaults to <out>/<config>/package)
    #[arg(long)]
    pub package_dir: Option<PathBuf>,
}
