//! Command-line interface definitions.
//!
//! Defines all CLI arguments using clap. Running `folia` performs one
//! full build pass: collect, render stale pages, emit aggregates.

use clap::Parser;
use std::path::PathBuf;

/// Folia static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Project root directory (defaults to the current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to the project root
    #[arg(short = 'C', long, default_value = "folia.toml")]
    pub config: PathBuf,

    /// Output directory path (overrides [build.output])
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
