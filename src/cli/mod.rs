// src/cli/mod.rs — CLI definition (clap derive)

pub mod build;
pub mod evaluate;
pub mod generate;
pub mod schema;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "psalm-pairs",
    about = "Generate, score and publish arguments for ordered Psalm pairs",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Whether the selected command asked for quieter logging.
    pub fn quiet(&self) -> bool {
        match &self.command {
            Commands::Generate { quiet, .. } | Commands::Evaluate { quiet, .. } => *quiet,
            _ => false,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate arguments for the next pending pairs
    Generate {
        /// Number of pairs to generate (default from config)
        #[arg(long)]
        limit: Option<usize>,
        /// Model name to use for generation
        #[arg(long)]
        model: Option<String>,
        /// Reduce logging output
        #[arg(long)]
        quiet: bool,
    },
    /// Score arguments that lack an evaluation at the current rubric version
    Evaluate {
        /// Number of arguments to evaluate (default from config)
        #[arg(long)]
        limit: Option<usize>,
        /// Model name to use for evaluation
        #[arg(long)]
        model: Option<String>,
        /// Reduce logging output
        #[arg(long)]
        quiet: bool,
    },
    /// Render the static site from the store
    Build {
        /// Output directory (default from config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show progress counts
    Status,
    /// Reconcile the store schema and print its columns
    Schema,
}
