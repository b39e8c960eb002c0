use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::manifest::DEFAULT_LOCAL_NAME;

#[derive(Debug, Clone, Parser)]
#[command(name = "api-scanner")]
#[command(
    about = "Suggest api and implementation dependencies by scanning compiled Java classes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Dependency graph manifest (JSON).
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Worker threads used for scanning.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Scan the manifest's artifacts and classify its first-level dependencies.
    Classify {
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Do not count method return types as part of the visible surface.
        #[arg(long)]
        ignore_return_types: bool,

        /// Type name prefix treated as platform-supplied (repeatable, default `java`).
        #[arg(long = "platform-prefix", value_name = "PREFIX")]
        platform_prefixes: Vec<String>,
    },
    /// Print the declared and consumed types of a single artifact.
    Inspect {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        #[arg(long, default_value = DEFAULT_LOCAL_NAME)]
        name: String,

        #[arg(long)]
        ignore_return_types: bool,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
