//! # draftwise CLI
//!
//! Convert documents between HTML, Markdown and JSON and inspect their
//! structure.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use draftwise_types::FormatKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "draftwise")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "draftwise.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a document to another format
    Convert {
        /// Input file (.html, .md or .json)
        input: PathBuf,

        /// Target format (defaults to export.default_format)
        #[arg(long, value_enum)]
        to: Option<Format>,

        /// Output file, or "-" for stdout (defaults to a timestamped name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Document title written to Markdown front matter
        #[arg(long)]
        title: Option<String>,

        /// Document description written to Markdown front matter
        #[arg(long)]
        description: Option<String>,
    },

    /// Validate a document and print node and mark counts
    Inspect {
        /// Input file (.html, .md or .json)
        input: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Copy, Clone, ValueEnum)]
pub enum Format {
    Html,
    Markdown,
    Json,
}

impl From<Format> for FormatKind {
    fn from(format: Format) -> Self {
        match format {
            Format::Html => FormatKind::Html,
            Format::Markdown => FormatKind::Markdown,
            Format::Json => FormatKind::Json,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Convert {
            input,
            to,
            output,
            title,
            description,
        } => commands::convert(
            &cli.config,
            &input,
            to.map(FormatKind::from),
            output.as_deref(),
            title,
            description,
        ),
        Commands::Inspect { input, json } => commands::inspect(&cli.config, &input, json),
    }
}
