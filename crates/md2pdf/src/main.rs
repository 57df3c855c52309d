//! md2pdf CLI - Batch Markdown to PDF converter.
//!
//! Provides commands for:
//! - `convert`: Convert a single Markdown file
//! - `batch`: Convert every matching file under a directory or glob
//! - `watch`: Reconvert files as they change
//! - `init`: Write a default `md2pdf.toml`
//! - `config`: Show the effective configuration
//! - `doctor`: Check external dependencies

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BatchArgs, ConvertArgs, GlobalArgs, InitArgs, WatchArgs};
use error::CliError;
use output::Output;

/// md2pdf - Batch Markdown to PDF converter.
#[derive(Parser)]
#[command(name = "md2pdf", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a Markdown file to PDF.
    Convert(ConvertArgs),
    /// Convert multiple Markdown files to PDF.
    Batch(BatchArgs),
    /// Watch a directory and convert files as they change.
    Watch(WatchArgs),
    /// Write a default configuration file.
    Init(InitArgs),
    /// Show the effective configuration.
    Config,
    /// Check external dependencies.
    Doctor,
}

impl Commands {
    async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        match self {
            Self::Convert(args) => args.execute(global).await,
            Self::Batch(args) => args.execute(global).await,
            Self::Watch(args) => args.execute(global).await,
            Self::Init(args) => args.execute(),
            Self::Config => commands::config::execute(global),
            Self::Doctor => commands::doctor::execute(global).await,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Runtime::new()
        .map_err(CliError::from)
        .and_then(|rt| rt.block_on(cli.command.execute(&cli.global)));

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
