//! CLI command implementations.

pub(crate) mod batch;
pub(crate) mod config;
pub(crate) mod convert;
pub(crate) mod doctor;
pub(crate) mod init;
pub(crate) mod watch;

use std::path::PathBuf;

use clap::Args;
use md2pdf_config::{CliSettings, Config, PdfEngine};
use md2pdf_pool::BatchResult;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::output::Output;

pub(crate) use batch::BatchArgs;
pub(crate) use convert::ConvertArgs;
pub(crate) use init::InitArgs;
pub(crate) use watch::WatchArgs;

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (default: auto-discover md2pdf.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers (overrides config).
    #[arg(short, long, global = true, env = "MD2PDF_MAX_WORKERS")]
    pub workers: Option<usize>,

    /// PDF engine used by pandoc (overrides config).
    #[arg(long, global = true, env = "MD2PDF_PDF_ENGINE")]
    pub pdf_engine: Option<PdfEngine>,

    /// Enable verbose output (job lifecycle and timing logs).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Load the configuration with global and command overrides applied.
    pub(crate) fn load_config(&self, settings: CliSettings) -> Result<Config, CliError> {
        let settings = CliSettings {
            max_workers: self.workers.or(settings.max_workers),
            pdf_engine: self.pdf_engine.or(settings.pdf_engine),
            ..settings
        };
        Ok(Config::load(self.config.as_deref(), Some(&settings))?)
    }
}

/// Token cancelled on the first Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}

/// Print the summary and turn failed or cancelled jobs into an error.
pub(crate) fn finish_batch<T>(output: &Output, result: &BatchResult<T>) -> Result<(), CliError> {
    output.summary(result);
    if result.all_succeeded() {
        return Ok(());
    }
    Err(CliError::JobsFailed {
        failed: result.failure_count() + result.cancelled_count(),
        total: result.total(),
    })
}
