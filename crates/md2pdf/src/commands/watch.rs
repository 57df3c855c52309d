//! `md2pdf watch` command implementation.

use std::path::PathBuf;

use clap::Args;
use md2pdf_config::CliSettings;
use md2pdf_pipeline::Pipeline;
use md2pdf_pool::Progress;

use super::{GlobalArgs, cancel_on_ctrl_c};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the watch command.
#[derive(Args)]
pub(crate) struct WatchArgs {
    /// Directory to watch.
    directory: PathBuf,

    /// Output directory (overrides config).
    #[arg(short, long, env = "MD2PDF_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Quiet period in milliseconds before converting (overrides config).
    #[arg(short, long, value_name = "MS")]
    debounce: Option<u64>,

    /// Only watch files directly inside the directory.
    #[arg(long)]
    no_recursive: bool,
}

impl WatchArgs {
    /// Execute the watch command. Runs until Ctrl-C.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();

        if !self.directory.is_dir() {
            return Err(CliError::Validation(format!(
                "not a directory: {}",
                self.directory.display()
            )));
        }

        let config = global.load_config(CliSettings {
            output_dir: self.output,
            debounce_ms: self.debounce,
            recursive: self.no_recursive.then_some(false),
            ..CliSettings::default()
        })?;
        let pipeline = Pipeline::from_config(&config)?;

        output.highlight(&format!("Watching: {}", self.directory.display()));
        output.info(&format!("Output: {}", config.output.output_dir.display()));
        output.info(&format!(
            "Debounce: {}ms, recursive: {}",
            config.watch.debounce_ms, config.watch.recursive
        ));
        output.warning("Press Ctrl+C to stop");

        let cancel = cancel_on_ctrl_c();
        let progress = |p: Progress<'_>| output.progress(p);
        pipeline
            .watch(&[self.directory], &progress, &cancel, |trigger, result| {
                output.info(&format!(
                    "{} change(s): {} converted, {} failed",
                    trigger.len(),
                    result.success_count(),
                    result.failure_count()
                ));
            })
            .await?;

        output.success("Stopped watching");
        Ok(())
    }
}
