//! `md2pdf batch` command implementation.

use std::path::PathBuf;

use clap::Args;
use md2pdf_config::CliSettings;
use md2pdf_convert::expand_input;
use md2pdf_pipeline::Pipeline;
use md2pdf_pool::Progress;

use super::{GlobalArgs, cancel_on_ctrl_c, finish_batch};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the batch command.
#[derive(Args)]
pub(crate) struct BatchArgs {
    /// Directory or glob pattern (e.g. 'docs/*.md').
    input: String,

    /// Output directory (overrides config).
    #[arg(short, long, env = "MD2PDF_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Process subdirectories.
    #[arg(short, long)]
    recursive: bool,

    /// Additional name patterns to skip (repeatable).
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// List the files that would be converted without converting them.
    #[arg(long)]
    dry_run: bool,
}

impl BatchArgs {
    /// Execute the batch command.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();

        let config = global.load_config(CliSettings {
            output_dir: self.output,
            recursive: Some(self.recursive),
            extra_ignore: self.ignore,
            ..CliSettings::default()
        })?;
        let pipeline = Pipeline::from_config(&config)?;

        let inputs = expand_input(&self.input)?;
        let files = pipeline.resolve(&inputs)?;
        if files.is_empty() {
            output.warning("No files found matching input");
            return Ok(());
        }
        output.highlight(&format!("Found {} file(s)", files.len()));

        if self.dry_run {
            for file in &files {
                output.info(&format!(
                    "  {} -> {}",
                    file.display(),
                    pipeline.output_path(file).display()
                ));
            }
            return Ok(());
        }

        let cancel = cancel_on_ctrl_c();
        let progress = |p: Progress<'_>| output.progress(p);
        let result = pipeline.run_files(files, &progress, &cancel).await;

        finish_batch(&output, &result)
    }
}
