//! `md2pdf convert` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use md2pdf_config::{CliSettings, Config, OutputConfig};
use md2pdf_pipeline::Pipeline;
use md2pdf_pool::{JobOutcome, NoProgress};

use super::{GlobalArgs, cancel_on_ctrl_c, finish_batch};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the convert command.
#[derive(Args)]
pub(crate) struct ConvertArgs {
    /// Input Markdown file.
    input: PathBuf,

    /// Output PDF file (default: next to the input, with a .pdf extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pandoc template (overrides config).
    #[arg(short, long)]
    template: Option<PathBuf>,
}

impl ConvertArgs {
    /// Execute the convert command.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();

        if !self.input.is_file() {
            return Err(CliError::Validation(format!(
                "input is not a file: {}",
                self.input.display()
            )));
        }

        let mut config = global.load_config(CliSettings::default())?;
        if let Some(template) = self.template {
            config.pandoc.template = Some(template);
        }
        config.output = single_output(&self.input, self.output.as_deref());

        let pipeline = Pipeline::from_config(&config)?;
        output.highlight(&format!("Converting: {}", self.input.display()));

        let cancel = cancel_on_ctrl_c();
        let result = pipeline
            .run_files(vec![self.input.clone()], &NoProgress, &cancel)
            .await;

        match result.outcomes.first() {
            Some((_, JobOutcome::Success(pdf))) => {
                output.success(&format!("PDF generated: {}", pdf.display()));
                Ok(())
            }
            _ => finish_batch(&output, &result),
        }
    }
}

/// Output settings that place exactly one PDF at `explicit` or beside `input`.
fn single_output(input: &Path, explicit: Option<&Path>) -> OutputConfig {
    let target = explicit.map_or_else(|| input.with_extension("pdf"), Path::to_path_buf);
    let output_dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let naming_pattern = target
        .file_name()
        .map_or_else(|| Config::default().output.naming_pattern, |n| n.to_string_lossy().into_owned());

    OutputConfig {
        output_dir,
        naming_pattern,
    }
}
