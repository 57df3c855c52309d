//! `md2pdf init` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use md2pdf_config::{CONFIG_FILENAME, DEFAULT_CONFIG_TOML};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the init command.
#[derive(Args)]
pub(crate) struct InitArgs {
    /// Config file path.
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    path: PathBuf,

    /// Overwrite an existing config file.
    #[arg(short, long)]
    force: bool,
}

impl InitArgs {
    /// Execute the init command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        if write_config(&self.path, self.force)? {
            output.success(&format!("Config created: {}", self.path.display()));
        } else {
            output.warning(&format!("Config already exists: {}", self.path.display()));
            output.info("Use --force to overwrite");
        }
        Ok(())
    }
}

/// Write the default config. Returns `false` when the file exists and
/// `force` is not set.
fn write_config(path: &Path, force: bool) -> Result<bool, CliError> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TOML)?;
    Ok(true)
}
