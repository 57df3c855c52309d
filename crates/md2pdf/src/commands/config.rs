//! `md2pdf config` command implementation.

use md2pdf_config::CliSettings;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Print where the configuration came from and its effective values.
pub(crate) fn execute(global: &GlobalArgs) -> Result<(), CliError> {
    let output = Output::new();
    let config = global.load_config(CliSettings::default())?;

    match &config.config_path {
        Some(path) => output.highlight(&format!("Config file: {}", path.display())),
        None => output.highlight("Config file: none (using defaults)"),
    }
    output.separator();
    output.info(config.to_toml()?.trim_end());
    Ok(())
}
