//! `md2pdf doctor` command implementation.

use md2pdf_config::CliSettings;
use md2pdf_convert::{ToolStatus, probe};

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Check that every external tool the configuration needs is installed.
pub(crate) async fn execute(global: &GlobalArgs) -> Result<(), CliError> {
    let output = Output::new();
    let config = global.load_config(CliSettings::default())?;

    output.highlight("Checking dependencies...");
    let engine = config.pandoc.pdf_engine;
    let statuses = [
        probe("pandoc", "pandoc").await,
        probe("mmdc", "mmdc").await,
        probe(engine.as_str(), engine.as_str()).await,
    ];

    for status in &statuses {
        print_status(&output, status);
    }

    let missing: Vec<_> = statuses
        .iter()
        .filter(|s| !s.is_available())
        .map(|s| s.tool)
        .collect();
    if missing.is_empty() {
        output.success("All dependencies installed");
        return Ok(());
    }

    output.info("");
    output.warning("Install with:");
    output.info("  pandoc:  https://pandoc.org/installing.html");
    output.info("  mmdc:    npm install -g @mermaid-js/mermaid-cli");
    output.info("  engine:  https://tectonic-typesetting.github.io or a TeX distribution");
    Err(CliError::MissingDependencies(missing.join(", ")))
}

fn print_status(output: &Output, status: &ToolStatus) {
    match &status.version {
        Ok(version) => output.success(&format!("  ok       {:<10} {version}", status.tool)),
        Err(err) => output.error(&format!("  missing  {:<10} {err}", status.tool)),
    }
}
