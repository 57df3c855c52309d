//! External dependency probe.

use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::{ToolError, process};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of probing one external tool.
#[derive(Debug)]
pub struct ToolStatus {
    pub tool: &'static str,
    /// First line of `--version` output when the tool ran.
    pub version: Result<String, ToolError>,
}

impl ToolStatus {
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.version.is_ok()
    }
}

/// Run `program --version` and capture the first non-empty output line.
pub async fn probe(tool: &'static str, program: &str) -> ToolStatus {
    let mut command = Command::new(program);
    command.arg("--version");

    let version = process::run(tool, command, Some(PROBE_TIMEOUT), &CancellationToken::new())
        .await
        .map(|output| {
            // Some tools print their version on stderr
            output
                .stdout
                .lines()
                .chain(output.stderr.lines())
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or_default()
                .to_owned()
        });

    ToolStatus { tool, version }
}
