//! Mermaid rendering via the `mmdc` CLI.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use md2pdf_config::{DiagramFormat, MermaidConfig, MermaidTheme};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::{DiagramRenderer, ToolError, process};

const TOOL: &str = "mmdc";

/// Diagram renderer backed by `@mermaid-js/mermaid-cli`.
#[derive(Debug, Clone)]
pub struct MermaidRenderer {
    program: PathBuf,
    config: MermaidConfig,
}

impl MermaidRenderer {
    /// Create a renderer using `mmdc` from `PATH`.
    #[must_use]
    pub fn new(config: MermaidConfig) -> Self {
        Self {
            program: PathBuf::from(TOOL),
            config,
        }
    }

    /// Use a specific `mmdc` executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-o".into(),
            output.into(),
            "-w".into(),
            self.config.width.to_string().into(),
            "-b".into(),
            self.config.background.clone().into(),
        ];
        if self.config.theme != MermaidTheme::Default {
            args.push("-t".into());
            args.push(self.config.theme.as_str().into());
        }
        if self.config.format == DiagramFormat::Pdf {
            args.push("--pdfFit".into());
        }
        args
    }
}

impl DiagramRenderer for MermaidRenderer {
    fn format(&self) -> DiagramFormat {
        self.config.format
    }

    async fn render(
        &self,
        source: &str,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ToolError> {
        let input = work_dir.join("diagram.mmd");
        let output = work_dir.join(format!("diagram.{}", self.config.format.extension()));

        tokio::fs::write(&input, source)
            .await
            .map_err(|e| ToolError::io(&input, e))?;

        let mut command = Command::new(&self.program);
        command.args(self.args(&input, &output)).current_dir(work_dir);
        process::run(TOOL, command, None, cancel).await?;

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(ToolError::MissingOutput {
                tool: TOOL,
                path: output,
            });
        }
        tracing::debug!(output = %output.display(), "Rendered diagram");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args_of(config: MermaidConfig) -> Vec<String> {
        MermaidRenderer::new(config)
            .args(Path::new("in.mmd"), Path::new("out.pdf"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_default_args() {
        assert_eq!(
            args_of(MermaidConfig::default()),
            ["-i", "in.mmd", "-o", "out.pdf", "-w", "1200", "-b", "white", "--pdfFit"]
        );
    }

    #[test]
    fn test_theme_and_svg_args() {
        let config = MermaidConfig {
            theme: MermaidTheme::Dark,
            format: DiagramFormat::Svg,
            width: 800,
            background: "transparent".to_owned(),
            ..MermaidConfig::default()
        };

        assert_eq!(
            args_of(config),
            ["-i", "in.mmd", "-o", "out.pdf", "-w", "800", "-b", "transparent", "-t", "dark"]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = MermaidRenderer::new(MermaidConfig::default())
            .with_program("md2pdf-missing-mmdc");

        let err = renderer
            .render("graph TD\n  A --> B\n", tmp.path(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::NotFound { tool: "mmdc", .. }));
        assert!(tmp.path().join("diagram.mmd").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_renders_with_fake_tool() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let fake = tmp.path().join("fake-mmdc");
        // Writes its input to the path following -o
        std::fs::write(
            &fake,
            "#!/bin/sh\nwhile [ $# -gt 0 ]; do\n  case \"$1\" in\n    -i) in=\"$2\"; shift;;\n    -o) out=\"$2\"; shift;;\n  esac\n  shift\ndone\ncp \"$in\" \"$out\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
        let work = tmp.path().join("work");
        std::fs::create_dir(&work).unwrap();

        let renderer = MermaidRenderer::new(MermaidConfig::default()).with_program(&fake);
        let output = renderer
            .render("graph LR\n", &work, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output, work.join("diagram.pdf"));
        assert_eq!(std::fs::read_to_string(output).unwrap(), "graph LR\n");
    }
}
