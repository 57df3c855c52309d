//! PDF compilation via `pandoc`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use md2pdf_config::{FontConfig, PandocConfig};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::{DocumentCompiler, DocumentMetadata, ToolError, process};

const TOOL: &str = "pandoc";

/// Document compiler backed by pandoc and a LaTeX engine.
#[derive(Debug, Clone)]
pub struct PandocCompiler {
    program: PathBuf,
    pandoc: PandocConfig,
    font: FontConfig,
}

impl PandocCompiler {
    #[must_use]
    pub fn new(pandoc: PandocConfig, font: FontConfig) -> Self {
        Self {
            program: PathBuf::from(TOOL),
            pandoc,
            font,
        }
    }

    /// Use a specific `pandoc` executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, input: &Path, output: &Path, metadata: &DocumentMetadata) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            input.into(),
            "-o".into(),
            output.into(),
            "--standalone".into(),
            format!("--pdf-engine={}", self.pandoc.pdf_engine).into(),
            format!("--highlight-style={}", self.pandoc.highlight_style).into(),
        ];

        if let Some(template) = &self.pandoc.template {
            let mut arg = OsString::from("--template=");
            arg.push(template);
            args.push(arg);
        }
        if self.pandoc.toc {
            args.push("--toc".into());
            args.push(format!("--toc-depth={}", self.pandoc.toc_depth).into());
        }

        let fonts = [
            ("CJKmainfont", &self.font.cjk_primary),
            ("mainfont", &self.font.latin_primary),
            ("monofont", &self.font.monospace),
            ("geometry:margin", &self.font.geometry_margin),
        ];
        for (key, value) in fonts {
            if !value.is_empty() {
                args.push("-V".into());
                args.push(format!("{key}={value}").into());
            }
        }
        for (key, value) in &self.pandoc.extra_vars {
            args.push("-V".into());
            args.push(format!("{key}={value}").into());
        }

        args.push("-M".into());
        args.push(format!("title={}", metadata.title).into());
        for (key, value) in &self.pandoc.metadata {
            args.push("-M".into());
            args.push(format!("{key}={value}").into());
        }

        args
    }
}

impl DocumentCompiler for PandocCompiler {
    async fn compile(
        &self,
        input: &Path,
        output: &Path,
        metadata: &DocumentMetadata,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        let mut command = Command::new(&self.program);
        command.args(self.args(input, output, metadata));
        if input.is_absolute() && output.is_absolute() {
            // Relative resources in the document resolve against its directory
            if let Some(dir) = input.parent() {
                command.current_dir(dir);
            }
        }

        let limit = Some(self.pandoc.timeout()).filter(|t| !t.is_zero());
        let result = process::run(TOOL, command, limit, cancel).await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(ToolError::MissingOutput {
                tool: TOOL,
                path: output.to_path_buf(),
            });
        }
        if !result.stderr.is_empty() {
            tracing::debug!(input = %input.display(), stderr = %result.stderr, "pandoc warnings");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use md2pdf_config::PdfEngine;

    use super::*;
    use pretty_assertions::assert_eq;

    fn args_of(compiler: &PandocCompiler) -> Vec<String> {
        let meta = DocumentMetadata {
            title: "My Doc".to_owned(),
        };
        compiler
            .args(Path::new("/in/doc.md"), Path::new("/out/doc.pdf"), &meta)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_default_args() {
        let compiler = PandocCompiler::new(PandocConfig::default(), FontConfig::default());

        assert_eq!(
            args_of(&compiler),
            [
                "/in/doc.md",
                "-o",
                "/out/doc.pdf",
                "--standalone",
                "--pdf-engine=tectonic",
                "--highlight-style=tango",
                "-V",
                "CJKmainfont=PingFang SC",
                "-V",
                "mainfont=Times New Roman",
                "-V",
                "monofont=Menlo",
                "-V",
                "geometry:margin=2.5cm",
                "-M",
                "title=My Doc",
            ]
        );
    }

    #[test]
    fn test_optional_args() {
        let pandoc = PandocConfig {
            pdf_engine: PdfEngine::Xelatex,
            template: Some(PathBuf::from("/tpl/report.tex")),
            toc: true,
            toc_depth: 2,
            extra_vars: BTreeMap::from([("papersize".to_owned(), "a4".to_owned())]),
            metadata: BTreeMap::from([("author".to_owned(), "Docs Team".to_owned())]),
            ..PandocConfig::default()
        };
        let font = FontConfig {
            cjk_primary: String::new(),
            ..FontConfig::default()
        };

        let args = args_of(&PandocCompiler::new(pandoc, font));

        assert!(args.contains(&"--pdf-engine=xelatex".to_owned()));
        assert!(args.contains(&"--template=/tpl/report.tex".to_owned()));
        assert!(args.contains(&"--toc".to_owned()));
        assert!(args.contains(&"--toc-depth=2".to_owned()));
        assert!(args.contains(&"papersize=a4".to_owned()));
        assert!(args.contains(&"author=Docs Team".to_owned()));
        assert!(!args.iter().any(|a| a.starts_with("CJKmainfont")));
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("doc.md");
        std::fs::write(&input, "# Doc\n").unwrap();
        let compiler = PandocCompiler::new(PandocConfig::default(), FontConfig::default())
            .with_program("md2pdf-missing-pandoc");

        let err = compiler
            .compile(
                &input,
                &tmp.path().join("doc.pdf"),
                &DocumentMetadata::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::NotFound { tool: "pandoc", .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_output_is_missing_output() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("doc.md");
        std::fs::write(&input, "# Doc\n").unwrap();
        let compiler = PandocCompiler::new(PandocConfig::default(), FontConfig::default())
            .with_program("true");

        let err = compiler
            .compile(
                &input,
                &tmp.path().join("doc.pdf"),
                &DocumentMetadata::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::MissingOutput { tool: "pandoc", .. }));
    }
}
