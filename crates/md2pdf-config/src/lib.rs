//! Configuration management for md2pdf.
//!
//! Parses `md2pdf.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Path values support environment variable and home directory expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - `~/...` - expands to the user's home directory
//!
//! Expanded fields:
//! - `output.output_dir`
//! - `mermaid.cache_dir`
//! - `pandoc.template`
//!
//! Relative paths are resolved against the directory containing the config
//! file (or the current directory when no file was found).

mod expand;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "md2pdf.toml";

/// Commented configuration written by `md2pdf init`.
///
/// Parses to the same values as [`Config::default`].
pub const DEFAULT_CONFIG_TOML: &str = r#"# md2pdf configuration

# Files to convert, matched against file names
input_patterns = ["*.md", "*.markdown"]
# Names to skip, matched against every path component
ignore_patterns = [".*", "_*", "node_modules", "__pycache__"]

[mermaid]
# default | dark | forest | neutral
theme = "default"
# pdf | svg
format = "pdf"
width = 1200
background = "white"
cache_dir = "~/.cache/md2pdf/mermaid"

[pandoc]
# tectonic | xelatex | lualatex
pdf_engine = "tectonic"
highlight_style = "tango"
toc = false
toc_depth = 3
timeout_secs = 300
# template = "templates/report.tex"

[pandoc.extra_vars]
# papersize = "a4"

[pandoc.metadata]
# author = "${USER}"

[font]
cjk_primary = "PingFang SC"
latin_primary = "Times New Roman"
monospace = "Menlo"
geometry_margin = "2.5cm"

[processing]
max_workers = 8
timeout_secs = 300
retry_attempts = 3
retry_backoff = 2.0
retry_render_failures = false

[output]
output_dir = "./output"
naming_pattern = "{stem}.pdf"

[watch]
debounce_ms = 500
recursive = true
"#;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override worker count.
    pub max_workers: Option<usize>,
    /// Override output directory.
    pub output_dir: Option<PathBuf>,
    /// Override PDF engine.
    pub pdf_engine: Option<PdfEngine>,
    /// Override watch debounce.
    pub debounce_ms: Option<u64>,
    /// Override recursive traversal (batch and watch).
    pub recursive: Option<bool>,
    /// Extra ignore patterns, appended to the configured ones.
    pub extra_ignore: Vec<String>,
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub input_patterns: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub mermaid: MermaidConfig,
    pub pandoc: PandocConfig,
    pub font: FontConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
    pub watch: WatchConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_patterns: vec!["*.md".to_owned(), "*.markdown".to_owned()],
            ignore_patterns: [".*", "_*", "node_modules", "__pycache__"]
                .map(str::to_owned)
                .to_vec(),
            mermaid: MermaidConfig::default(),
            pandoc: PandocConfig::default(),
            font: FontConfig::default(),
            processing: ProcessingConfig::default(),
            output: OutputConfig::default(),
            watch: WatchConfig::default(),
            config_path: None,
        }
    }
}

/// Mermaid color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MermaidTheme {
    #[default]
    Default,
    Dark,
    Forest,
    Neutral,
}

impl MermaidTheme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Forest => "forest",
            Self::Neutral => "neutral",
        }
    }
}

/// Diagram artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    #[default]
    Pdf,
    Svg,
}

impl DiagramFormat {
    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Svg => "svg",
        }
    }
}

/// Mermaid rendering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MermaidConfig {
    pub theme: MermaidTheme,
    pub format: DiagramFormat,
    pub width: u32,
    pub background: String,
    /// Directory for rendered diagram artifacts.
    pub cache_dir: PathBuf,
}

impl Default for MermaidConfig {
    fn default() -> Self {
        Self {
            theme: MermaidTheme::Default,
            format: DiagramFormat::Pdf,
            width: 1200,
            background: "white".to_owned(),
            cache_dir: PathBuf::from("~/.cache/md2pdf/mermaid"),
        }
    }
}

impl MermaidConfig {
    /// Digest of the settings that affect rendered output.
    ///
    /// Stored in the cache directory's `VERSION` file.
    #[must_use]
    pub fn render_version(&self) -> String {
        format!(
            "theme={};format={};width={};background={}",
            self.theme.as_str(),
            self.format.extension(),
            self.width,
            self.background
        )
    }
}

/// LaTeX engine used by pandoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfEngine {
    #[default]
    Tectonic,
    Xelatex,
    Lualatex,
}

impl PdfEngine {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tectonic => "tectonic",
            Self::Xelatex => "xelatex",
            Self::Lualatex => "lualatex",
        }
    }
}

impl fmt::Display for PdfEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PdfEngine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tectonic" => Ok(Self::Tectonic),
            "xelatex" => Ok(Self::Xelatex),
            "lualatex" => Ok(Self::Lualatex),
            other => Err(ConfigError::Validation(format!(
                "unknown pdf engine '{other}' (expected tectonic, xelatex or lualatex)"
            ))),
        }
    }
}

/// Pandoc compilation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PandocConfig {
    pub pdf_engine: PdfEngine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    pub highlight_style: String,
    pub toc: bool,
    pub toc_depth: u8,
    /// Compile time limit in seconds.
    pub timeout_secs: u64,
    /// Extra `-V key=value` template variables.
    pub extra_vars: BTreeMap<String, String>,
    /// Extra `-M key=value` metadata.
    pub metadata: BTreeMap<String, String>,
}

impl Default for PandocConfig {
    fn default() -> Self {
        Self {
            pdf_engine: PdfEngine::Tectonic,
            template: None,
            highlight_style: "tango".to_owned(),
            toc: false,
            toc_depth: 3,
            timeout_secs: 300,
            extra_vars: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl PandocConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Font configuration passed to the LaTeX template.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FontConfig {
    pub cjk_primary: String,
    pub latin_primary: String,
    pub monospace: String,
    pub geometry_margin: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            cjk_primary: "PingFang SC".to_owned(),
            latin_primary: "Times New Roman".to_owned(),
            monospace: "Menlo".to_owned(),
            geometry_margin: "2.5cm".to_owned(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub max_workers: usize,
    /// Per-attempt time limit in seconds.
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff: f64,
    /// Also retry diagram render failures.
    pub retry_render_failures: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            timeout_secs: 300,
            retry_attempts: 3,
            retry_backoff: 2.0,
            retry_render_failures: false,
        }
    }
}

impl ProcessingConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Output location configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    /// File name template; `{stem}` is replaced by the input file stem.
    pub naming_pattern: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            naming_pattern: "{stem}.pdf".to_owned(),
        }
    }
}

impl OutputConfig {
    /// Output file path for an input file.
    #[must_use]
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        self.output_dir
            .join(self.naming_pattern.replace("{stem}", &stem))
    }
}

/// Watch mode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    pub debounce_ms: u64,
    pub recursive: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            recursive: true,
        }
    }
}

impl WatchConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`output.output_dir`").
        field: String,
        /// Error message (e.g., "${`OUT_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a numeric field to be at least `min`.
fn require_at_least<T>(value: T, min: T, field: &str) -> Result<(), ConfigError>
where
    T: PartialOrd + fmt::Display,
{
    if value < min {
        return Err(ConfigError::Validation(format!(
            "{field} must be at least {min}, got {value}"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `md2pdf.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The result is
    /// validated last.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or a value is out of range.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()?
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string, resolving paths against `base`.
    pub fn from_toml(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(base);
        Ok(config)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(max_workers) = settings.max_workers {
            self.processing.max_workers = max_workers;
        }
        if let Some(output_dir) = &settings.output_dir {
            self.output.output_dir.clone_from(output_dir);
        }
        if let Some(pdf_engine) = settings.pdf_engine {
            self.pandoc.pdf_engine = pdf_engine;
        }
        if let Some(debounce_ms) = settings.debounce_ms {
            self.watch.debounce_ms = debounce_ms;
        }
        if let Some(recursive) = settings.recursive {
            self.watch.recursive = recursive;
        }
        self.ignore_patterns
            .extend(settings.extra_ignore.iter().cloned());
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_default();
        let mut config = Self::default();
        config.expand_env_vars()?;
        config.resolve_paths(&cwd);
        Ok(config)
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_patterns()?;
        self.validate_mermaid()?;
        self.validate_pandoc()?;
        self.validate_processing()?;
        self.validate_output()?;
        require_at_least(self.watch.debounce_ms, 1, "watch.debounce_ms")?;
        Ok(())
    }

    fn validate_patterns(&self) -> Result<(), ConfigError> {
        if self.input_patterns.is_empty() {
            return Err(ConfigError::Validation(
                "input_patterns cannot be empty".to_owned(),
            ));
        }
        for pattern in &self.input_patterns {
            require_non_empty(pattern, "input_patterns")?;
        }
        for pattern in &self.ignore_patterns {
            require_non_empty(pattern, "ignore_patterns")?;
        }
        Ok(())
    }

    fn validate_mermaid(&self) -> Result<(), ConfigError> {
        require_at_least(self.mermaid.width, 1, "mermaid.width")?;
        require_non_empty(&self.mermaid.background, "mermaid.background")?;
        Ok(())
    }

    fn validate_pandoc(&self) -> Result<(), ConfigError> {
        const MAX_TOC_DEPTH: u8 = 6;

        require_non_empty(&self.pandoc.highlight_style, "pandoc.highlight_style")?;
        require_at_least(self.pandoc.timeout_secs, 1, "pandoc.timeout_secs")?;
        if !(1..=MAX_TOC_DEPTH).contains(&self.pandoc.toc_depth) {
            return Err(ConfigError::Validation(format!(
                "pandoc.toc_depth must be between 1 and {MAX_TOC_DEPTH}"
            )));
        }
        Ok(())
    }

    fn validate_processing(&self) -> Result<(), ConfigError> {
        require_at_least(self.processing.max_workers, 1, "processing.max_workers")?;
        require_at_least(self.processing.timeout_secs, 1, "processing.timeout_secs")?;
        let backoff = self.processing.retry_backoff;
        if !backoff.is_finite() || backoff < 1.0 {
            return Err(ConfigError::Validation(format!(
                "processing.retry_backoff must be a finite number >= 1.0, got {backoff}"
            )));
        }
        Ok(())
    }

    fn validate_output(&self) -> Result<(), ConfigError> {
        if !self.output.naming_pattern.contains("{stem}") {
            return Err(ConfigError::Validation(
                "output.naming_pattern must contain {stem}".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in path values.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.output.output_dir = expand::expand_path(&self.output.output_dir, "output.output_dir")?;
        self.mermaid.cache_dir = expand::expand_path(&self.mermaid.cache_dir, "mermaid.cache_dir")?;
        if let Some(template) = &self.pandoc.template {
            self.pandoc.template = Some(expand::expand_path(template, "pandoc.template")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                config_dir.join(path.strip_prefix(".").unwrap_or(path))
            }
        };

        self.output.output_dir = resolve(&self.output.output_dir);
        self.mermaid.cache_dir = resolve(&self.mermaid.cache_dir);
        self.pandoc.template = self.pandoc.template.as_deref().map(resolve);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(toml: &str) -> Config {
        Config::from_toml(toml, Path::new("/project")).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.input_patterns, vec!["*.md", "*.markdown"]);
        assert_eq!(config.processing.max_workers, 8);
        assert_eq!(config.processing.timeout(), Duration::from_secs(300));
        assert_eq!(config.processing.retry_attempts, 3);
        assert!(!config.processing.retry_render_failures);
        assert_eq!(config.mermaid.format, DiagramFormat::Pdf);
        assert_eq!(config.pandoc.pdf_engine, PdfEngine::Tectonic);
        assert_eq!(config.pandoc.toc_depth, 3);
        assert_eq!(config.watch.debounce(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse("");

        assert_eq!(config.processing.max_workers, 8);
        assert_eq!(config.output.output_dir, PathBuf::from("/project/output"));
    }

    #[test]
    fn test_default_template_matches_defaults() {
        let from_template = parse(DEFAULT_CONFIG_TOML);
        let mut defaults = Config::default();
        defaults.expand_env_vars().unwrap();
        defaults.resolve_paths(Path::new("/project"));

        assert_eq!(from_template.to_toml().unwrap(), defaults.to_toml().unwrap());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"
input_patterns = ["*.md"]
ignore_patterns = ["drafts"]

[mermaid]
theme = "forest"
format = "svg"
width = 800
background = "transparent"
cache_dir = "/var/cache/diagrams"

[pandoc]
pdf_engine = "xelatex"
template = "templates/report.tex"
toc = true
toc_depth = 2

[pandoc.extra_vars]
papersize = "a4"

[processing]
max_workers = 2
retry_attempts = 0
retry_render_failures = true

[output]
output_dir = "build"
naming_pattern = "{stem}-final.pdf"

[watch]
debounce_ms = 250
recursive = false
"#,
        );

        assert_eq!(config.ignore_patterns, vec!["drafts"]);
        assert_eq!(config.mermaid.theme, MermaidTheme::Forest);
        assert_eq!(config.mermaid.format.extension(), "svg");
        assert_eq!(config.mermaid.cache_dir, PathBuf::from("/var/cache/diagrams"));
        assert_eq!(config.pandoc.pdf_engine, PdfEngine::Xelatex);
        assert_eq!(
            config.pandoc.template,
            Some(PathBuf::from("/project/templates/report.tex"))
        );
        assert_eq!(
            config.pandoc.extra_vars.get("papersize").map(String::as_str),
            Some("a4")
        );
        assert_eq!(config.processing.max_workers, 2);
        assert!(config.processing.retry_render_failures);
        assert_eq!(config.output.output_dir, PathBuf::from("/project/build"));
        assert!(!config.watch.recursive);
    }

    #[test]
    fn test_parse_unknown_engine_fails() {
        let result = Config::from_toml("[pandoc]\npdf_engine = \"pdflatex\"", Path::new("/"));

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_output_path_uses_naming_pattern() {
        let output = OutputConfig {
            output_dir: PathBuf::from("/out"),
            naming_pattern: "{stem}-v1.pdf".to_owned(),
        };

        assert_eq!(
            output.output_path(Path::new("/docs/guide.md")),
            PathBuf::from("/out/guide-v1.pdf")
        );
    }

    #[test]
    fn test_render_version_changes_with_settings() {
        let a = MermaidConfig::default();
        let b = MermaidConfig {
            theme: MermaidTheme::Dark,
            ..MermaidConfig::default()
        };
        let c = MermaidConfig {
            cache_dir: PathBuf::from("/elsewhere"),
            ..MermaidConfig::default()
        };

        assert_ne!(a.render_version(), b.render_version());
        assert_eq!(a.render_version(), c.render_version());
    }

    #[test]
    fn test_pdf_engine_from_str() {
        assert_eq!("XeLaTeX".parse::<PdfEngine>().unwrap(), PdfEngine::Xelatex);
        assert!("pdflatex".parse::<PdfEngine>().is_err());
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default();
        let overrides = CliSettings {
            max_workers: Some(2),
            output_dir: Some(PathBuf::from("/custom/out")),
            pdf_engine: Some(PdfEngine::Lualatex),
            debounce_ms: Some(100),
            recursive: Some(false),
            extra_ignore: vec!["vendor".to_owned()],
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.processing.max_workers, 2);
        assert_eq!(config.output.output_dir, PathBuf::from("/custom/out"));
        assert_eq!(config.pandoc.pdf_engine, PdfEngine::Lualatex);
        assert_eq!(config.watch.debounce_ms, 100);
        assert!(!config.watch.recursive);
        assert_eq!(config.ignore_patterns.last().map(String::as_str), Some("vendor"));
        assert_eq!(config.processing.timeout_secs, 300); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default();

        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.processing.max_workers, 8);
        assert_eq!(config.ignore_patterns.len(), 4);
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = Config::default();
        config.processing.max_workers = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("processing.max_workers"));
    }

    #[test]
    fn test_validate_backoff() {
        let mut config = Config::default();
        config.processing.retry_backoff = 0.5;
        assert!(config.validate().is_err());

        config.processing.retry_backoff = f64::NAN;
        assert!(config.validate().is_err());

        config.processing.retry_backoff = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_toc_depth() {
        let mut config = Config::default();
        config.pandoc.toc_depth = 0;
        assert!(config.validate().is_err());

        config.pandoc.toc_depth = 7;
        assert!(config.validate().is_err());

        config.pandoc.toc_depth = 6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_naming_pattern_requires_stem() {
        let mut config = Config::default();
        config.output.naming_pattern = "out.pdf".to_owned();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("{stem}"));
    }

    #[test]
    fn test_validate_zero_values() {
        let mut config = Config::default();
        config.mermaid.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.watch.debounce_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_env_vars_output_dir() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("MD2PDF_TEST_OUT", "/srv/pdf");
        }

        let config = parse("[output]\noutput_dir = \"${MD2PDF_TEST_OUT}/docs\"");

        assert_eq!(config.output.output_dir, PathBuf::from("/srv/pdf/docs"));

        unsafe {
            std::env::remove_var("MD2PDF_TEST_OUT");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("MD2PDF_MISSING_TEMPLATE");
        }

        let result = Config::from_toml(
            "[pandoc]\ntemplate = \"${MD2PDF_MISSING_TEMPLATE}\"",
            Path::new("/project"),
        );

        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("pandoc.template"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/md2pdf.toml")), None);

        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file_resolves_relative_to_config_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[output]\noutput_dir = \"pdf\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.output.output_dir, tmp.path().join("pdf"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_validates_after_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            max_workers: Some(0),
            ..CliSettings::default()
        };

        let result = Config::load(Some(&path), Some(&overrides));

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
