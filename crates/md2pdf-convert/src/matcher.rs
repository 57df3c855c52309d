//! Input file discovery.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use ignore::WalkBuilder;

use crate::ToolError;

/// Finds the Markdown files a batch should convert.
///
/// Input patterns are matched against file names. Ignore patterns are
/// matched against every path component below the walked root, so an
/// ignored directory hides its whole subtree.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    input: Vec<Pattern>,
    ignore: Arc<[Pattern]>,
    recursive: bool,
}

impl FileMatcher {
    pub fn new(
        input_patterns: &[String],
        ignore_patterns: &[String],
        recursive: bool,
    ) -> Result<Self, ToolError> {
        Ok(Self {
            input: compile(input_patterns)?,
            ignore: compile(ignore_patterns)?.into(),
            recursive,
        })
    }

    /// Whether a file name matches one of the input patterns.
    #[must_use]
    pub fn is_input(&self, path: &Path) -> bool {
        path.file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|name| self.input.iter().any(|p| p.matches(&name)))
    }

    /// Whether `path` is an input file that is not ignored below `root`.
    #[must_use]
    pub fn accepts(&self, root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        if !self.recursive && relative.components().count() > 1 {
            return false;
        }
        self.is_input(path) && !is_ignored(&self.ignore, relative)
    }

    /// Resolve `paths` into a sorted, deduplicated list of files.
    ///
    /// A file given explicitly is taken as-is, whatever its name. A directory
    /// is walked, recursively or one level deep.
    pub fn collect(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, ToolError> {
        let mut files = Vec::new();
        for path in paths {
            let meta = std::fs::metadata(path).map_err(|e| ToolError::io(path, e))?;
            if meta.is_dir() {
                self.walk(path, &mut files);
            } else {
                files.push(path.clone());
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn walk(&self, root: &Path, files: &mut Vec<PathBuf>) {
        let ignore = Arc::clone(&self.ignore);
        let base = root.to_path_buf();

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .max_depth(if self.recursive { None } else { Some(1) })
            .filter_entry(move |entry| {
                entry
                    .path()
                    .strip_prefix(&base)
                    .is_ok_and(|relative| !is_ignored(&ignore, relative))
            })
            .build();

        for result in walker {
            match result {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|t| t.is_file()) && self.is_input(entry.path())
                    {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => tracing::warn!(root = %root.display(), error = %e, "Skipping unreadable entry"),
            }
        }
    }
}

/// Expand a command-line input that may be a glob (`docs/*.md`).
///
/// Inputs without glob metacharacters are returned unchanged, so a missing
/// plain path surfaces later as an I/O error rather than an empty batch.
pub fn expand_input(input: &str) -> Result<Vec<PathBuf>, ToolError> {
    if !input.contains(['*', '?', '[']) {
        return Ok(vec![PathBuf::from(input)]);
    }
    let paths = glob::glob(input).map_err(|source| ToolError::Pattern {
        pattern: input.to_owned(),
        source,
    })?;

    let mut matched = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => matched.push(path),
            Err(e) => tracing::warn!(pattern = input, error = %e, "Skipping unreadable glob match"),
        }
    }
    Ok(matched)
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, ToolError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| ToolError::Pattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

fn is_ignored(ignore: &[Pattern], relative: &Path) -> bool {
    relative.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        ignore.iter().any(|p| p.matches(&name))
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use pretty_assertions::assert_eq;

    fn defaults(recursive: bool) -> FileMatcher {
        let input = ["*.md".to_owned(), "*.markdown".to_owned()];
        let ignore = [".*", "_*", "node_modules"].map(str::to_owned);
        FileMatcher::new(&input, &ignore, recursive).unwrap()
    }

    fn tree() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for dir in ["guide", ".git", "_drafts", "node_modules/pkg"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        for file in [
            "a.md",
            "b.markdown",
            "notes.txt",
            ".hidden.md",
            "_partial.md",
            "guide/intro.md",
            ".git/HEAD.md",
            "_drafts/wip.md",
            "node_modules/pkg/README.md",
        ] {
            fs::write(root.join(file), "# x\n").unwrap();
        }
        tmp
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_recursive_walk_skips_ignored() {
        let tmp = tree();

        let files = defaults(true).collect(&[tmp.path().to_path_buf()]).unwrap();

        assert_eq!(relative(tmp.path(), &files), ["a.md", "b.markdown", "guide/intro.md"]);
    }

    #[test]
    fn test_flat_walk() {
        let tmp = tree();

        let files = defaults(false).collect(&[tmp.path().to_path_buf()]).unwrap();

        assert_eq!(relative(tmp.path(), &files), ["a.md", "b.markdown"]);
    }

    #[test]
    fn test_explicit_file_taken_as_is() {
        let tmp = tree();
        let notes = tmp.path().join("notes.txt");

        let files = defaults(true)
            .collect(&[notes.clone(), notes.clone(), tmp.path().join("a.md")])
            .unwrap();

        assert_eq!(files, [tmp.path().join("a.md"), notes]);
    }

    #[test]
    fn test_missing_path_is_error() {
        let tmp = tempfile::tempdir().unwrap();

        let err = defaults(true)
            .collect(&[tmp.path().join("missing")])
            .unwrap_err();

        assert!(matches!(err, ToolError::Io { .. }));
    }

    #[test]
    fn test_accepts() {
        let matcher = defaults(true);
        let root = Path::new("/docs");

        assert!(matcher.accepts(root, Path::new("/docs/guide/intro.md")));
        assert!(!matcher.accepts(root, Path::new("/docs/_drafts/wip.md")));
        assert!(!matcher.accepts(root, Path::new("/docs/image.png")));
        assert!(!matcher.accepts(root, Path::new("/elsewhere/a.md")));
        assert!(!defaults(false).accepts(root, Path::new("/docs/guide/intro.md")));
    }

    #[test]
    fn test_expand_input() {
        let tmp = tree();
        let pattern = format!("{}/*.md", tmp.path().display());

        let files = expand_input(&pattern).unwrap();

        // Ignore patterns apply to walked directories, not to shell-style globs
        assert_eq!(
            files,
            [
                tmp.path().join(".hidden.md"),
                tmp.path().join("_partial.md"),
                tmp.path().join("a.md"),
            ]
        );
        assert_eq!(expand_input("plain/doc.md").unwrap(), [PathBuf::from("plain/doc.md")]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = FileMatcher::new(&["[".to_owned()], &[], true).unwrap_err();

        assert!(matches!(err, ToolError::Pattern { .. }));
    }
}
