//! Admission filter applied before events reach the debouncer.

use std::path::{Component, Path, PathBuf};

use glob::Pattern;

use crate::WatchError;

/// Decides which paths under a root may arm the debounce timer.
///
/// A path is rejected when it lies outside the root, when any of its
/// components (relative to the root) matches an ignore pattern, or, in
/// non-recursive mode, when it is not a direct child of the root.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    ignore: Vec<Pattern>,
    recursive: bool,
}

impl PathFilter {
    pub fn new(
        root: impl Into<PathBuf>,
        ignore_patterns: &[String],
        recursive: bool,
    ) -> Result<Self, WatchError> {
        let ignore = ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|source| WatchError::InvalidPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            root: root.into(),
            ignore,
            recursive,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Whether an event for `path` is admitted.
    #[must_use]
    pub fn admits(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        let mut depth = 0;
        for component in relative.components() {
            let Component::Normal(name) = component else {
                return false;
            };
            let name = name.to_string_lossy();
            if self.ignore.iter().any(|pattern| pattern.matches(&name)) {
                return false;
            }
            depth += 1;
        }

        match depth {
            0 => false,
            1 => true,
            _ => self.recursive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(recursive: bool) -> PathFilter {
        let ignore = [".*", "_*", "node_modules", "__pycache__"].map(String::from);
        PathFilter::new("/docs", &ignore, recursive).unwrap()
    }

    #[test]
    fn test_admits_regular_files() {
        let filter = filter(true);

        assert!(filter.admits(Path::new("/docs/guide.md")));
        assert!(filter.admits(Path::new("/docs/api/index.md")));
    }

    #[test]
    fn test_rejects_paths_outside_root() {
        let filter = filter(true);

        assert!(!filter.admits(Path::new("/other/guide.md")));
        assert!(!filter.admits(Path::new("/docs")));
    }

    #[test]
    fn test_rejects_ignored_components() {
        let filter = filter(true);

        assert!(!filter.admits(Path::new("/docs/.guide.md.swp")));
        assert!(!filter.admits(Path::new("/docs/_drafts/post.md")));
        assert!(!filter.admits(Path::new("/docs/node_modules/pkg/readme.md")));
        assert!(!filter.admits(Path::new("/docs/.git/HEAD")));
    }

    #[test]
    fn test_non_recursive_only_direct_children() {
        let filter = filter(false);

        assert!(filter.admits(Path::new("/docs/guide.md")));
        assert!(!filter.admits(Path::new("/docs/api/index.md")));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = PathFilter::new("/docs", &["[".to_owned()], true);

        assert!(matches!(result, Err(WatchError::InvalidPattern { .. })));
    }
}
