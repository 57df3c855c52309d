//! On-disk diagram artifacts.
//!
//! [`ArtifactStore`] owns a cache directory. Artifacts are named after the
//! fingerprint of their source, so a rendered diagram survives across runs:
//!
//! ```text
//! {root}/
//! +-- VERSION                    # digest of renderer settings
//! +-- diagram_3fa1c2d4e5b6a7f8.pdf
//! +-- .staging-XXXXXX/           # per-render scratch dir, removed on drop
//! ```
//!
//! Renderers write into a [`Staging`] directory first. [`ArtifactStore::publish`]
//! then renames the file into place, so a half-written artifact is never
//! visible under its final name.
//!
//! On open, the `VERSION` file is compared with the current renderer settings.
//! On mismatch only the entries this store owns are removed; unrelated files
//! in a shared directory are left alone.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{CacheError, Fingerprint};

const VERSION_FILE: &str = "VERSION";
const ARTIFACT_PREFIX: &str = "diagram_";
const STAGING_PREFIX: &str = ".staging-";

/// Directory of rendered diagram artifacts keyed by [`Fingerprint`].
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    extension: String,
}

impl ArtifactStore {
    /// Open (or create) the store at `root`.
    ///
    /// `extension` is the artifact file extension without the dot (`pdf`,
    /// `svg`). `version` identifies the renderer settings; artifacts rendered
    /// with different settings are discarded.
    pub fn open(
        root: impl Into<PathBuf>,
        extension: impl Into<String>,
        version: &str,
    ) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;
        validate_version(&root, version)?;
        Ok(Self {
            root,
            extension: extension.into(),
        })
    }

    /// Store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of the artifact for a fingerprint.
    #[must_use]
    pub fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(self.file_name(fingerprint))
    }

    /// Artifact file name (`diagram_<short>.<ext>`).
    #[must_use]
    pub fn file_name(&self, fingerprint: &Fingerprint) -> String {
        format!(
            "{ARTIFACT_PREFIX}{}.{}",
            fingerprint.short(),
            self.extension
        )
    }

    /// Artifact rendered by an earlier run, if present.
    #[must_use]
    pub fn existing(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        let path = self.artifact_path(fingerprint);
        path.is_file().then_some(path)
    }

    /// Create a scratch directory for one render.
    pub fn staging(&self) -> Result<Staging, CacheError> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| CacheError::io(&self.root, e))?;
        Ok(Staging { dir })
    }

    /// Move a staged artifact to its final name.
    ///
    /// Returns the published path. An existing artifact with the same name is
    /// replaced; both have identical content by construction.
    pub fn publish(&self, fingerprint: &Fingerprint, staged: &Path) -> Result<PathBuf, CacheError> {
        if !staged.is_file() {
            return Err(CacheError::MissingArtifact(staged.to_path_buf()));
        }
        let target = self.artifact_path(fingerprint);
        fs::rename(staged, &target).map_err(|e| CacheError::io(&target, e))?;
        tracing::debug!(path = %target.display(), "Published diagram artifact");
        Ok(target)
    }

    /// Remove every artifact and leftover staging directory.
    ///
    /// Returns the number of artifacts removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        remove_owned_entries(&self.root)
    }
}

/// Scratch directory for a single render, deleted when dropped.
#[derive(Debug)]
pub struct Staging {
    dir: tempfile::TempDir,
}

impl Staging {
    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the staging directory.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Compare the stored version with `version`, clearing owned entries on mismatch.
fn validate_version(root: &Path, version: &str) -> Result<(), CacheError> {
    let version_file = root.join(VERSION_FILE);

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored.trim() == version => {
            tracing::debug!(version, "Diagram cache version matches");
            return Ok(());
        }
        Ok(stored) => {
            tracing::info!(
                stored = stored.trim(),
                current = version,
                "Diagram cache version changed, clearing artifacts"
            );
        }
        Err(_) => {
            tracing::debug!(root = %root.display(), "Initializing diagram cache");
        }
    }

    let removed = remove_owned_entries(root)?;
    if removed > 0 {
        tracing::info!(removed, "Removed stale diagram artifacts");
    }
    fs::write(&version_file, version).map_err(|e| CacheError::io(&version_file, e))
}

fn remove_owned_entries(root: &Path) -> Result<usize, CacheError> {
    let entries = fs::read_dir(root).map_err(|e| CacheError::io(root, e))?;
    let mut removed = 0;

    for entry in entries {
        let entry = entry.map_err(|e| CacheError::io(root, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with(ARTIFACT_PREFIX) && path.is_file() {
            fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
            removed += 1;
        } else if name.starts_with(STAGING_PREFIX) && path.is_dir() {
            // Left behind by a crashed run
            if let Err(e) = fs::remove_dir_all(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }

    Ok(removed)
}
