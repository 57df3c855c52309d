//! Diagram render deduplication for md2pdf.
//!
//! This crate keeps identical diagram sources from being rendered more than
//! once per run, even when several conversion jobs reach the same diagram at
//! the same time. Three pieces form the API:
//!
//! - [`Fingerprint`]: content hash of a normalized diagram source
//! - [`DedupCache`]: in-memory reservation map (`Hit` / `Miss` with FIFO waiters)
//! - [`ArtifactStore`]: on-disk artifacts named by fingerprint, published by rename
//!
//! # Example
//!
//! ```ignore
//! use md2pdf_cache::{DedupCache, Fingerprint, Lookup};
//!
//! let cache = DedupCache::new();
//! let fingerprint = Fingerprint::of("graph TD\n  A --> B\n");
//!
//! match cache.lookup_or_reserve(&fingerprint).await? {
//!     Lookup::Hit(path) => println!("cached at {}", path.display()),
//!     Lookup::Miss(reservation) => {
//!         let path = render_somewhere()?;
//!         reservation.commit(path);
//!     }
//! }
//! ```

mod dedup;
mod fingerprint;
mod store;

pub use dedup::{AbortReason, CacheStats, DedupCache, Lookup, Reservation};
pub use fingerprint::Fingerprint;
pub use store::{ArtifactStore, Staging};

use std::path::PathBuf;

/// Error raised by the on-disk [`ArtifactStore`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Filesystem operation failed.
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A staged artifact was expected but the renderer never wrote it.
    #[error("staged artifact missing: {}", .0.display())]
    MissingArtifact(PathBuf),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
