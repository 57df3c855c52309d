//! Content fingerprints for diagram sources.

use std::fmt;

use sha2::{Digest, Sha256};

/// Number of hex characters used for artifact filenames.
const SHORT_LEN: usize = 16;

/// Deterministic content hash of a diagram source.
///
/// The source is normalized before hashing: trailing whitespace is removed
/// from every line and from the end of the text. Everything else, including
/// leading indentation and blank lines between statements, is preserved.
///
/// Two sources with the same fingerprint are treated as the same diagram.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a diagram source.
    ///
    /// # Hash Format
    ///
    /// Hex-encoded SHA-256 of the normalized source (64 characters).
    #[must_use]
    pub fn of(source: &str) -> Self {
        let normalized = normalize(source);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Full hex digest.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Shortened digest used in artifact filenames.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Strip trailing whitespace per line and at the end of the text.
fn normalize(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.trim_end().lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_source_same_fingerprint() {
        let a = Fingerprint::of("graph TD\n  A --> B");
        let b = Fingerprint::of("graph TD\n  A --> B");
        let c = Fingerprint::of("graph TD\n  A --> C");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_trailing_whitespace_ignored() {
        let clean = Fingerprint::of("graph TD\n  A --> B");
        let noisy = Fingerprint::of("graph TD   \n  A --> B\t\n\n\n");

        assert_eq!(clean, noisy);
    }

    #[test]
    fn test_leading_whitespace_preserved() {
        let a = Fingerprint::of("graph TD\nA --> B");
        let b = Fingerprint::of("graph TD\n  A --> B");

        assert_ne!(a, b);
    }

    #[test]
    fn test_crlf_line_endings_match_lf() {
        let lf = Fingerprint::of("graph TD\nA --> B\n");
        let crlf = Fingerprint::of("graph TD\r\nA --> B\r\n");

        assert_eq!(lf, crlf);
    }

    #[test]
    fn test_hex_format() {
        let fingerprint = Fingerprint::of("sequenceDiagram\n  A->>B: hi");

        assert_eq!(fingerprint.as_hex().len(), 64);
        assert!(fingerprint.as_hex().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fingerprint.short().len(), SHORT_LEN);
        assert!(fingerprint.as_hex().starts_with(fingerprint.short()));
        assert_eq!(fingerprint.to_string(), fingerprint.short());
    }
}
