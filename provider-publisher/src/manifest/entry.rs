//! Manifest line grammar.
//!
//! Each archive line has the shape:
//!
//! ```text
//! <64 hex digits><whitespace><name>_<major.minor.patch>_<os>_<arch>.zip
//! ```
//!
//! The digest is the first whitespace-delimited token, the filename is the
//! remainder of the line, and version/os/arch come from the `_`-delimited
//! suffix immediately before `.zip`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::error::{ManifestError, ManifestResult};

/// One binary archive listed in a checksum manifest.
///
/// Only produced by [`parse_line`]; the fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChecksumEntry {
    digest: String,
    filename: String,
    version: String,
    os: String,
    arch: String,
}

impl ChecksumEntry {
    /// SHA-256 digest of the archive, as written in the manifest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Archive filename, e.g. `acme_1.2.0_linux_amd64.zip`.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Semantic version segment of the filename.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Operating system segment of the filename.
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Architecture segment of the filename.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Returns true if `other` is the same digest, ignoring hex case.
    pub fn digest_matches(&self, other: &str) -> bool {
        self.digest.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for ChecksumEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.filename, self.os, self.arch)
    }
}

/// Get the manifest line pattern.
///
/// We capture:
/// - Group 1: digest (64 hex digits)
/// - Group 2: filename (everything after the separating whitespace)
/// - Group 3: version (three numeric dot-separated segments)
/// - Group 4: operating system
/// - Group 5: architecture
fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^([0-9A-Fa-f]{64})\s+(\S.*_([0-9]+\.[0-9]+\.[0-9]+)_([^_\s]+)_([^._\s]+)\.zip)$",
        )
        .unwrap()
    })
}

/// Parse one manifest line into a [`ChecksumEntry`].
///
/// Surrounding whitespace (including a stray `\r`) is ignored.
///
/// # Errors
///
/// Returns [`ManifestError::MalformedLine`] carrying the raw line if it does
/// not match the grammar.
pub fn parse_line(line: &str) -> ManifestResult<ChecksumEntry> {
    let malformed = || ManifestError::MalformedLine {
        line: line.to_string(),
    };

    let captures = line_pattern().captures(line.trim()).ok_or_else(malformed)?;
    let group = |i: usize| {
        captures
            .get(i)
            .map(|m| m.as_str().to_string())
            .ok_or_else(malformed)
    };

    Ok(ChecksumEntry {
        digest: group(1)?,
        filename: group(2)?,
        version: group(3)?,
        os: group(4)?,
        arch: group(5)?,
    })
}
