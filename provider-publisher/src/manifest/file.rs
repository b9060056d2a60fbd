//! Whole-manifest parsing and the signature companion file.

use std::io::BufRead;

use bytes::Bytes;

use super::entry::{parse_line, ChecksumEntry};
use super::error::{ManifestError, ManifestResult};
use super::ARCHIVE_SUFFIX;

/// A parsed checksum manifest.
///
/// `raw_bytes` holds the manifest exactly as it will be re-uploaded: every
/// line from the source, each terminated by a single `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumManifest {
    filename: String,
    raw_bytes: Bytes,
    entries: Vec<ChecksumEntry>,
}

impl ChecksumManifest {
    /// Asset filename of the manifest.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Newline-normalized manifest content.
    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw_bytes
    }

    /// Parsed archive entries, in manifest order.
    pub fn entries(&self) -> &[ChecksumEntry] {
        &self.entries
    }

    /// Find the entry for an archive filename (exact match, first wins).
    pub fn entry_by_filename(&self, filename: &str) -> Option<&ChecksumEntry> {
        self.entries.iter().find(|e| e.filename() == filename)
    }
}

/// Detached signature over the checksum manifest. Never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureFile {
    filename: String,
    raw_bytes: Bytes,
}

impl SignatureFile {
    /// Create a signature file from its downloaded bytes.
    pub fn new(filename: impl Into<String>, raw_bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            raw_bytes: raw_bytes.into(),
        }
    }

    /// Asset filename of the signature.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Signature content, byte for byte as downloaded.
    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw_bytes
    }
}

/// Parse a checksum manifest from a line-oriented reader.
///
/// Lines ending in `.zip` are parsed into entries; every other line (blank
/// lines and the source archive included) is kept in the raw bytes only.
/// `\r\n` terminators are normalized to `\n`, and a missing final newline
/// is added.
///
/// # Errors
///
/// Fails on the first malformed archive line or unreadable input. No
/// partially parsed manifest is ever returned.
pub fn parse_manifest<R: BufRead>(
    filename: impl Into<String>,
    reader: R,
) -> ManifestResult<ChecksumManifest> {
    let filename = filename.into();
    let mut raw = Vec::new();
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|source| ManifestError::Read {
            filename: filename.clone(),
            source,
        })?;

        if line.trim_end().ends_with(ARCHIVE_SUFFIX) {
            entries.push(parse_line(&line)?);
        }

        raw.extend_from_slice(line.as_bytes());
        raw.push(b'\n');
    }

    Ok(ChecksumManifest {
        filename,
        raw_bytes: Bytes::from(raw),
        entries,
    })
}
