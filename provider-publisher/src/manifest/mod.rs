//! Checksum manifest parsing.
//!
//! A release ships a `SHA256SUMS` manifest listing one line per binary
//! archive, plus a detached signature over that manifest:
//!
//! ```text
//! <sha256-hex>  <name>_<version>_<os>_<arch>.zip
//! ```
//!
//! The manifest is parsed all-or-nothing: one malformed archive line fails
//! the whole document. The raw bytes are kept (newline-normalized) because
//! the registry verifies its signature against exactly what is re-uploaded.
//!
//! # Example
//!
//! ```
//! use provider_publisher::manifest::parse_line;
//!
//! let line = format!("{}  acme_1.2.0_linux_amd64.zip", "ab".repeat(32));
//! let entry = parse_line(&line).unwrap();
//! assert_eq!(entry.version(), "1.2.0");
//! assert_eq!(entry.os(), "linux");
//! assert_eq!(entry.arch(), "amd64");
//! ```

mod entry;
mod error;
mod file;

pub use entry::{parse_line, ChecksumEntry};
pub use error::{ManifestError, ManifestResult};
pub use file::{parse_manifest, ChecksumManifest, SignatureFile};

/// Suffix of the checksum manifest asset.
pub const MANIFEST_SUFFIX: &str = "SHA256SUMS";

/// Suffix of the detached manifest signature asset.
pub const SIGNATURE_SUFFIX: &str = "SHA256SUMS.sig";

/// Suffix shared by every publishable binary archive.
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Name prefix of the host-generated source archives, which are never published.
pub const SOURCE_ARCHIVE_PREFIX: &str = "Source Code";
