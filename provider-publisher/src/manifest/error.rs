//! Error types for manifest parsing.

use std::io;

use thiserror::Error;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while parsing a checksum manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A line did not match `<digest> <name>_<version>_<os>_<arch>.zip`.
    #[error("malformed manifest line: {line:?}")]
    MalformedLine { line: String },

    /// The manifest body could not be read as UTF-8 text.
    #[error("failed to read manifest {filename}: {source}")]
    Read {
        filename: String,
        #[source]
        source: io::Error,
    },
}
