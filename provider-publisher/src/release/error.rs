//! Error types for release resolution.

use thiserror::Error;

use crate::deadline::DeadlineError;
use crate::manifest::ManifestError;

/// Errors that can occur while reading a release from the release host.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The HTTP client could not be constructed.
    #[error("failed to create release host client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or the body could not be read.
    #[error("error executing GET {url:?}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The release host answered with a non-success status.
    #[error("GET {url:?} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Release metadata could not be decoded.
    #[error("failed to decode release metadata from {url:?}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// An operation ran past its deadline or was cancelled.
    #[error("{operation} did not complete: {source}")]
    Deadline {
        operation: String,
        #[source]
        source: DeadlineError,
    },

    /// An asset body failed while streaming.
    #[error("failed to read asset {name:?}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The checksum manifest could not be parsed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// No asset ends in the manifest suffix.
    #[error("release {tag} has no checksum manifest asset")]
    MissingManifest { tag: String },

    /// No asset ends in the signature suffix.
    #[error("release {tag} has no checksum signature asset")]
    MissingSignature { tag: String },

    /// The release carries no binary archives.
    #[error("release {tag} has no binary artifacts")]
    NoBinaryArtifacts { tag: String },

    /// Some binary archives have no manifest entry.
    #[error(
        "{correlated} of {binaries} binary artifacts matched a manifest entry; unmatched: {}",
        unmatched.join(", ")
    )]
    ArtifactCorrelationMismatch {
        binaries: usize,
        correlated: usize,
        unmatched: Vec<String>,
    },
}

impl ReleaseError {
    /// Returns true if the failure was caused by external cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            ReleaseError::Deadline { source, .. } => *source == DeadlineError::Cancelled,
            ReleaseError::Read { source, .. } => source.kind() == std::io::ErrorKind::Interrupted,
            _ => false,
        }
    }
}

/// Result type for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;
