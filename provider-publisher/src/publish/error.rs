//! Error types for publish runs.

use std::fmt;
use std::io;

use thiserror::Error;

use super::report::PublishedPlatform;
use crate::registry::RegistryError;
use crate::release::ReleaseError;

/// Why one platform unit failed.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The registry refused or never answered the create-platform call.
    #[error("create platform failed: {0}")]
    CreatePlatform(#[source] RegistryError),

    /// The binary download could not be started.
    #[error("download failed: {0}")]
    Download(#[source] ReleaseError),

    /// The binary body failed while streaming into the upload.
    #[error("download interrupted: {0}")]
    DownloadInterrupted(#[source] io::Error),

    /// The streamed binary does not match its manifest digest.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The upload was refused or never completed.
    #[error("upload failed: {0}")]
    Upload(#[source] RegistryError),

    /// The unit's task panicked or was aborted.
    #[error("platform task aborted: {0}")]
    Aborted(String),
}

impl PlatformError {
    /// Returns true if the unit stopped because of external cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            PlatformError::CreatePlatform(err) | PlatformError::Upload(err) => err.is_cancelled(),
            PlatformError::Download(err) => err.is_cancelled(),
            PlatformError::DownloadInterrupted(err) => err.kind() == io::ErrorKind::Interrupted,
            PlatformError::ChecksumMismatch { .. } | PlatformError::Aborted(_) => false,
        }
    }
}

/// A failed platform unit.
#[derive(Debug)]
pub struct PlatformFailure {
    pub filename: String,
    pub error: PlatformError,
}

/// Every platform failure of a run, plus what did publish.
///
/// Successfully published platforms stay in the registry; there is no
/// rollback.
#[derive(Debug)]
pub struct PlatformFailures {
    pub failures: Vec<PlatformFailure>,
    pub published: Vec<PublishedPlatform>,
}

impl PlatformFailures {
    /// Filenames of the failed platforms.
    pub fn failed_filenames(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.filename.as_str()).collect()
    }
}

impl fmt::Display for PlatformFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.failures.len() + self.published.len();
        write!(
            f,
            "{} of {} platforms failed to publish",
            self.failures.len(),
            total
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.filename, failure.error)?;
        }
        if !self.published.is_empty() {
            let names: Vec<&str> = self.published.iter().map(|p| p.filename.as_str()).collect();
            write!(f, "\npublished: {}", names.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for PlatformFailures {}

/// Errors that end a publish run.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The release could not be resolved; nothing was published.
    #[error("failed to resolve release: {0}")]
    Resolve(#[from] ReleaseError),

    /// The version could not be created; nothing was published.
    #[error("failed to create version {version}: {source}")]
    CreateVersion {
        version: String,
        #[source]
        source: RegistryError,
    },

    /// The manifest or its signature could not be uploaded.
    #[error("failed to upload {filename}: {source}")]
    Upload {
        filename: String,
        #[source]
        source: RegistryError,
    },

    /// One or more platform units failed.
    #[error(transparent)]
    Platforms(PlatformFailures),
}

impl PublishError {
    /// Returns true if the run stopped because of external cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            PublishError::Resolve(err) => err.is_cancelled(),
            PublishError::CreateVersion { source, .. } | PublishError::Upload { source, .. } => {
                source.is_cancelled()
            }
            PublishError::Platforms(failures) => {
                failures.failures.iter().any(|f| f.error.is_cancelled())
            }
        }
    }
}

/// Result type for publish runs.
pub type PublishResult<T> = Result<T, PublishError>;
