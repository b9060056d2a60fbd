//! Error types for registry calls.

use thiserror::Error;

use super::models::ApiError;
use crate::deadline::DeadlineError;

/// Errors that can occur while talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The HTTP client could not be constructed.
    #[error("failed to create registry client: {0}")]
    Client(#[source] reqwest::Error),

    /// A request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// The request could not be sent or the response could not be read.
    #[error("error executing {method} {url:?}: {source}")]
    Transport {
        method: reqwest::Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The registry answered with an unexpected status.
    ///
    /// `body` is the trimmed raw response; `api_error` is whatever could be
    /// decoded from it and may be empty.
    #[error("expected response code {expected}, saw: code={actual}; body={body:?}")]
    Status {
        expected: u16,
        actual: u16,
        body: String,
        api_error: ApiError,
    },

    /// A success response did not match the expected document.
    #[error("failed to decode response of {method} {url:?}: {source}")]
    Decode {
        method: reqwest::Method,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The call ran past its deadline or was cancelled.
    #[error("{operation} did not complete: {source}")]
    Deadline {
        operation: String,
        #[source]
        source: DeadlineError,
    },
}

impl RegistryError {
    /// Returns true if the call was abandoned because of external cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RegistryError::Deadline {
                source: DeadlineError::Cancelled,
                ..
            }
        )
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
