//! CLI error type and exit codes.

use provider_publisher::config::ConfigError;
use provider_publisher::publish::PublishError;
use provider_publisher::registry::RegistryError;
use provider_publisher::release::ReleaseError;
use thiserror::Error;

/// Exit code for a run stopped by Ctrl+C (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Release(#[from] ReleaseError),

    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Publish(#[from] PublishError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to set signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl CliError {
    /// True when the command stopped because the user interrupted it.
    pub fn is_cancelled(&self) -> bool {
        match self {
            CliError::Release(err) => err.is_cancelled(),
            CliError::Registry(err) => err.is_cancelled(),
            CliError::Publish(err) => err.is_cancelled(),
            CliError::Config(_) | CliError::Runtime(_) | CliError::Signal(_) => false,
        }
    }

    /// Process exit code: 130 when interrupted, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_cancelled() {
            EXIT_INTERRUPTED
        } else {
            1
        }
    }
}
