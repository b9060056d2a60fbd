//! Subcommand implementations and the setup they share.

pub mod inspect;
pub mod publish;

use std::future::Future;
use std::sync::Arc;

use provider_publisher::config::PublishConfig;
use provider_publisher::deadline::DeadlineScope;
use provider_publisher::release::GitHubReleaseSource;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::CliError;

/// Loaded configuration plus the runtime and root scope a command runs in.
pub struct CliRunner {
    config: PublishConfig,
    runtime: tokio::runtime::Runtime,
    token: CancellationToken,
}

impl CliRunner {
    /// Load configuration from the environment and install Ctrl+C handling.
    pub fn new() -> Result<Self, CliError> {
        let config = PublishConfig::from_env()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        let token = CancellationToken::new();
        let handler_token = token.clone();
        ctrlc::set_handler(move || {
            warn!("received interrupt, cancelling in-flight operations");
            handler_token.cancel();
        })?;

        Ok(Self {
            config,
            runtime,
            token,
        })
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn release_source(&self) -> Result<Arc<GitHubReleaseSource>, CliError> {
        let source =
            GitHubReleaseSource::new(&self.config.github_api_url, &self.config.github_token)?;
        Ok(Arc::new(source))
    }

    /// Run `task` to completion under a root scope with the configured timeouts.
    pub fn block_on<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce(DeadlineScope) -> Fut,
        Fut: Future<Output = T>,
    {
        let scope = DeadlineScope::root(self.token.clone(), self.config.timeouts);
        self.runtime.block_on(task(scope))
    }
}
