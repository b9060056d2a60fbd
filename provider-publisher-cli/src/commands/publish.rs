//! Publish command - run the full pipeline.

use std::sync::Arc;

use provider_publisher::publish::Publisher;
use provider_publisher::registry::RegistryClient;

use super::CliRunner;
use crate::error::CliError;

pub fn run() -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    let config = runner.config();

    let source = runner.release_source()?;
    let registry = Arc::new(RegistryClient::new(
        &config.registry_address,
        &config.registry_token,
    )?);
    let publisher = Publisher::new(source, registry, config.publish_target());
    let release = config.release_ref();

    let report = runner.block_on(|scope| async move { publisher.publish(&release, &scope).await })?;

    print!("{}", report);
    Ok(())
}
