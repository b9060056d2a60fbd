//! Inspect command - resolve a release without touching the registry.

use provider_publisher::release::{ReleaseContext, ReleaseResolver};

use super::CliRunner;
use crate::error::CliError;

pub fn run() -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    let release = runner.config().release_ref();
    let resolver = ReleaseResolver::new(runner.release_source()?);

    let context = runner.block_on(|scope| async move { resolver.resolve(&release, &scope).await })?;

    print_context(&context);
    Ok(())
}

fn print_context(context: &ReleaseContext) {
    println!("Manifest:  {}", context.manifest().filename());
    println!("Signature: {}", context.signature().filename());
    println!();
    println!("Artifacts ({}):", context.artifacts().len());
    for artifact in context.artifacts() {
        let entry = artifact.entry();
        println!(
            "  {}  {:<8} {:<8} {}",
            entry.digest(),
            entry.os(),
            entry.arch(),
            entry.filename()
        );
    }
}
