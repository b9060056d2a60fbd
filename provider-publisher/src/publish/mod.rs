//! Publish orchestration.
//!
//! A [`Publisher`] drives one run: resolve the release, create the version,
//! upload the manifest and its signature, then publish every platform
//! concurrently. Platform failures never cancel sibling platforms; they are
//! collected and reported together once all units have finished.

mod error;
mod orchestrator;
mod report;
mod state;
mod verify;

pub use error::{PlatformError, PlatformFailure, PlatformFailures, PublishError, PublishResult};
pub use orchestrator::{PublishTarget, Publisher};
pub use report::{PublishReport, PublishedPlatform};
pub use state::PublishState;
