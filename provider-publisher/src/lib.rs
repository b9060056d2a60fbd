//! Provider Publisher - push a multi-platform provider release to a private registry
//!
//! This library reads a release's metadata and binary assets from the release
//! host, correlates each binary with its line in the `SHA256SUMS` manifest,
//! and publishes the manifest, its signature, and every platform binary to
//! the registry.
//!
//! # Pipeline
//!
//! ```text
//! ReleaseResolver ──► RegistryApi::create_version ──► upload manifest + signature
//!                                                         │
//!                         ┌───────────────────────────────┼──────────────┐
//!                         ▼                               ▼              ▼
//!                  create_platform + upload     create_platform + upload   ...
//!                         └───────────────── join ────────┴──────────────┘
//! ```
//!
//! Platform units run concurrently; one unit's failure never cancels its
//! siblings, and all failures are reported together once every unit ends.

pub mod config;
pub mod deadline;
pub mod logging;
pub mod manifest;
pub mod publish;
pub mod registry;
pub mod release;

/// A fallible stream of body chunks, used for every streamed download/upload.
pub type ByteStream = futures::stream::BoxStream<'static, std::io::Result<bytes::Bytes>>;
