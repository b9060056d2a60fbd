//! Release discovery and artifact correlation.
//!
//! A [`ReleaseResolver`] reads one tagged release through a
//! [`ReleaseSource`], downloads its checksum manifest and signature, and
//! matches every binary archive with its manifest entry. The result is a
//! [`ReleaseContext`], the read-only input of a publish run.

mod error;
mod github;
mod resolver;
mod source;

pub use error::{ReleaseError, ReleaseResult};
pub use github::{GitHubReleaseSource, DEFAULT_API_URL};
pub use resolver::{
    classify, correlate, AssetKind, ClassifiedAssets, CorrelatedArtifact, ReleaseContext,
    ReleaseResolver,
};
pub use source::{AssetHandle, Release, ReleaseAsset, ReleaseRef, ReleaseSource};

#[cfg(test)]
pub use source::tests::MockReleaseSource;
