//! Release resolution: classify assets, fetch the manifest pair, correlate
//! binaries with manifest entries.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::{debug, info};

use super::error::{ReleaseError, ReleaseResult};
use super::source::{AssetHandle, ReleaseAsset, ReleaseRef, ReleaseSource};
use crate::deadline::{DeadlineScope, Phase};
use crate::manifest::{
    parse_manifest, ChecksumEntry, ChecksumManifest, SignatureFile, ARCHIVE_SUFFIX,
    MANIFEST_SUFFIX, SIGNATURE_SUFFIX, SOURCE_ARCHIVE_PREFIX,
};

/// Role of a release asset, decided from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// The checksum manifest.
    Manifest,
    /// Detached signature over the manifest.
    Signature,
    /// Source code archive, never published.
    SourceArchive,
    /// A platform binary archive.
    Binary,
    /// Anything else attached to the release.
    Other,
}

impl AssetKind {
    /// Classify an asset name. Rules apply in priority order, so a source
    /// archive ending in `.zip` is never mistaken for a binary.
    pub fn of(name: &str) -> Self {
        if name.ends_with(MANIFEST_SUFFIX) {
            AssetKind::Manifest
        } else if name.ends_with(SIGNATURE_SUFFIX) {
            AssetKind::Signature
        } else if name.starts_with(SOURCE_ARCHIVE_PREFIX) {
            AssetKind::SourceArchive
        } else if name.ends_with(ARCHIVE_SUFFIX) {
            AssetKind::Binary
        } else {
            AssetKind::Other
        }
    }
}

/// Release assets grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedAssets {
    pub manifest: Option<AssetHandle>,
    pub signature: Option<AssetHandle>,
    pub binaries: Vec<AssetHandle>,
}

/// Group assets by role in a single pass.
///
/// Assets without an id, name or download URL are skipped. When several
/// assets claim the manifest or signature role, the first one wins.
pub fn classify(assets: &[ReleaseAsset]) -> ClassifiedAssets {
    let mut classified = ClassifiedAssets::default();

    for asset in assets {
        let Some(handle) = asset.handle() else {
            debug!(asset = ?asset, "Skipping incomplete release asset");
            continue;
        };

        match AssetKind::of(&handle.name) {
            AssetKind::Manifest if classified.manifest.is_none() => {
                classified.manifest = Some(handle)
            }
            AssetKind::Signature if classified.signature.is_none() => {
                classified.signature = Some(handle)
            }
            AssetKind::Binary => classified.binaries.push(handle),
            kind => debug!(name = %handle.name, ?kind, "Ignoring release asset"),
        }
    }

    classified
}

/// A binary asset matched to its manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedArtifact {
    entry: ChecksumEntry,
    asset: AssetHandle,
}

impl CorrelatedArtifact {
    /// Manifest entry describing the binary.
    pub fn entry(&self) -> &ChecksumEntry {
        &self.entry
    }

    /// Downloadable asset carrying the binary.
    pub fn asset(&self) -> &AssetHandle {
        &self.asset
    }

    /// Archive filename.
    pub fn filename(&self) -> &str {
        self.entry.filename()
    }
}

/// Match every binary asset with the manifest entry of the same filename.
///
/// # Errors
///
/// Returns [`ReleaseError::ArtifactCorrelationMismatch`] naming every
/// binary that has no entry.
pub fn correlate(
    manifest: &ChecksumManifest,
    binaries: &[AssetHandle],
) -> ReleaseResult<Vec<CorrelatedArtifact>> {
    let mut artifacts = Vec::with_capacity(binaries.len());
    let mut unmatched = Vec::new();

    for asset in binaries {
        match manifest.entry_by_filename(&asset.name) {
            Some(entry) => artifacts.push(CorrelatedArtifact {
                entry: entry.clone(),
                asset: asset.clone(),
            }),
            None => unmatched.push(asset.name.clone()),
        }
    }

    if artifacts.len() != binaries.len() {
        return Err(ReleaseError::ArtifactCorrelationMismatch {
            binaries: binaries.len(),
            correlated: artifacts.len(),
            unmatched,
        });
    }

    Ok(artifacts)
}

/// Everything needed to publish one release. Immutable once built.
#[derive(Debug, Clone)]
pub struct ReleaseContext {
    manifest: ChecksumManifest,
    signature: SignatureFile,
    artifacts: Vec<CorrelatedArtifact>,
}

impl ReleaseContext {
    pub fn manifest(&self) -> &ChecksumManifest {
        &self.manifest
    }

    pub fn signature(&self) -> &SignatureFile {
        &self.signature
    }

    pub fn artifacts(&self) -> &[CorrelatedArtifact] {
        &self.artifacts
    }
}

/// Resolves a tagged release into a [`ReleaseContext`].
pub struct ReleaseResolver {
    source: Arc<dyn ReleaseSource>,
}

impl ReleaseResolver {
    pub fn new(source: Arc<dyn ReleaseSource>) -> Self {
        Self { source }
    }

    /// Fetch, classify and correlate the assets of `release`.
    ///
    /// The metadata fetch runs under a discovery deadline; the manifest and
    /// signature downloads run concurrently, each under its own download
    /// deadline.
    ///
    /// # Errors
    ///
    /// - [`ReleaseError::NoBinaryArtifacts`] if no asset is a binary archive
    /// - [`ReleaseError::MissingManifest`] / [`ReleaseError::MissingSignature`]
    /// - [`ReleaseError::Manifest`] if the manifest does not parse
    /// - [`ReleaseError::ArtifactCorrelationMismatch`] if a binary has no entry
    /// - transport, status and deadline errors from the release host
    pub async fn resolve(
        &self,
        release: &ReleaseRef,
        scope: &DeadlineScope,
    ) -> ReleaseResult<ReleaseContext> {
        let metadata = {
            let discovery = scope.child(Phase::Discovery);
            discovery
                .run(self.source.get_release(release))
                .await
                .map_err(|source| ReleaseError::Deadline {
                    operation: format!("fetch release {}", release.tag),
                    source,
                })??
        };

        let assets = classify(&metadata.assets);
        info!(
            release = %release,
            binaries = assets.binaries.len(),
            manifest = assets.manifest.as_ref().map(|a| a.name.as_str()),
            signature = assets.signature.as_ref().map(|a| a.name.as_str()),
            "Classified release assets"
        );

        if assets.binaries.is_empty() {
            return Err(ReleaseError::NoBinaryArtifacts {
                tag: release.tag.clone(),
            });
        }
        let manifest_asset = assets.manifest.ok_or_else(|| ReleaseError::MissingManifest {
            tag: release.tag.clone(),
        })?;
        let signature_asset = assets
            .signature
            .ok_or_else(|| ReleaseError::MissingSignature {
                tag: release.tag.clone(),
            })?;

        let (manifest_bytes, signature_bytes) = futures::try_join!(
            self.download(release, &manifest_asset, scope),
            self.download(release, &signature_asset, scope),
        )?;

        let manifest = parse_manifest(manifest_asset.name.as_str(), &manifest_bytes[..])?;
        let signature = SignatureFile::new(signature_asset.name, signature_bytes);
        let artifacts = correlate(&manifest, &assets.binaries)?;

        info!(
            manifest = manifest.filename(),
            entries = manifest.entries().len(),
            artifacts = artifacts.len(),
            "Release resolved"
        );

        Ok(ReleaseContext {
            manifest,
            signature,
            artifacts,
        })
    }

    /// Download a small asset fully into memory under its own deadline.
    async fn download(
        &self,
        release: &ReleaseRef,
        asset: &AssetHandle,
        scope: &DeadlineScope,
    ) -> ReleaseResult<Bytes> {
        let download = scope.child(Phase::Download);
        let stream = download
            .run(self.source.download_asset(release, asset.id))
            .await
            .map_err(|source| ReleaseError::Deadline {
                operation: format!("download {}", asset.name),
                source,
            })??;

        let mut body = download.bound_stream(stream);
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|source| ReleaseError::Read {
                name: asset.name.clone(),
                source,
            })?;
            buf.extend_from_slice(&chunk);
        }

        debug!(name = %asset.name, bytes = buf.len(), "Downloaded asset");
        Ok(buf.freeze())
    }
}
