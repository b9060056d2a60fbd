//! End-to-end publish sequence.
//!
//! Steps 1-3 run strictly in order and abort the run on failure. Step 4
//! spawns one task per artifact; task outcomes flow over a channel that is
//! drained only after every task has been joined.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};

use super::error::{PlatformError, PlatformFailure, PlatformFailures, PublishError, PublishResult};
use super::report::{PublishReport, PublishedPlatform};
use super::state::{PublishState, StateTracker};
use super::verify::{verify_stream, BodyFault};
use crate::deadline::{DeadlineScope, Phase};
use crate::registry::{
    FileUpload, NewPlatform, NewVersion, ProviderAddress, PublishedVersion, RegistryApi,
    RequestBody,
};
use crate::release::{
    CorrelatedArtifact, ReleaseContext, ReleaseError, ReleaseRef, ReleaseResolver, ReleaseSource,
};

/// Where and as what a release is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub provider: ProviderAddress,
    /// Provider version, without any leading `v`.
    pub version: String,
    /// Identifier of the signing key registered with the registry.
    pub key_id: String,
    /// Supported plugin protocol versions, e.g. `["6.0"]`.
    pub protocols: Vec<String>,
}

/// Publishes one release to the registry.
pub struct Publisher {
    source: Arc<dyn ReleaseSource>,
    registry: Arc<dyn RegistryApi>,
    target: Arc<PublishTarget>,
}

/// Outcome of one platform unit, tagged with its manifest position.
type UnitOutcome = (usize, String, Result<PublishedPlatform, PlatformError>);

impl Publisher {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        registry: Arc<dyn RegistryApi>,
        target: PublishTarget,
    ) -> Self {
        Self {
            source,
            registry,
            target: Arc::new(target),
        }
    }

    pub fn target(&self) -> &PublishTarget {
        &self.target
    }

    /// Run the full pipeline for `release`.
    ///
    /// Every network call derives its own deadline from `scope`; cancelling
    /// the scope's token stops all in-flight work.
    ///
    /// # Errors
    ///
    /// Resolution, version creation and manifest upload failures abort the
    /// run. Platform failures are collected and returned together as
    /// [`PublishError::Platforms`] after every unit has finished.
    pub async fn publish(
        &self,
        release: &ReleaseRef,
        scope: &DeadlineScope,
    ) -> PublishResult<PublishReport> {
        let span = info_span!(
            "publish",
            repository = %format!("{}/{}", release.owner, release.repository),
            ref_name = %release.tag,
            provider = %self.target.provider.provider,
            version = %self.target.version,
        );

        async {
            let mut state = StateTracker::new();
            let result = self.run(release, scope, &mut state).await;
            match &result {
                Ok(report) => {
                    state.advance(PublishState::Done);
                    info!(platforms = report.platforms.len(), "Publish complete");
                }
                Err(err) => {
                    error!(
                        state = %state.current(),
                        history = ?state.history(),
                        error = %err,
                        "Publish failed"
                    );
                    state.advance(PublishState::Failed);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        release: &ReleaseRef,
        scope: &DeadlineScope,
        state: &mut StateTracker,
    ) -> PublishResult<PublishReport> {
        state.advance(PublishState::ResolvingRelease);
        let context = ReleaseResolver::new(Arc::clone(&self.source))
            .resolve(release, scope)
            .await?;
        self.warn_on_version_drift(&context);

        let version = self.create_version(scope).await?;
        state.advance(PublishState::VersionCreated);
        info!(id = %version.id, "Version created");

        self.upload_manifests(&context, &version, scope).await?;
        state.advance(PublishState::ManifestsUploaded);

        state.advance(PublishState::PlatformsPublishing);
        let (published, failures) = self.publish_platforms(release, &context, scope).await;

        if !failures.is_empty() {
            return Err(PublishError::Platforms(PlatformFailures {
                failures,
                published,
            }));
        }

        Ok(PublishReport {
            version_id: version.id,
            version: self.target.version.clone(),
            platforms: published,
        })
    }

    fn warn_on_version_drift(&self, context: &ReleaseContext) {
        for artifact in context.artifacts() {
            if artifact.entry().version() != self.target.version {
                warn!(
                    filename = artifact.filename(),
                    archive_version = artifact.entry().version(),
                    "Archive version differs from the release version"
                );
            }
        }
    }

    async fn create_version(&self, scope: &DeadlineScope) -> PublishResult<PublishedVersion> {
        let new_version = NewVersion {
            version: self.target.version.clone(),
            key_id: self.target.key_id.clone(),
            protocols: self.target.protocols.clone(),
        };
        let request = scope.child(Phase::Request);
        self.registry
            .create_version(&self.target.provider, &new_version, &request)
            .await
            .map_err(|source| PublishError::CreateVersion {
                version: new_version.version.clone(),
                source,
            })
    }

    /// Upload the manifest, then its signature, each under its own deadline.
    async fn upload_manifests(
        &self,
        context: &ReleaseContext,
        version: &PublishedVersion,
        scope: &DeadlineScope,
    ) -> PublishResult<()> {
        let manifest = context.manifest();
        let signature = context.signature();
        let uploads = [
            (&version.shasums_upload, manifest.filename(), manifest.raw_bytes()),
            (&version.shasums_sig_upload, signature.filename(), signature.raw_bytes()),
        ];

        for (url, filename, bytes) in uploads {
            let upload = FileUpload::new(url.as_str(), filename, RequestBody::Bytes(bytes.clone()));
            let deadline = scope.child(Phase::Upload);
            self.registry
                .upload_file(upload, &deadline)
                .await
                .map_err(|source| PublishError::Upload {
                    filename: filename.to_string(),
                    source,
                })?;
            info!(filename, "Uploaded");
        }

        Ok(())
    }

    /// Spawn one unit per artifact and wait for all of them.
    async fn publish_platforms(
        &self,
        release: &ReleaseRef,
        context: &ReleaseContext,
        scope: &DeadlineScope,
    ) -> (Vec<PublishedPlatform>, Vec<PlatformFailure>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<UnitOutcome>();
        let mut handles = Vec::with_capacity(context.artifacts().len());

        for (index, artifact) in context.artifacts().iter().enumerate() {
            let unit = PlatformUnit {
                source: Arc::clone(&self.source),
                registry: Arc::clone(&self.registry),
                target: Arc::clone(&self.target),
                release: release.clone(),
                artifact: artifact.clone(),
                scope: scope.detach(),
            };
            let filename = artifact.filename().to_string();
            let span = info_span!("artifact", filename = %filename);
            let tx = tx.clone();

            let handle = tokio::spawn(
                async move {
                    let filename = unit.artifact.filename().to_string();
                    let outcome = unit.run().await;
                    if let Err(err) = &outcome {
                        error!(error = %err, "Platform failed");
                    }
                    // The receiver outlives every unit.
                    let _ = tx.send((index, filename, outcome));
                }
                .instrument(span),
            );
            handles.push((index, filename, handle));
        }
        drop(tx);

        let joined = join_all(
            handles
                .into_iter()
                .map(|(index, filename, handle)| async move { (index, filename, handle.await) }),
        )
        .await;

        let mut outcomes: Vec<UnitOutcome> = Vec::with_capacity(joined.len());
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        // A unit that panicked never reported; record it from its join error.
        for (index, filename, result) in joined {
            if let Err(join_error) = result {
                outcomes.push((
                    index,
                    filename,
                    Err(PlatformError::Aborted(join_error.to_string())),
                ));
            }
        }
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut published = Vec::new();
        let mut failures = Vec::new();
        for (_, filename, outcome) in outcomes {
            match outcome {
                Ok(platform) => published.push(platform),
                Err(error) => failures.push(PlatformFailure { filename, error }),
            }
        }

        info!(
            published = published.len(),
            failed = failures.len(),
            "Platform units finished"
        );
        (published, failures)
    }
}

/// Everything one platform unit owns.
struct PlatformUnit {
    source: Arc<dyn ReleaseSource>,
    registry: Arc<dyn RegistryApi>,
    target: Arc<PublishTarget>,
    release: ReleaseRef,
    artifact: CorrelatedArtifact,
    scope: DeadlineScope,
}

impl PlatformUnit {
    /// Create the platform, then stream the binary from the release host
    /// into its upload URL.
    ///
    /// Request, download and upload deadlines are siblings under the run
    /// scope, so a short request timeout never caps a long upload.
    async fn run(self) -> Result<PublishedPlatform, PlatformError> {
        let entry = self.artifact.entry();
        let asset = self.artifact.asset();

        let platform = NewPlatform {
            os: entry.os().to_string(),
            arch: entry.arch().to_string(),
            shasum: entry.digest().to_string(),
            filename: entry.filename().to_string(),
        };
        let target = {
            let request = self.scope.child(Phase::Request);
            self.registry
                .create_platform(&self.target.provider, &self.target.version, &platform, &request)
                .await
                .map_err(PlatformError::CreatePlatform)?
        };

        let download = self.scope.child(Phase::Download);
        let stream = download
            .run(self.source.download_asset(&self.release, asset.id))
            .await
            .map_err(|source| ReleaseError::Deadline {
                operation: format!("download {}", asset.name),
                source,
            })
            .and_then(|started| started)
            .map_err(PlatformError::Download)?;

        let fault = BodyFault::default();
        let body = verify_stream(download.bound_stream(stream), entry.digest(), fault.clone());
        let upload = FileUpload::new(target.binary_upload, entry.filename(), RequestBody::Stream(body));

        let deadline = self.scope.child(Phase::Upload);
        let uploaded = self.registry.upload_file(upload, &deadline).await;

        // A body failure surfaces from the transport as an opaque error.
        if let Some(cause) = fault.take() {
            return Err(cause);
        }
        uploaded.map_err(PlatformError::Upload)?;

        info!(os = entry.os(), arch = entry.arch(), "Platform published");
        Ok(PublishedPlatform::from(&self.artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::{DeadlineError, PhaseTimeouts};
    use crate::registry::{PlatformUploadTarget, RegistryError, RegistryResult};
    use crate::release::MockReleaseSource;
    use futures::future::BoxFuture;
    use futures::StreamExt;
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const SUMS_URL: &str = "https://archivist.example/sums";
    const SIG_URL: &str = "https://archivist.example/sig";

    /// Mock registry recording every call in order.
    #[derive(Default)]
    struct MockRegistry {
        calls: Mutex<Vec<String>>,
        uploads: Mutex<HashMap<String, Vec<u8>>>,
        fail_version: bool,
        fail_platform: Option<String>,
        slow_platform: Option<String>,
    }

    impl MockRegistry {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn uploaded(&self, url: &str) -> Option<Vec<u8>> {
            self.uploads.lock().unwrap().get(url).cloned()
        }

        fn rejected() -> RegistryError {
            RegistryError::Status {
                expected: 201,
                actual: 422,
                body: "{\"errors\":[\"rejected\"]}".to_string(),
                api_error: Default::default(),
            }
        }
    }

    fn deadline_error(operation: &str, source: DeadlineError) -> RegistryError {
        RegistryError::Deadline {
            operation: operation.to_string(),
            source,
        }
    }

    impl RegistryApi for MockRegistry {
        fn create_version<'a>(
            &'a self,
            _provider: &'a ProviderAddress,
            version: &'a NewVersion,
            scope: &'a DeadlineScope,
        ) -> BoxFuture<'a, RegistryResult<PublishedVersion>> {
            Box::pin(async move {
                scope
                    .run(async {})
                    .await
                    .map_err(|e| deadline_error("create version", e))?;
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("create-version {}", version.version));
                if self.fail_version {
                    return Err(Self::rejected());
                }
                Ok(PublishedVersion {
                    id: "provver-1".to_string(),
                    version: version.version.clone(),
                    shasums_upload: SUMS_URL.to_string(),
                    shasums_sig_upload: SIG_URL.to_string(),
                })
            })
        }

        fn create_platform<'a>(
            &'a self,
            _provider: &'a ProviderAddress,
            _version: &'a str,
            platform: &'a NewPlatform,
            scope: &'a DeadlineScope,
        ) -> BoxFuture<'a, RegistryResult<PlatformUploadTarget>> {
            Box::pin(async move {
                if self.slow_platform.as_deref() == Some(platform.filename.as_str()) {
                    scope
                        .run(tokio::time::sleep(Duration::from_millis(50)))
                        .await
                        .map_err(|e| deadline_error("create platform", e))?;
                }
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("create-platform {}", platform.filename));
                if self.fail_platform.as_deref() == Some(platform.filename.as_str()) {
                    return Err(Self::rejected());
                }
                Ok(PlatformUploadTarget {
                    id: format!("provpltfrm-{}", platform.arch),
                    os: platform.os.clone(),
                    arch: platform.arch.clone(),
                    binary_upload: format!("https://archivist.example/{}", platform.filename),
                })
            })
        }

        fn upload_file<'a>(
            &'a self,
            upload: FileUpload,
            scope: &'a DeadlineScope,
        ) -> BoxFuture<'a, RegistryResult<()>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("upload {}", upload.filename));
                let drain = async {
                    match upload.body {
                        RequestBody::Bytes(bytes) => Ok(bytes.to_vec()),
                        RequestBody::Stream(mut stream) => {
                            let mut buf = Vec::new();
                            while let Some(chunk) = stream.next().await {
                                match chunk {
                                    Ok(chunk) => buf.extend_from_slice(&chunk),
                                    Err(err) => {
                                        return Err(RegistryError::Status {
                                            expected: 200,
                                            actual: 400,
                                            body: err.to_string(),
                                            api_error: Default::default(),
                                        })
                                    }
                                }
                            }
                            Ok(buf)
                        }
                        other => panic!("unexpected upload body {:?}", other),
                    }
                };
                let body = scope
                    .run(drain)
                    .await
                    .map_err(|e| deadline_error("upload", e))??;
                self.uploads.lock().unwrap().insert(upload.url, body);
                Ok(())
            })
        }
    }

    fn sha256_hex(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    fn binary(name: &str) -> Vec<u8> {
        format!("PK\x03\x04 contents of {}", name).into_bytes()
    }

    /// Release with one asset per name, and a manifest listing each
    /// binary's real digest.
    fn release_source(names: &[&str]) -> MockReleaseSource {
        let manifest: String = names
            .iter()
            .map(|name| format!("{}  {}\n", sha256_hex(&binary(name)), name))
            .collect();
        let mut source = MockReleaseSource::default()
            .with_asset(1, "acme_1.2.0_SHA256SUMS", manifest)
            .with_asset(2, "acme_1.2.0_SHA256SUMS.sig", b"signature".to_vec());
        for (i, name) in names.iter().enumerate() {
            source = source.with_asset(100 + i as u64, name, binary(name));
        }
        source
    }

    fn target() -> PublishTarget {
        PublishTarget {
            provider: ProviderAddress {
                organization: "acme-corp".to_string(),
                registry: "private".to_string(),
                namespace: "acme-corp".to_string(),
                provider: "acme".to_string(),
            },
            version: "1.2.0".to_string(),
            key_id: "34365D9472D7468F".to_string(),
            protocols: vec!["6.0".to_string()],
        }
    }

    fn release_ref() -> ReleaseRef {
        ReleaseRef::new("acme-corp", "terraform-provider-acme", "v1.2.0")
    }

    fn root() -> DeadlineScope {
        DeadlineScope::root(CancellationToken::new(), PhaseTimeouts::default())
    }

    const THREE: [&str; 3] = [
        "acme_1.2.0_linux_amd64.zip",
        "acme_1.2.0_linux_arm64.zip",
        "acme_1.2.0_darwin_arm64.zip",
    ];

    #[tokio::test]
    async fn test_publish_all_platforms() {
        let registry = Arc::new(MockRegistry::default());
        let publisher = Publisher::new(
            Arc::new(release_source(&THREE[..2])),
            registry.clone(),
            target(),
        );

        let report = publisher.publish(&release_ref(), &root()).await.unwrap();

        assert_eq!(report.version_id, "provver-1");
        assert_eq!(report.version, "1.2.0");
        let filenames: Vec<&str> = report.platforms.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(filenames, THREE[..2].to_vec());

        let calls = registry.calls();
        assert_eq!(
            calls[..3].to_vec(),
            vec![
                "create-version 1.2.0".to_string(),
                "upload acme_1.2.0_SHA256SUMS".to_string(),
                "upload acme_1.2.0_SHA256SUMS.sig".to_string(),
            ]
        );
        assert_eq!(calls.len(), 3 + 2 * 2);

        let sums = String::from_utf8(registry.uploaded(SUMS_URL).unwrap()).unwrap();
        assert!(sums.contains("acme_1.2.0_linux_arm64.zip"));
        assert_eq!(registry.uploaded(SIG_URL).unwrap(), b"signature");
        assert_eq!(
            registry
                .uploaded("https://archivist.example/acme_1.2.0_linux_amd64.zip")
                .unwrap(),
            binary("acme_1.2.0_linux_amd64.zip")
        );
    }

    #[tokio::test]
    async fn test_one_platform_failure_spares_siblings() {
        let registry = Arc::new(MockRegistry {
            fail_platform: Some(THREE[1].to_string()),
            slow_platform: Some(THREE[2].to_string()),
            ..MockRegistry::default()
        });
        let publisher = Publisher::new(Arc::new(release_source(&THREE)), registry.clone(), target());

        let err = publisher.publish(&release_ref(), &root()).await.unwrap_err();

        match err {
            PublishError::Platforms(failures) => {
                assert_eq!(failures.failed_filenames(), vec![THREE[1]]);
                assert!(matches!(
                    failures.failures[0].error,
                    PlatformError::CreatePlatform(RegistryError::Status { actual: 422, .. })
                ));
                let published: Vec<&str> =
                    failures.published.iter().map(|p| p.filename.as_str()).collect();
                assert_eq!(published, vec![THREE[0], THREE[2]]);
            }
            other => panic!("Expected Platforms error, got {:?}", other),
        }

        for name in [THREE[0], THREE[2]] {
            let url = format!("https://archivist.example/{}", name);
            assert_eq!(registry.uploaded(&url).unwrap(), binary(name));
        }
        assert!(registry
            .uploaded(&format!("https://archivist.example/{}", THREE[1]))
            .is_none());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_fails_only_that_platform() {
        let names = &THREE[..2];
        let mut source = release_source(names);
        // Tamper with the second binary after the manifest was written.
        source.bodies.insert(101, b"tampered".to_vec());
        let registry = Arc::new(MockRegistry::default());
        let publisher = Publisher::new(Arc::new(source), registry.clone(), target());

        let err = publisher.publish(&release_ref(), &root()).await.unwrap_err();

        match err {
            PublishError::Platforms(failures) => {
                assert_eq!(failures.failures.len(), 1);
                match &failures.failures[0].error {
                    PlatformError::ChecksumMismatch { expected, actual } => {
                        assert_eq!(expected, &sha256_hex(&binary(names[1])));
                        assert_eq!(actual, &sha256_hex(b"tampered"));
                    }
                    other => panic!("Expected ChecksumMismatch, got {:?}", other),
                }
                assert_eq!(failures.published.len(), 1);
            }
            other => panic!("Expected Platforms error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_version_failure_aborts_before_uploads() {
        let registry = Arc::new(MockRegistry {
            fail_version: true,
            ..MockRegistry::default()
        });
        let publisher = Publisher::new(Arc::new(release_source(&THREE)), registry.clone(), target());

        let err = publisher.publish(&release_ref(), &root()).await.unwrap_err();

        assert!(matches!(err, PublishError::CreateVersion { .. }));
        assert_eq!(registry.calls(), vec!["create-version 1.2.0".to_string()]);
    }

    #[tokio::test]
    async fn test_resolution_failure_never_touches_registry() {
        let mut source = release_source(&THREE[..1]);
        source.release.assets.retain(|a| a.id != Some(1));
        let registry = Arc::new(MockRegistry::default());
        let publisher = Publisher::new(Arc::new(source), registry.clone(), target());

        let err = publisher.publish(&release_ref(), &root()).await.unwrap_err();

        assert!(matches!(
            err,
            PublishError::Resolve(ReleaseError::MissingManifest { .. })
        ));
        assert!(registry.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_download_fails_its_unit() {
        let mut source = release_source(&THREE[..2]);
        source.stalled.push(100);
        let registry = Arc::new(MockRegistry::default());
        let timeouts = PhaseTimeouts {
            download: Duration::from_millis(50),
            ..PhaseTimeouts::default()
        };
        let scope = DeadlineScope::root(CancellationToken::new(), timeouts);
        let publisher = Publisher::new(Arc::new(source), registry.clone(), target());

        let err = publisher.publish(&release_ref(), &scope).await.unwrap_err();

        match err {
            PublishError::Platforms(failures) => {
                assert_eq!(failures.failed_filenames(), vec![THREE[0]]);
                assert!(matches!(
                    &failures.failures[0].error,
                    PlatformError::Download(ReleaseError::Deadline {
                        source: DeadlineError::Elapsed {
                            phase: Phase::Download,
                            ..
                        },
                        ..
                    })
                ));
                assert!(!PublishError::Platforms(failures).is_cancelled());
            }
            other => panic!("Expected Platforms error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let scope = DeadlineScope::root(token, PhaseTimeouts::default());
        let registry = Arc::new(MockRegistry::default());
        let publisher = Publisher::new(Arc::new(release_source(&THREE)), registry.clone(), target());

        let err = publisher.publish(&release_ref(), &scope).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(registry.calls().is_empty());
    }
}
