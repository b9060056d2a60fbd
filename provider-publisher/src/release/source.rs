//! Release host abstraction for testability.

use std::fmt;

use futures::future::BoxFuture;
use serde::Deserialize;

use super::error::ReleaseResult;
use crate::ByteStream;

/// Coordinates of one tagged release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRef {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name without the owner prefix.
    pub repository: String,
    /// Release tag, e.g. `v1.2.0`.
    pub tag: String,
}

impl ReleaseRef {
    /// Create a release reference.
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ReleaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repository, self.tag)
    }
}

/// Release metadata as returned by the release host.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Release {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// One asset attached to a release. Every field may be absent on the wire.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ReleaseAsset {
    /// Create a fully populated asset.
    pub fn new(id: u64, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            url: Some(url.into()),
        }
    }

    /// Convert into a handle if id, name and url are all present.
    pub fn handle(&self) -> Option<AssetHandle> {
        match (self.id, &self.name, &self.url) {
            (Some(id), Some(name), Some(url)) => Some(AssetHandle {
                id,
                name: name.clone(),
                url: url.clone(),
            }),
            _ => None,
        }
    }
}

/// Reference to a downloadable release asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetHandle {
    pub id: u64,
    pub name: String,
    pub url: String,
}

/// Trait for release host operations.
///
/// This abstraction allows the resolver and publisher to run against mock
/// release hosts in tests.
pub trait ReleaseSource: Send + Sync {
    /// Fetch release metadata for a tag.
    fn get_release<'a>(&'a self, release: &'a ReleaseRef) -> BoxFuture<'a, ReleaseResult<Release>>;

    /// Start downloading an asset, returning its body as a byte stream.
    ///
    /// The future resolves once response headers arrive; the body is
    /// consumed lazily through the stream.
    fn download_asset<'a>(
        &'a self,
        release: &'a ReleaseRef,
        asset_id: u64,
    ) -> BoxFuture<'a, ReleaseResult<ByteStream>>;
}

#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    use bytes::Bytes;
    use futures::stream::{self, StreamExt};

    use super::*;
    use crate::release::ReleaseError;

    /// Mock release host serving fixed metadata and asset bodies.
    #[derive(Default)]
    pub struct MockReleaseSource {
        pub release: Release,
        pub bodies: HashMap<u64, Vec<u8>>,
        /// Asset ids whose download never produces a response.
        pub stalled: Vec<u64>,
        pub downloads: Mutex<Vec<u64>>,
    }

    impl MockReleaseSource {
        /// Add an asset with the given body.
        pub fn with_asset(mut self, id: u64, name: &str, body: impl Into<Vec<u8>>) -> Self {
            self.release.assets.push(ReleaseAsset::new(
                id,
                name,
                format!("https://api.example.com/assets/{}", id),
            ));
            self.bodies.insert(id, body.into());
            self
        }

        /// Ids downloaded so far, in request order.
        pub fn downloaded(&self) -> Vec<u64> {
            self.downloads.lock().unwrap().clone()
        }
    }

    impl ReleaseSource for MockReleaseSource {
        fn get_release<'a>(
            &'a self,
            _release: &'a ReleaseRef,
        ) -> BoxFuture<'a, ReleaseResult<Release>> {
            Box::pin(async move { Ok(self.release.clone()) })
        }

        fn download_asset<'a>(
            &'a self,
            _release: &'a ReleaseRef,
            asset_id: u64,
        ) -> BoxFuture<'a, ReleaseResult<ByteStream>> {
            Box::pin(async move {
                self.downloads.lock().unwrap().push(asset_id);
                if self.stalled.contains(&asset_id) {
                    std::future::pending::<()>().await;
                }
                let body = self.bodies.get(&asset_id).cloned().ok_or_else(|| {
                    ReleaseError::Status {
                        url: format!("https://api.example.com/assets/{}", asset_id),
                        status: 404,
                        body: "Not Found".to_string(),
                    }
                })?;
                // Two chunks, so consumers exercise multi-chunk bodies.
                let mid = body.len() / 2;
                let chunks: Vec<io::Result<Bytes>> = vec![
                    Ok(Bytes::copy_from_slice(&body[..mid])),
                    Ok(Bytes::copy_from_slice(&body[mid..])),
                ];
                Ok(stream::iter(chunks).boxed())
            })
        }
    }

    #[test]
    fn test_asset_handle_requires_all_fields() {
        let complete = ReleaseAsset::new(7, "acme_1.0.0_linux_amd64.zip", "https://x/7");
        assert_eq!(complete.handle().unwrap().id, 7);

        let nameless = ReleaseAsset {
            name: None,
            ..complete.clone()
        };
        assert!(nameless.handle().is_none());

        let urlless = ReleaseAsset {
            url: None,
            ..complete.clone()
        };
        assert!(urlless.handle().is_none());

        let idless = ReleaseAsset { id: None, ..complete };
        assert!(idless.handle().is_none());
    }

    #[test]
    fn test_release_deserializes_partial_assets() {
        let json = r#"{"tag_name":"v1.2.0","assets":[{"id":1,"name":"a.zip","url":"u"},{"name":"b.zip"}]}"#;
        let release: Release = serde_json::from_str(json).unwrap();

        assert_eq!(release.tag_name.as_deref(), Some("v1.2.0"));
        assert_eq!(release.assets.len(), 2);
        assert!(release.assets[0].handle().is_some());
        assert!(release.assets[1].handle().is_none());
    }

    #[test]
    fn test_release_ref_display() {
        let r = ReleaseRef::new("acme", "terraform-provider-acme", "v1.2.0");
        assert_eq!(r.to_string(), "acme/terraform-provider-acme@v1.2.0");
    }
}
