//! GitHub REST implementation of [`ReleaseSource`].

use std::io;

use futures::future::BoxFuture;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use tracing::debug;

use super::error::{ReleaseError, ReleaseResult};
use super::source::{Release, ReleaseRef, ReleaseSource};
use crate::ByteStream;

/// Default GitHub API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// REST API version pinned on every request.
const API_VERSION: &str = "2022-11-28";

const USER_AGENT: &str = concat!("provider-publisher/", env!("CARGO_PKG_VERSION"));

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const BINARY_MEDIA_TYPE: &str = "application/octet-stream";

/// Release source backed by the GitHub REST API.
///
/// Asset downloads request the raw body; GitHub answers with a redirect to
/// storage, which is followed automatically.
pub struct GitHubReleaseSource {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubReleaseSource {
    /// Create a source for the API at `api_url` authenticated with `token`.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> ReleaseResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ReleaseError::Client)?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn release_url(&self, release: &ReleaseRef) -> String {
        format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.api_url, release.owner, release.repository, release.tag
        )
    }

    fn asset_url(&self, release: &ReleaseRef, asset_id: u64) -> String {
        format!(
            "{}/repos/{}/{}/releases/assets/{}",
            self.api_url, release.owner, release.repository, asset_id
        )
    }

    /// Send an authenticated GET and reject non-success statuses.
    async fn get(&self, url: &str, accept: &str) -> ReleaseResult<reqwest::Response> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|source| ReleaseError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReleaseError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(response)
    }
}

impl ReleaseSource for GitHubReleaseSource {
    fn get_release<'a>(&'a self, release: &'a ReleaseRef) -> BoxFuture<'a, ReleaseResult<Release>> {
        Box::pin(async move {
            let url = self.release_url(release);
            let response = self.get(&url, JSON_MEDIA_TYPE).await?;
            let body = response
                .bytes()
                .await
                .map_err(|source| ReleaseError::Transport {
                    url: url.clone(),
                    source,
                })?;

            serde_json::from_slice(&body).map_err(|source| ReleaseError::Decode { url, source })
        })
    }

    fn download_asset<'a>(
        &'a self,
        release: &'a ReleaseRef,
        asset_id: u64,
    ) -> BoxFuture<'a, ReleaseResult<ByteStream>> {
        Box::pin(async move {
            let url = self.asset_url(release, asset_id);
            let response = self.get(&url, BINARY_MEDIA_TYPE).await?;
            Ok(response
                .bytes_stream()
                .map(|chunk| chunk.map_err(io::Error::other))
                .boxed())
        })
    }
}
