//! Registry API client.

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::body::{RequestBody, BINARY_MEDIA_TYPE, JSON_API_MEDIA_TYPE};
use super::error::{RegistryError, RegistryResult};
use super::models::{
    ApiError, Document, NewPlatform, NewVersion, PlatformData, PlatformUploadTarget,
    ProviderAddress, PublishedVersion, VersionData, PROVIDER_PLATFORMS_TYPE,
    PROVIDER_VERSIONS_TYPE,
};
use crate::deadline::DeadlineScope;

/// Default registry address.
pub const DEFAULT_ADDRESS: &str = "https://app.terraform.io";

const USER_AGENT: &str = concat!("provider-publisher/", env!("CARGO_PKG_VERSION"));

/// A raw file upload to a pre-signed destination.
#[derive(Debug)]
pub struct FileUpload {
    /// Destination URL returned by the registry.
    pub url: String,
    /// File name sent in `Content-Disposition`.
    pub filename: String,
    /// Content type; defaults to the body's own type.
    pub content_type: Option<String>,
    pub body: RequestBody,
}

impl FileUpload {
    pub fn new(url: impl Into<String>, filename: impl Into<String>, body: RequestBody) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
            content_type: None,
            body,
        }
    }
}

/// Trait for the three registry operations a publish run needs.
///
/// Each call is one HTTP round trip bounded by the caller's scope. This
/// abstraction allows the orchestrator to run against a mock registry.
pub trait RegistryApi: Send + Sync {
    /// Create a provider version. Success is `201 Created`.
    fn create_version<'a>(
        &'a self,
        provider: &'a ProviderAddress,
        version: &'a NewVersion,
        scope: &'a DeadlineScope,
    ) -> BoxFuture<'a, RegistryResult<PublishedVersion>>;

    /// Create one platform of an existing version. Success is `201 Created`.
    fn create_platform<'a>(
        &'a self,
        provider: &'a ProviderAddress,
        version: &'a str,
        platform: &'a NewPlatform,
        scope: &'a DeadlineScope,
    ) -> BoxFuture<'a, RegistryResult<PlatformUploadTarget>>;

    /// PUT a file to an upload URL. Success is `200 OK`.
    fn upload_file<'a>(
        &'a self,
        upload: FileUpload,
        scope: &'a DeadlineScope,
    ) -> BoxFuture<'a, RegistryResult<()>>;
}

/// Registry client over HTTP.
///
/// JSON calls carry the bearer token; uploads go to pre-signed URLs and
/// never do.
pub struct RegistryClient {
    http: reqwest::Client,
    address: String,
    token: String,
}

impl RegistryClient {
    /// Create a client for the registry at `address`.
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> RegistryResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(RegistryError::Client)?;

        Ok(Self {
            http,
            address: address.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn versions_url(&self, provider: &ProviderAddress) -> String {
        format!(
            "{}/api/v2/organizations/{}/registry-providers/{}/{}/{}/versions",
            self.address,
            provider.organization,
            provider.registry,
            provider.namespace,
            provider.provider
        )
    }

    fn platforms_url(&self, provider: &ProviderAddress, version: &str) -> String {
        format!("{}/{}/platforms", self.versions_url(provider), version)
    }

    /// Build an authenticated JSON:API request.
    fn json_request(&self, url: &str, body: RequestBody) -> RegistryResult<reqwest::RequestBuilder> {
        let content_type = body.content_type().unwrap_or(JSON_API_MEDIA_TYPE);
        Ok(self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, content_type)
            .body(body.into_reqwest()?))
    }

    /// Build an unauthenticated upload request.
    fn upload_request(&self, upload: FileUpload) -> RegistryResult<reqwest::RequestBuilder> {
        let content_type = upload
            .content_type
            .as_deref()
            .or(upload.body.content_type())
            .unwrap_or(BINARY_MEDIA_TYPE)
            .to_string();
        let disposition = format!("attachment; filename=\"{}\"", upload.filename);

        Ok(self
            .http
            .put(&upload.url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_DISPOSITION, disposition)
            .body(upload.body.into_reqwest()?))
    }

    /// Send a request and return its body if the status is `expected`.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        request: reqwest::RequestBuilder,
        expected: StatusCode,
    ) -> RegistryResult<Bytes> {
        let transport = |source| RegistryError::Transport {
            method: method.clone(),
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        if status != expected {
            let body = String::from_utf8_lossy(&body).trim().to_string();
            let api_error = ApiError::decode(&body);
            if !api_error.is_empty() {
                warn!(url = %url, status = status.as_u16(), errors = %api_error.summary(), "Registry rejected request");
            }
            return Err(RegistryError::Status {
                expected: expected.as_u16(),
                actual: status.as_u16(),
                body,
                api_error,
            });
        }

        Ok(body)
    }

    /// POST a JSON:API document and decode the `data` member of the reply.
    async fn create<T: DeserializeOwned>(
        &self,
        url: String,
        body: RequestBody,
        operation: String,
        scope: &DeadlineScope,
    ) -> RegistryResult<T> {
        debug!(url = %url, "POST");
        let request = self.json_request(&url, body)?;
        let body = scope
            .run(self.execute(Method::POST, &url, request, StatusCode::CREATED))
            .await
            .map_err(|source| RegistryError::Deadline { operation, source })??;

        serde_json::from_slice::<Document<T>>(&body)
            .map(|doc| doc.data)
            .map_err(|source| RegistryError::Decode {
                method: Method::POST,
                url,
                source,
            })
    }
}

impl RegistryApi for RegistryClient {
    fn create_version<'a>(
        &'a self,
        provider: &'a ProviderAddress,
        version: &'a NewVersion,
        scope: &'a DeadlineScope,
    ) -> BoxFuture<'a, RegistryResult<PublishedVersion>> {
        Box::pin(async move {
            let body = RequestBody::json(&Document::request(PROVIDER_VERSIONS_TYPE, version))?;
            let data: VersionData = self
                .create(
                    self.versions_url(provider),
                    body,
                    format!("create version {}", version.version),
                    scope,
                )
                .await?;
            Ok(data.into())
        })
    }

    fn create_platform<'a>(
        &'a self,
        provider: &'a ProviderAddress,
        version: &'a str,
        platform: &'a NewPlatform,
        scope: &'a DeadlineScope,
    ) -> BoxFuture<'a, RegistryResult<PlatformUploadTarget>> {
        Box::pin(async move {
            let body = RequestBody::json(&Document::request(PROVIDER_PLATFORMS_TYPE, platform))?;
            let data: PlatformData = self
                .create(
                    self.platforms_url(provider, version),
                    body,
                    format!("create platform {}/{}", platform.os, platform.arch),
                    scope,
                )
                .await?;
            Ok(data.into())
        })
    }

    fn upload_file<'a>(
        &'a self,
        upload: FileUpload,
        scope: &'a DeadlineScope,
    ) -> BoxFuture<'a, RegistryResult<()>> {
        Box::pin(async move {
            let url = upload.url.clone();
            let operation = format!("upload {}", upload.filename);
            debug!(url = %url, filename = %upload.filename, "PUT");

            let request = self.upload_request(upload)?;
            scope
                .run(self.execute(Method::PUT, &url, request, StatusCode::OK))
                .await
                .map_err(|source| RegistryError::Deadline { operation, source })??;
            Ok(())
        })
    }
}
