//! JSON:API documents exchanged with the registry.
//!
//! Request documents are built from the plain [`NewVersion`] and
//! [`NewPlatform`] values; response documents are decoded into
//! [`PublishedVersion`] and [`PlatformUploadTarget`], which keep only the
//! fields a publish run needs.

use serde::{Deserialize, Deserializer, Serialize};

/// JSON:API type of a provider version.
pub const PROVIDER_VERSIONS_TYPE: &str = "registry-provider-versions";

/// JSON:API type of a provider version platform.
pub const PROVIDER_PLATFORMS_TYPE: &str = "registry-provider-version-platforms";

/// Path coordinates of one provider in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAddress {
    pub organization: String,
    pub registry: String,
    pub namespace: String,
    pub provider: String,
}

/// Attributes of a version to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct NewVersion {
    pub version: String,
    pub key_id: String,
    pub protocols: Vec<String>,
}

/// Attributes of a platform to create under a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPlatform {
    pub os: String,
    pub arch: String,
    pub shasum: String,
    pub filename: String,
}

/// A version created in the registry, with its manifest upload URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub id: String,
    pub version: String,
    pub shasums_upload: String,
    pub shasums_sig_upload: String,
}

/// A platform created in the registry, with its binary upload URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformUploadTarget {
    pub id: String,
    pub os: String,
    pub arch: String,
    pub binary_upload: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Document<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestData<'a, A> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attributes: &'a A,
}

impl<'a, A> Document<RequestData<'a, A>> {
    pub(crate) fn request(kind: &'static str, attributes: &'a A) -> Self {
        Self {
            data: RequestData { kind, attributes },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct VersionAttributes {
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct VersionLinks {
    pub shasums_upload: String,
    pub shasums_sig_upload: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionData {
    pub id: String,
    #[serde(default)]
    pub attributes: VersionAttributes,
    pub links: VersionLinks,
}

impl From<VersionData> for PublishedVersion {
    fn from(data: VersionData) -> Self {
        Self {
            id: data.id,
            version: data.attributes.version,
            shasums_upload: data.links.shasums_upload,
            shasums_sig_upload: data.links.shasums_sig_upload,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PlatformAttributes {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct PlatformLinks {
    pub provider_binary_upload: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlatformData {
    pub id: String,
    #[serde(default)]
    pub attributes: PlatformAttributes,
    pub links: PlatformLinks,
}

impl From<PlatformData> for PlatformUploadTarget {
    fn from(data: PlatformData) -> Self {
        Self {
            id: data.id,
            os: data.attributes.os,
            arch: data.attributes.arch,
            binary_upload: data.links.provider_binary_upload,
        }
    }
}

/// One entry of a structured registry error.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiErrorEntry {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub source: Option<serde_json::Value>,
}

/// Structured error body returned by the registry.
///
/// `errors` is normally an array of objects, but some endpoints answer
/// with an array of strings; each string becomes an entry with only a
/// title.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(default, deserialize_with = "deserialize_entries")]
    pub errors: Vec<ApiErrorEntry>,
    #[serde(default)]
    pub success: Option<bool>,
}

impl ApiError {
    /// Decode an error body, falling back to an empty error.
    pub fn decode(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Titles and details joined for a one-line diagnostic.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| match (e.title.is_empty(), e.detail.is_empty()) {
                (false, false) => format!("{}: {}", e.title, e.detail),
                (false, true) => e.title.clone(),
                _ => e.detail.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Message(String),
    Detailed(ApiErrorEntry),
}

fn deserialize_entries<'de, D>(deserializer: D) -> Result<Vec<ApiErrorEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<RawEntry>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry {
            RawEntry::Message(title) => ApiErrorEntry {
                title,
                ..ApiErrorEntry::default()
            },
            RawEntry::Detailed(entry) => entry,
        })
        .collect())
}
