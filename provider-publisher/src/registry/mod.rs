//! Registry publishing API.
//!
//! Three independent operations, each a single HTTP round trip:
//!
//! - `POST .../registry-providers/{registry}/{namespace}/{provider}/versions`
//! - `POST .../versions/{version}/platforms`
//! - `PUT {upload-url}` with the raw file
//!
//! JSON calls speak JSON:API and carry the bearer token. Uploads go to the
//! pre-signed URLs returned by the JSON calls.

mod body;
mod client;
mod error;
mod models;

pub use body::{RequestBody, BINARY_MEDIA_TYPE, JSON_API_MEDIA_TYPE};
pub use client::{FileUpload, RegistryApi, RegistryClient, DEFAULT_ADDRESS};
pub use error::{RegistryError, RegistryResult};
pub use models::{
    ApiError, ApiErrorEntry, NewPlatform, NewVersion, PlatformUploadTarget, ProviderAddress,
    PublishedVersion, PROVIDER_PLATFORMS_TYPE, PROVIDER_VERSIONS_TYPE,
};
