//! Request bodies, resolved once per call.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use super::error::{RegistryError, RegistryResult};
use crate::ByteStream;

/// Media type of registry JSON:API documents.
pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Media type of raw file uploads.
pub const BINARY_MEDIA_TYPE: &str = "binary/octet-stream";

/// The body of a registry request.
pub enum RequestBody {
    /// No body.
    Empty,
    /// A fully buffered payload.
    Bytes(Bytes),
    /// A payload streamed chunk by chunk, never buffered whole.
    Stream(ByteStream),
    /// A document serialized as JSON when the request is built.
    Json(serde_json::Value),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RequestBody::Stream(_) => f.write_str("Stream"),
            RequestBody::Json(value) => write!(f, "Json({})", value),
        }
    }
}

impl RequestBody {
    /// Serialize `value` into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> RegistryResult<Self> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(RegistryError::Encode)
    }

    /// Content type implied by the variant, if any.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Bytes(_) | RequestBody::Stream(_) => Some(BINARY_MEDIA_TYPE),
            RequestBody::Json(_) => Some(JSON_API_MEDIA_TYPE),
        }
    }

    /// Resolve into a transport body.
    pub(crate) fn into_reqwest(self) -> RegistryResult<reqwest::Body> {
        match self {
            RequestBody::Empty => Ok(reqwest::Body::from(Bytes::new())),
            RequestBody::Bytes(bytes) => Ok(reqwest::Body::from(bytes)),
            RequestBody::Stream(stream) => Ok(reqwest::Body::wrap_stream(stream)),
            RequestBody::Json(value) => serde_json::to_vec(&value)
                .map(reqwest::Body::from)
                .map_err(RegistryError::Encode),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<ByteStream> for RequestBody {
    fn from(stream: ByteStream) -> Self {
        RequestBody::Stream(stream)
    }
}
