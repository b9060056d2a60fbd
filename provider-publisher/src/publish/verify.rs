//! SHA-256 verification of a binary while it streams into its upload.

use std::io;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};

use super::error::PlatformError;
use crate::ByteStream;

/// First failure seen in a verified body, shared with the uploading side.
///
/// The upload request only sees an opaque body error; the unit reads the
/// real cause from here once the upload returns.
#[derive(Debug, Clone, Default)]
pub(crate) struct BodyFault(Arc<Mutex<Option<PlatformError>>>);

impl BodyFault {
    fn record(&self, error: PlatformError) {
        if let Ok(mut slot) = self.0.lock() {
            slot.get_or_insert(error);
        }
    }

    /// Take the recorded failure, if any.
    pub(crate) fn take(&self) -> Option<PlatformError> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

struct Verifier {
    inner: ByteStream,
    hasher: Sha256,
    expected: String,
    fault: BodyFault,
}

/// Wrap `inner` so its SHA-256 is checked against `expected` at end of body.
///
/// Chunks pass through untouched. On mismatch, or if `inner` fails, the
/// stream yields one error and ends, and the cause is recorded in `fault`.
pub(crate) fn verify_stream(inner: ByteStream, expected: impl Into<String>, fault: BodyFault) -> ByteStream {
    let verifier = Verifier {
        inner,
        hasher: Sha256::new(),
        expected: expected.into(),
        fault,
    };

    stream::unfold(Some(verifier), |state| async move {
        let mut verifier = state?;
        match verifier.inner.next().await {
            Some(Ok(chunk)) => {
                verifier.hasher.update(&chunk);
                Some((Ok(chunk), Some(verifier)))
            }
            Some(Err(err)) => {
                let forwarded = io::Error::new(err.kind(), err.to_string());
                verifier.fault.record(PlatformError::DownloadInterrupted(err));
                Some((Err(forwarded), None))
            }
            None => {
                let actual = format!("{:x}", verifier.hasher.finalize());
                if actual.eq_ignore_ascii_case(&verifier.expected) {
                    return None;
                }
                let message = format!(
                    "checksum mismatch: expected {}, got {}",
                    verifier.expected, actual
                );
                verifier.fault.record(PlatformError::ChecksumMismatch {
                    expected: verifier.expected,
                    actual,
                });
                Some((Err(io::Error::new(io::ErrorKind::InvalidData, message)), None))
            }
        }
    })
    .boxed()
}
