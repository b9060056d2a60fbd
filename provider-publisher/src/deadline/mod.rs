//! Scoped per-phase deadlines with cooperative cancellation.
//!
//! Every network operation in a publish run executes inside a
//! [`DeadlineScope`]. Scopes form a stack:
//!
//! ```text
//! root (process cancellation token, no deadline)
//!   ├── Discovery scope   (release metadata fetch)
//!   ├── Download scope    (asset bodies)
//!   ├── Request scope     (registry JSON calls)
//!   └── Upload scope      (raw PUT uploads)
//! ```
//!
//! A child scope's deadline is the earlier of its parent's deadline and
//! `now + timeout(phase)`. Its cancellation token is a child of the
//! parent's token and is cancelled when the scope is dropped, so work tied
//! to a finished scope cannot outlive it. Cancelling the root cancels
//! every descendant.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::ByteStream;

/// Default timeout for release metadata requests.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for release asset downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default timeout for registry JSON requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for registry uploads.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The kind of network operation a scope bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Fetching release metadata from the release host.
    Discovery,
    /// Downloading an asset body from the release host.
    Download,
    /// A JSON request against the registry API.
    Request,
    /// A raw file upload to a registry destination URL.
    Upload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Discovery => "discovery",
            Phase::Download => "download",
            Phase::Request => "request",
            Phase::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// One configured timeout per [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    pub discovery: Duration,
    pub download: Duration,
    pub request: Duration,
    pub upload: Duration,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self {
            discovery: DEFAULT_DISCOVERY_TIMEOUT,
            download: DEFAULT_DOWNLOAD_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
            upload: DEFAULT_UPLOAD_TIMEOUT,
        }
    }
}

impl PhaseTimeouts {
    /// Timeout configured for `phase`.
    pub fn for_phase(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Discovery => self.discovery,
            Phase::Download => self.download,
            Phase::Request => self.request,
            Phase::Upload => self.upload,
        }
    }
}

/// Why a scoped operation did not complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeadlineError {
    /// The scope's deadline passed before the operation finished.
    #[error("{phase} deadline of {after:?} elapsed")]
    Elapsed { phase: Phase, after: Duration },

    /// The scope (or an ancestor) was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<DeadlineError> for io::Error {
    fn from(err: DeadlineError) -> Self {
        let kind = match err {
            DeadlineError::Elapsed { .. } => io::ErrorKind::TimedOut,
            DeadlineError::Cancelled => io::ErrorKind::Interrupted,
        };
        io::Error::new(kind, err)
    }
}

/// A cancellation scope with an optional deadline.
pub struct DeadlineScope {
    token: CancellationToken,
    deadline: Option<Instant>,
    phase: Option<Phase>,
    budget: Duration,
    timeouts: PhaseTimeouts,
    _guard: Option<DropGuard>,
}

impl fmt::Debug for DeadlineScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlineScope")
            .field("phase", &self.phase)
            .field("budget", &self.budget)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl DeadlineScope {
    /// Create the root scope of a run.
    ///
    /// The root has no deadline; it is cancelled only through `token`,
    /// which the caller keeps (typically wired to Ctrl+C).
    pub fn root(token: CancellationToken, timeouts: PhaseTimeouts) -> Self {
        Self {
            token,
            deadline: None,
            phase: None,
            budget: Duration::MAX,
            timeouts,
            _guard: None,
        }
    }

    /// Derive a child scope bounded by the timeout for `phase`.
    ///
    /// A timeout too large to represent as an instant leaves the child
    /// bounded by its parent alone.
    pub fn child(&self, phase: Phase) -> Self {
        let now = Instant::now();
        let own = now.checked_add(self.timeouts.for_phase(phase));
        let deadline = match (own, self.deadline) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        };
        let token = self.token.child_token();

        Self {
            _guard: Some(token.clone().drop_guard()),
            token,
            deadline,
            phase: Some(phase),
            budget: deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(now)),
            timeouts: self.timeouts,
        }
    }

    /// An owned copy of this scope for moving into a spawned task.
    ///
    /// The copy keeps this scope's deadline and phase, and its token is a
    /// child of this scope's token: cancelling this scope cancels the copy,
    /// dropping the copy releases only the copy.
    pub fn detach(&self) -> Self {
        let token = self.token.child_token();
        Self {
            _guard: Some(token.clone().drop_guard()),
            token,
            deadline: self.deadline,
            phase: self.phase,
            budget: self.budget,
            timeouts: self.timeouts,
        }
    }

    /// The phase this scope bounds, `None` for the root.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Time allotted to this scope when it was created.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Timeouts children of this scope are derived from.
    pub fn timeouts(&self) -> &PhaseTimeouts {
        &self.timeouts
    }

    /// The scope's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns true if this scope or an ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn elapsed_error(&self) -> DeadlineError {
        DeadlineError::Elapsed {
            phase: self.phase.unwrap_or(Phase::Request),
            after: self.budget,
        }
    }

    /// Run `fut` until it completes, the deadline passes, or the scope is
    /// cancelled, whichever comes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DeadlineError>
    where
        F: Future<Output = T>,
    {
        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(DeadlineError::Cancelled),
            _ = expiry => Err(self.elapsed_error()),
            out = fut => Ok(out),
        }
    }

    /// Bound a byte stream by this scope.
    ///
    /// The scope moves into the returned stream and is released when the
    /// stream is dropped. If the deadline passes or the scope is cancelled
    /// mid-body, the stream yields one `TimedOut`/`Interrupted` error and
    /// ends, so consumers never mistake a cut-off body for a complete one.
    pub fn bound_stream<S>(self, inner: S) -> ByteStream
    where
        S: Stream<Item = io::Result<bytes::Bytes>> + Send + 'static,
    {
        let inner = inner.boxed();
        stream::unfold(Some((self, inner)), |state| async move {
            let (scope, mut inner) = state?;
            match scope.run(inner.next()).await {
                Ok(Some(item)) => Some((item, Some((scope, inner)))),
                Ok(None) => None,
                Err(err) => Some((Err(io::Error::from(err)), None)),
            }
        })
        .boxed()
    }
}
