//! Publish run state machine.
//!
//! ```text
//! Idle -> ResolvingRelease -> VersionCreated -> ManifestsUploaded -> PlatformsPublishing -> Done
//!   \________________\_________________\________________\__________________\__________-> Failed
//! ```

use std::fmt;

use tracing::{info, warn};

/// Stage of a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishState {
    Idle,
    ResolvingRelease,
    VersionCreated,
    ManifestsUploaded,
    PlatformsPublishing,
    Done,
    Failed,
}

impl PublishState {
    /// Returns true for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, PublishState::Done | PublishState::Failed)
    }

    /// The state that follows on success, `None` once terminal.
    pub fn next(self) -> Option<PublishState> {
        match self {
            PublishState::Idle => Some(PublishState::ResolvingRelease),
            PublishState::ResolvingRelease => Some(PublishState::VersionCreated),
            PublishState::VersionCreated => Some(PublishState::ManifestsUploaded),
            PublishState::ManifestsUploaded => Some(PublishState::PlatformsPublishing),
            PublishState::PlatformsPublishing => Some(PublishState::Done),
            PublishState::Done | PublishState::Failed => None,
        }
    }

    /// Returns true if a run may move from `self` to `to`.
    pub fn can_transition_to(self, to: PublishState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == PublishState::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Idle => "idle",
            PublishState::ResolvingRelease => "resolving-release",
            PublishState::VersionCreated => "version-created",
            PublishState::ManifestsUploaded => "manifests-uploaded",
            PublishState::PlatformsPublishing => "platforms-publishing",
            PublishState::Done => "done",
            PublishState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the state of one run.
#[derive(Debug)]
pub(crate) struct StateTracker {
    current: PublishState,
    history: Vec<PublishState>,
}

impl StateTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: PublishState::Idle,
            history: vec![PublishState::Idle],
        }
    }

    pub(crate) fn current(&self) -> PublishState {
        self.current
    }

    pub(crate) fn history(&self) -> &[PublishState] {
        &self.history
    }

    /// Move to `to`. Out-of-order transitions are logged and ignored.
    pub(crate) fn advance(&mut self, to: PublishState) {
        if !self.current.can_transition_to(to) {
            warn!(from = %self.current, to = %to, "Ignoring invalid publish state transition");
            return;
        }
        info!(from = %self.current, to = %to, "Publish state changed");
        self.current = to;
        self.history.push(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_sequence() {
        let mut tracker = StateTracker::new();
        let mut state = PublishState::Idle;
        while let Some(next) = state.next() {
            tracker.advance(next);
            state = next;
        }

        assert_eq!(tracker.current(), PublishState::Done);
        assert_eq!(
            tracker.history(),
            &[
                PublishState::Idle,
                PublishState::ResolvingRelease,
                PublishState::VersionCreated,
                PublishState::ManifestsUploaded,
                PublishState::PlatformsPublishing,
                PublishState::Done,
            ]
        );
    }

    #[test]
    fn test_any_active_state_can_fail() {
        for state in [
            PublishState::Idle,
            PublishState::ResolvingRelease,
            PublishState::VersionCreated,
            PublishState::ManifestsUploaded,
            PublishState::PlatformsPublishing,
        ] {
            assert!(state.can_transition_to(PublishState::Failed), "{}", state);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!PublishState::Done.can_transition_to(PublishState::Failed));
        assert!(!PublishState::Failed.can_transition_to(PublishState::Done));
        assert!(PublishState::Failed.next().is_none());
    }

    #[test]
    fn test_skipping_a_stage_is_ignored() {
        let mut tracker = StateTracker::new();
        tracker.advance(PublishState::ResolvingRelease);
        tracker.advance(PublishState::PlatformsPublishing);

        assert_eq!(tracker.current(), PublishState::ResolvingRelease);
        assert_eq!(tracker.history().len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(PublishState::PlatformsPublishing.to_string(), "platforms-publishing");
    }
}
