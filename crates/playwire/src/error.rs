use std::time::Duration;

use crate::state::PlayerState;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Failures surfaced by [`crate::Player`].
///
/// Every variant is also delivered as text to the error callback, except
/// [`PlayerError::NotOpen`] which only means the command had nothing to act on.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The media backend could not be initialized.
    #[error("media backend unavailable: {0}")]
    BackendUnavailable(String),
    /// `open` was called with an empty path.
    #[error("empty media path")]
    EmptyPath,
    /// Discovery did not report usable metadata for the resource.
    #[error("unable to discover media at {0}")]
    ProbeFailed(String),
    /// The resource has neither an audio nor a video stream.
    #[error("no playable audio or video stream in {0}")]
    NoPlayableStream(String),
    /// Pipeline, bus or frame sink construction failed.
    #[error("failed to build pipeline: {0}")]
    Build(String),
    /// A synchronous state change did not settle in time.
    #[error("pipeline did not reach {target:?} within {timeout:?}")]
    StateTimeout {
        target: PlayerState,
        timeout: Duration,
    },
    /// The pipeline refused a state request.
    #[error("state change to {target:?} failed: {reason}")]
    StateChange { target: PlayerState, reason: String },
    /// The command needs an open session.
    #[error("no media is open")]
    NotOpen,
    /// The backend refused a seek.
    #[error("seek to {0:.3}s was rejected")]
    SeekRejected(f64),
    /// The backend refused a playback-rate change.
    #[error("playback rate {0} was rejected")]
    RateRejected(f64),
    /// The pipeline reported a stream error; the session was closed.
    #[error("pipeline error: {0}")]
    Stream(String),
}

impl PlayerError {
    /// Whether this error should be forwarded to the error callback.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, PlayerError::NotOpen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_open_is_not_reported() {
        assert!(!PlayerError::NotOpen.is_reportable());
        assert!(PlayerError::EmptyPath.is_reportable());
        assert!(PlayerError::SeekRejected(1.0).is_reportable());
    }

    #[test]
    fn state_timeout_message_names_target() {
        let err = PlayerError::StateTimeout {
            target: PlayerState::Paused,
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "pipeline did not reach Paused within 10s");
    }
}
