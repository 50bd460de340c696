use serde::{Deserialize, Serialize};

/// Pipeline state as mirrored by the engine.
///
/// Ordered from fully torn down to actively rendering; transitions happen only
/// through explicit commands or by mirroring state-changed bus messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// No resources are allocated.
    #[default]
    Null,
    /// Resources allocated, stream not prerolled.
    Ready,
    /// Prerolled; clock stopped.
    Paused,
    /// Clock running, samples flowing.
    Playing,
}

impl PlayerState {
    /// Lower-case label used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerState::Null => "null",
            PlayerState::Ready => "ready",
            PlayerState::Paused => "paused",
            PlayerState::Playing => "playing",
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_order_from_null_to_playing() {
        assert!(PlayerState::Null < PlayerState::Ready);
        assert!(PlayerState::Ready < PlayerState::Paused);
        assert!(PlayerState::Paused < PlayerState::Playing);
        assert_eq!(PlayerState::default(), PlayerState::Null);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&PlayerState::Playing).unwrap();
        assert_eq!(json, "\"playing\"");
        let back: PlayerState = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(back, PlayerState::Ready);
    }
}
