use serde::Serialize;
use std::fmt;

/// Lifecycle stage of a turn.
///
/// ```text
/// Idle -> Recording -> Transcribing -> Generating -> Synthesizing -> Playing -> Completed
///                          \-> Completed (no speech)
/// any non-terminal -> Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    #[default]
    Idle,
    Recording,
    Transcribing,
    Generating,
    Synthesizing,
    Playing,
    Completed,
    Failed,
    Cancelled,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed | Stage::Cancelled)
    }

    pub fn can_transition_to(self, next: Stage) -> bool {
        use Stage::*;

        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, next),
            (_, Failed)
                | (_, Cancelled)
                | (Idle, Recording)
                | (Recording, Transcribing)
                | (Transcribing, Generating)
                | (Transcribing, Completed)
                | (Generating, Synthesizing)
                | (Synthesizing, Playing)
                | (Playing, Completed)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Idle => "idle",
            Stage::Recording => "recording",
            Stage::Transcribing => "transcribing",
            Stage::Generating => "generating",
            Stage::Synthesizing => "synthesizing",
            Stage::Playing => "playing",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
            Stage::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Stage; 9] = [
        Stage::Idle,
        Stage::Recording,
        Stage::Transcribing,
        Stage::Generating,
        Stage::Synthesizing,
        Stage::Playing,
        Stage::Completed,
        Stage::Failed,
        Stage::Cancelled,
    ];

    #[test]
    fn test_happy_path_is_allowed() {
        let path = [
            Stage::Idle,
            Stage::Recording,
            Stage::Transcribing,
            Stage::Generating,
            Stage::Synthesizing,
            Stage::Playing,
            Stage::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_stages_are_absorbing() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_failed_and_cancelled_reachable_from_every_live_stage() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(Stage::Failed));
            assert!(from.can_transition_to(Stage::Cancelled));
        }
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!Stage::Idle.can_transition_to(Stage::Transcribing));
        assert!(!Stage::Recording.can_transition_to(Stage::Generating));
        assert!(!Stage::Generating.can_transition_to(Stage::Completed));
        assert!(!Stage::Playing.can_transition_to(Stage::Recording));
        assert!(!Stage::Synthesizing.can_transition_to(Stage::Synthesizing));
        assert!(Stage::Transcribing.can_transition_to(Stage::Completed));
    }
}
