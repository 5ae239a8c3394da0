//! Murmur - voice assistant session orchestrator
//!
//! One voice turn runs record -> transcribe -> generate -> synthesize -> play,
//! with each audio stream optionally relayed into a live room. The
//! [`integration::SessionOrchestrator`] owns the turn state machine; the
//! remaining modules are the collaborators it drives.

pub mod audio;
pub mod integration;
pub mod llm;
pub mod room;
pub mod session;
pub mod speech;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MurmurError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("A turn is already active")]
    TurnAlreadyActive,

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Room unavailable: {0}")]
    RoomUnavailable(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MurmurError {
    fn from(e: std::io::Error) -> Self {
        MurmurError::Io(e.to_string())
    }
}

impl MurmurError {
    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            MurmurError::DeviceUnavailable(_) => {
                "Could not access microphone. Please check permissions and devices.".to_string()
            }
            MurmurError::TurnAlreadyActive => {
                "Still working on the previous request. Please wait.".to_string()
            }
            MurmurError::TranscriptionFailed(_) => "Speech recognition failed.".to_string(),
            MurmurError::GenerationFailed(_) => "Error getting AI response.".to_string(),
            MurmurError::InvalidArgument(_) => "Nothing to say back.".to_string(),
            MurmurError::SynthesisFailed(_) => "Error generating audio response.".to_string(),
            MurmurError::PlaybackFailed(_) => "Error playing audio response.".to_string(),
            MurmurError::RoomUnavailable(_) => {
                "Live room unavailable; continuing without it.".to_string()
            }
            MurmurError::Cancelled => "Cancelled.".to_string(),
            MurmurError::Config(_) => "Configuration error. Please check settings.".to_string(),
            MurmurError::Io(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MurmurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_hide_causes() {
        let err = MurmurError::TranscriptionFailed("HTTP 502: upstream reset".into());
        assert_eq!(err.user_message(), "Speech recognition failed.");
        assert!(err.to_string().contains("502"));
    }
}
