//! Speech collaborators: transcription of captured clips and synthesis of replies

pub mod stt;
pub mod tts;

pub use stt::{Transcriber, Transcript, TranscriptOutcome, TranscriptionClient, UploadMode};
pub use tts::{SpeechSynthesisClient, SpeechSynthesizer};
