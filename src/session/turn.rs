use super::stage::Stage;
use crate::audio::{Clip, StopReason};
use crate::room::TrackHandle;
use crate::speech::Transcript;
use crate::{MurmurError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// One record-to-playback cycle.
///
/// The transcript is set once; the reply only grows. At most one room track
/// is held at a time.
#[derive(Debug)]
pub struct Turn {
    id: Uuid,
    stage: Stage,
    started_at: DateTime<Utc>,
    captured_clip: Option<Clip>,
    stop_reason: Option<StopReason>,
    transcript: Option<Transcript>,
    reply_text: String,
    published_track: Option<TrackHandle>,
}

impl Turn {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Idle,
            started_at: Utc::now(),
            captured_clip: None,
            stop_reason: None,
            transcript: None,
            reply_text: String::new(),
            published_track: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Move to `next`, rejecting anything the stage graph does not allow
    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(MurmurError::InvalidArgument(format!(
                "illegal stage transition {} -> {}",
                self.stage, next
            )));
        }
        self.stage = next;
        Ok(())
    }

    pub fn store_clip(&mut self, clip: Clip, reason: StopReason) {
        self.captured_clip = Some(clip);
        self.stop_reason = Some(reason);
    }

    /// Hand the clip over to transcription
    pub fn take_clip(&mut self) -> Option<Clip> {
        self.captured_clip.take()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn set_transcript(&mut self, transcript: Transcript) -> Result<()> {
        if self.transcript.is_some() {
            return Err(MurmurError::InvalidArgument("transcript already set".into()));
        }
        self.transcript = Some(transcript);
        Ok(())
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    pub fn append_reply(&mut self, text: &str) {
        self.reply_text.push_str(text);
    }

    pub fn reply_text(&self) -> &str {
        &self.reply_text
    }

    pub fn attach_track(&mut self, handle: TrackHandle) -> Result<()> {
        if self.published_track.is_some() {
            return Err(MurmurError::InvalidArgument("turn already holds a track".into()));
        }
        self.published_track = Some(handle);
        Ok(())
    }

    pub fn take_track(&mut self) -> Option<TrackHandle> {
        self.published_track.take()
    }

    pub fn has_track(&self) -> bool {
        self.published_track.is_some()
    }

    pub(crate) fn into_report(
        self,
        error: Option<MurmurError>,
        timings: Vec<(String, Duration)>,
    ) -> TurnReport {
        TurnReport {
            turn_id: self.id,
            stage: self.stage,
            started_at: self.started_at,
            stop_reason: self.stop_reason,
            transcript: self.transcript.map(|t| t.text),
            reply: self.reply_text,
            error,
            timings,
        }
    }
}

impl Default for Turn {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a finished turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub turn_id: Uuid,
    /// Always terminal
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub stop_reason: Option<StopReason>,
    pub transcript: Option<String>,
    /// Everything generated, including a partial reply from a failed stream
    pub reply: String,
    pub error: Option<MurmurError>,
    pub timings: Vec<(String, Duration)>,
}

impl TurnReport {
    pub fn timing(&self, label: &str) -> Option<Duration> {
        self.timings
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, at)| *at)
    }
}
