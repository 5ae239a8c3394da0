use super::stage::Stage;
use crate::room::RoomConnectionState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-facing status line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub turn_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            turn_id: None,
            at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn for_turn(mut self, turn_id: Uuid) -> Self {
        self.turn_id = Some(turn_id);
        self
    }
}

/// Everything a front-end needs to render the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    StageChanged { turn_id: Uuid, stage: Stage },
    Transcript { turn_id: Uuid, text: String },
    ReplyDelta { turn_id: Uuid, text: String },
    RoomState(RoomConnectionState),
    Notice(Notice),
}

impl SessionEvent {
    pub fn turn_id(&self) -> Option<Uuid> {
        match self {
            SessionEvent::StageChanged { turn_id, .. }
            | SessionEvent::Transcript { turn_id, .. }
            | SessionEvent::ReplyDelta { turn_id, .. } => Some(*turn_id),
            SessionEvent::Notice(notice) => notice.turn_id,
            SessionEvent::RoomState(_) => None,
        }
    }
}
