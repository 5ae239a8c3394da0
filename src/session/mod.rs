//! Session and turn state
//!
//! A [`Session`] lives for the whole run and holds at most one active turn.
//! The turn itself is owned by the task that drives it; the session keeps a
//! [`TurnSlot`] with the controls needed to stop or cancel it from outside.

pub mod events;
pub mod stage;
pub mod turn;

pub use events::{Notice, NoticeLevel, SessionEvent};
pub use stage::Stage;
pub use turn::{Turn, TurnReport};

use crate::audio::StopSignal;
use crate::room::RoomConnectionState;
use crate::{MurmurError, Result};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Outside controls for the active turn
#[derive(Debug, Clone)]
pub struct TurnSlot {
    pub turn_id: Uuid,
    pub stage: watch::Receiver<Stage>,
    pub cancel: CancellationToken,
    pub stop: StopSignal,
    /// Fires after the turn has released its resources and left the slot
    pub released: CancellationToken,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    room_state: watch::Receiver<RoomConnectionState>,
    current_turn: Option<TurnSlot>,
}

impl Session {
    pub fn new(room_state: watch::Receiver<RoomConnectionState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            room_state,
            current_turn: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn room_state(&self) -> RoomConnectionState {
        *self.room_state.borrow()
    }

    pub fn current_turn(&self) -> Option<&TurnSlot> {
        self.current_turn.as_ref()
    }

    pub fn has_active_turn(&self) -> bool {
        self.current_turn.is_some()
    }

    /// Occupy the slot, or fail without touching the active turn
    pub fn claim_turn(&mut self, slot: TurnSlot) -> Result<()> {
        if self.current_turn.is_some() {
            return Err(MurmurError::TurnAlreadyActive);
        }
        self.current_turn = Some(slot);
        Ok(())
    }

    /// Clear the slot if it still belongs to `turn_id`
    pub fn release_turn(&mut self, turn_id: Uuid) -> Option<TurnSlot> {
        match &self.current_turn {
            Some(slot) if slot.turn_id == turn_id => self.current_turn.take(),
            _ => None,
        }
    }
}
