//! Local audio tracks relayed into the live room
//!
//! A track is created as a pair: the [`TrackFeed`] stays with whoever produces
//! audio (capture or playback) and the [`LocalTrack`] goes to the room
//! transport. Frames are s16le PCM.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Frames buffered between producer and transport before new ones are dropped
pub const TRACK_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
}

/// Where a track's audio originates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Microphone,
    Synthesized,
}

/// Producer side of a local track
#[derive(Debug, Clone)]
pub struct TrackFeed {
    tx: mpsc::Sender<Bytes>,
}

impl TrackFeed {
    /// Push one PCM frame. Never blocks; returns false when the frame was dropped.
    pub fn push(&self, pcm: Bytes) -> bool {
        match self.tx.try_send(pcm) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Track queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Transport side of a local track
#[derive(Debug)]
pub struct LocalTrack {
    name: String,
    kind: TrackKind,
    source: TrackSource,
    sample_rate: u32,
    channels: u16,
    frames: mpsc::Receiver<Bytes>,
}

impl LocalTrack {
    /// Create a connected feed/track pair
    pub fn new(
        name: impl Into<String>,
        source: TrackSource,
        sample_rate: u32,
        channels: u16,
    ) -> (TrackFeed, LocalTrack) {
        let (tx, frames) = mpsc::channel(TRACK_QUEUE_CAPACITY);
        let track = LocalTrack {
            name: name.into(),
            kind: TrackKind::Audio,
            source,
            sample_rate,
            channels,
            frames,
        };
        (TrackFeed { tx }, track)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Hand the frame receiver to the transport's pump
    pub fn into_frames(self) -> mpsc::Receiver<Bytes> {
        self.frames
    }
}

/// Opaque reference to a published track.
///
/// Not `Clone`: a handle belongs to exactly one turn and is consumed by
/// [`RoomBridge::unpublish`](super::RoomBridge::unpublish).
#[derive(Debug, PartialEq, Eq)]
pub struct TrackHandle {
    id: Uuid,
    sid: String,
    name: String,
    epoch: u64,
}

impl TrackHandle {
    pub(crate) fn new(sid: String, name: String, epoch: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            sid,
            name,
            epoch,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Provider-assigned track identifier
    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}
