//! LiveKit room transport
//!
//! Each published track gets a `NativeAudioSource` and a pump task that turns
//! the track's s16le byte frames into 10 ms `AudioFrame`s.

use super::bridge::{RoomConnection, RoomSignal, RoomTransport};
use super::track::{LocalTrack, TrackSource};
use crate::audio::wav::Pcm16Reassembler;
use crate::{MurmurError, Result};
use async_trait::async_trait;
use livekit::id::TrackSid;
use livekit::options::TrackPublishOptions;
use livekit::track::{self, LocalAudioTrack};
use livekit::webrtc::audio_frame::AudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::{Room, RoomEvent, RoomOptions};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const SOURCE_QUEUE_MS: u32 = 1000;

#[derive(Debug, Default)]
pub struct LiveKitTransport;

impl LiveKitTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RoomTransport for LiveKitTransport {
    async fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Result<(Arc<dyn RoomConnection>, mpsc::UnboundedReceiver<RoomSignal>)> {
        let (room, mut events) = Room::connect(url, token, RoomOptions::default())
            .await
            .map_err(|e| MurmurError::RoomUnavailable(e.to_string()))?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let event_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    RoomEvent::Disconnected { reason } => {
                        let _ = signal_tx.send(RoomSignal::Disconnected {
                            reason: format!("{:?}", reason),
                        });
                        return;
                    }
                    other => debug!("Room event: {:?}", other),
                }
            }
            let _ = signal_tx.send(RoomSignal::Disconnected {
                reason: "event stream ended".into(),
            });
        });

        let connection = LiveKitConnection {
            room,
            tracks: Mutex::new(HashMap::new()),
            event_task,
        };
        Ok((Arc::new(connection), signal_rx))
    }
}

struct PublishedTrack {
    sid: TrackSid,
    pump: JoinHandle<()>,
}

struct LiveKitConnection {
    room: Room,
    tracks: Mutex<HashMap<String, PublishedTrack>>,
    event_task: JoinHandle<()>,
}

#[async_trait]
impl RoomConnection for LiveKitConnection {
    async fn publish(&self, local: LocalTrack) -> Result<String> {
        let sample_rate = local.sample_rate();
        let channels = local.channels() as u32;
        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            sample_rate,
            channels,
            SOURCE_QUEUE_MS,
        );
        let rtc_track =
            LocalAudioTrack::create_audio_track(local.name(), RtcAudioSource::Native(source.clone()));

        let options = TrackPublishOptions {
            source: match local.source() {
                TrackSource::Microphone => track::TrackSource::Microphone,
                TrackSource::Synthesized => track::TrackSource::Unknown,
            },
            ..Default::default()
        };

        let publication = self
            .room
            .local_participant()
            .publish_track(track::LocalTrack::Audio(rtc_track), options)
            .await
            .map_err(|e| MurmurError::RoomUnavailable(format!("publish failed: {}", e)))?;

        let sid = publication.sid();
        let frames = local.into_frames();
        let pump = tokio::spawn(pump_frames(source, frames, sample_rate, channels));

        let key = sid.to_string();
        self.tracks
            .lock()
            .insert(key.clone(), PublishedTrack { sid, pump });
        Ok(key)
    }

    async fn unpublish(&self, sid: &str) -> Result<()> {
        let published = self.tracks.lock().remove(sid);
        let Some(published) = published else {
            return Ok(());
        };
        published.pump.abort();

        self.room
            .local_participant()
            .unpublish_track(&published.sid)
            .await
            .map(|_| ())
            .map_err(|e| MurmurError::RoomUnavailable(format!("unpublish failed: {}", e)))
    }

    async fn close(&self) {
        for (_, published) in self.tracks.lock().drain() {
            published.pump.abort();
        }
        self.event_task.abort();
        if let Err(e) = self.room.close().await {
            warn!("Error closing room: {}", e);
        }
    }
}

async fn pump_frames(
    source: NativeAudioSource,
    mut frames: mpsc::Receiver<bytes::Bytes>,
    sample_rate: u32,
    channels: u32,
) {
    let samples_per_channel = sample_rate / 100;
    let frame_len = (samples_per_channel * channels) as usize;
    let mut reassembler = Pcm16Reassembler::new();
    let mut pending: Vec<i16> = Vec::with_capacity(frame_len * 2);

    while let Some(chunk) = frames.recv().await {
        pending.extend(reassembler.push(&chunk));
        while pending.len() >= frame_len {
            let data: Vec<i16> = pending.drain(..frame_len).collect();
            let frame = AudioFrame {
                data: Cow::Owned(data),
                sample_rate,
                num_channels: channels,
                samples_per_channel,
            };
            if let Err(e) = source.capture_frame(&frame).await {
                debug!("Dropped room audio frame: {}", e);
            }
        }
    }
}
