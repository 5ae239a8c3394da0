//! Streaming playback of synthesized speech
//!
//! Chunks are written to the sink as they arrive, so playback starts before
//! synthesis finishes. Chunks are s16le PCM at the configured playback rate.

use crate::room::TrackFeed;
use crate::utils::until_cancelled;
use crate::{MurmurError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Ordered, finite sequence of encoded audio chunks
pub type AudioStream = BoxStream<'static, Result<Bytes>>;

/// Audio output device
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Queue one chunk for output
    async fn write(&self, chunk: &[u8]) -> Result<()>;

    /// Resolve once everything queued has been rendered
    async fn drain(&self) -> Result<()>;

    /// Drop queued audio and go silent immediately
    fn stop(&self);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub chunks: usize,
    pub bytes: usize,
}

pub struct PlaybackController {
    sink: Arc<dyn AudioSink>,
    active: AtomicBool,
}

impl PlaybackController {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            active: AtomicBool::new(false),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Play `audio` to the end, relaying each chunk into `tee` when set.
    ///
    /// On cancellation or a stream error the sink is stopped before returning.
    pub async fn play(
        &self,
        audio: AudioStream,
        tee: Option<TrackFeed>,
        cancel: &CancellationToken,
    ) -> Result<PlaybackSummary> {
        self.active.store(true, Ordering::SeqCst);
        let result = self.render(audio, tee, cancel).await;

        match &result {
            Ok(summary) => {
                self.active.store(false, Ordering::SeqCst);
                info!("Playback finished: {} chunks, {} bytes", summary.chunks, summary.bytes);
            }
            Err(e) => {
                debug!("Playback interrupted: {}", e);
                self.stop();
            }
        }
        result
    }

    /// Stop the sink if playback is in progress. Safe to call repeatedly.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.sink.stop();
            debug!("Playback stopped");
        }
    }

    async fn render(
        &self,
        mut audio: AudioStream,
        tee: Option<TrackFeed>,
        cancel: &CancellationToken,
    ) -> Result<PlaybackSummary> {
        let mut summary = PlaybackSummary::default();

        while let Some(chunk) = until_cancelled(cancel, audio.next()).await? {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }

            until_cancelled(cancel, self.sink.write(&chunk))
                .await?
                .map_err(as_playback_failure)?;

            summary.chunks += 1;
            summary.bytes += chunk.len();
            if let Some(feed) = &tee {
                feed.push(chunk);
            }
        }

        until_cancelled(cancel, self.sink.drain())
            .await?
            .map_err(as_playback_failure)?;
        Ok(summary)
    }
}

fn as_playback_failure(e: MurmurError) -> MurmurError {
    match e {
        MurmurError::PlaybackFailed(_) | MurmurError::Cancelled => e,
        other => MurmurError::PlaybackFailed(other.to_string()),
    }
}
